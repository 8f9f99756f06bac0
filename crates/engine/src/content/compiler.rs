use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::info;

use crate::dialogue::{
    ChoiceOption, DialogueChoice, DialogueLine, HintGiver, NpcDialogue,
    DEFAULT_AUTO_PROGRESS_DELAY_SECONDS, DEFAULT_TYPING_SPEED_SECONDS,
};
use crate::state::ItemBehavior;

use super::database::{
    ChestDef, ContentDatabase, DigitCodeDef, DoorDef, ExitDef, ItemDef, LevelDef, MechanicDef, NpcDef,
    PickupDef, PuzzleDef, SymbolLockDef,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDef,
    UnknownReference,
    MissingLevel,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

/// Compiles every `*.xml` file under `content_dir` (sorted by relative path)
/// into a [`ContentDatabase`]. Item order across files defines item ids.
pub fn compile_content(content_dir: &Path) -> Result<ContentDatabase, ContentCompileError> {
    let xml_files = collect_xml_files_sorted(content_dir)
        .map_err(|error| read_error(error.path, error.source))?;

    let mut pending = PendingDefs::default();
    for xml_file in xml_files {
        let raw = fs::read_to_string(&xml_file)
            .map_err(|source| read_error(xml_file.clone(), source))?;
        parse_defs_document(&xml_file, &raw, &mut pending)?;
    }

    let database = pending.resolve(content_dir)?;
    info!(
        content_dir = %content_dir.display(),
        items = database.items().len(),
        puzzles = database.puzzles().len(),
        doors = database.doors().len(),
        npcs = database.npcs().len(),
        exits = database.exits().len(),
        "content_compiled"
    );
    Ok(database)
}

#[derive(Debug, Clone)]
struct Located<T> {
    value: T,
    file_path: PathBuf,
    location: SourceLocation,
}

impl<T> Located<T> {
    fn error(&self, code: ContentErrorCode, message: String) -> ContentCompileError {
        ContentCompileError {
            code,
            message,
            file_path: self.file_path.clone(),
            location: Some(self.location),
        }
    }
}

#[derive(Debug, Default)]
struct PendingDefs {
    items: Vec<Located<ItemDef>>,
    puzzles: Vec<Located<PuzzleDef>>,
    doors: Vec<Located<DoorDef>>,
    npcs: Vec<Located<NpcDef>>,
    exits: Vec<Located<ExitDef>>,
    levels: Vec<Located<LevelDef>>,
}

impl PendingDefs {
    fn resolve(self, content_dir: &Path) -> Result<ContentDatabase, ContentCompileError> {
        ensure_unique("ItemDef", &self.items, |def| &def.def_name)?;
        ensure_unique("PuzzleDef", &self.puzzles, |def| &def.def_name)?;
        ensure_unique("DoorDef", &self.doors, |def| &def.def_name)?;
        ensure_unique("NpcDef", &self.npcs, |def| &def.def_name)?;
        ensure_unique("ExitDef", &self.exits, |def| &def.def_name)?;

        let mut levels = self.levels.into_iter();
        let Some(level) = levels.next() else {
            return Err(ContentCompileError {
                code: ContentErrorCode::MissingLevel,
                message: "content defines no <LevelDef>; exactly one is required".to_string(),
                file_path: content_dir.to_path_buf(),
                location: None,
            });
        };
        if let Some(extra) = levels.next() {
            return Err(extra.error(
                ContentErrorCode::DuplicateDef,
                "content defines more than one <LevelDef>".to_string(),
            ));
        }

        for door in &self.doors {
            if let Some(boundary) = &door.value.exit_boundary {
                if !level.value.boundaries.contains(boundary) {
                    return Err(door.error(
                        ContentErrorCode::UnknownReference,
                        format!(
                            "door '{}' exits into unknown boundary '{}'",
                            door.value.def_name, boundary
                        ),
                    ));
                }
            }
        }

        let item_names = names(&self.items, |def| &def.def_name);
        let puzzle_names = names(&self.puzzles, |def| &def.def_name);
        let door_names = names(&self.doors, |def| &def.def_name);

        for exit in &self.exits {
            if let Some(item) = &exit.value.required_item {
                if !item_names.contains(item.as_str()) {
                    return Err(exit.error(
                        ContentErrorCode::UnknownReference,
                        format!(
                            "exit '{}' requires unknown item '{}'",
                            exit.value.def_name, item
                        ),
                    ));
                }
            }
        }

        for puzzle in &self.puzzles {
            let Some(mechanic) = &puzzle.value.mechanic else {
                continue;
            };
            let check = |kind: &str, name: &str, known: &HashSet<&str>| {
                if known.contains(name) {
                    Ok(())
                } else {
                    Err(puzzle.error(
                        ContentErrorCode::UnknownReference,
                        format!(
                            "puzzle '{}' references unknown {} '{}'",
                            puzzle.value.def_name, kind, name
                        ),
                    ))
                }
            };
            match mechanic {
                MechanicDef::DigitCode(def) => {
                    if let Some(item) = &def.reward_item {
                        check("item", item, &item_names)?;
                    }
                }
                MechanicDef::SymbolLock(def) => {
                    if let Some(door) = &def.unlocks_door {
                        check("door", door, &door_names)?;
                    }
                }
                MechanicDef::Pickup(def) => check("item", &def.item, &item_names)?,
                MechanicDef::Chest(def) => {
                    for item in [&def.required_item, &def.reward_item].into_iter().flatten() {
                        check("item", item, &item_names)?;
                    }
                    if let Some(failure) = &def.failure_puzzle {
                        check("puzzle", failure, &puzzle_names)?;
                    }
                    let Some(npc) = self
                        .npcs
                        .iter()
                        .find(|candidate| candidate.value.def_name == def.npc)
                    else {
                        return Err(puzzle.error(
                            ContentErrorCode::UnknownReference,
                            format!(
                                "puzzle '{}' references unknown npc '{}'",
                                puzzle.value.def_name, def.npc
                            ),
                        ));
                    };
                    let line_count = npc.value.dialogue.lines.len();
                    for (field, line) in [
                        ("choiceLine", def.choice_line),
                        ("trueAnswerLine", def.true_answer_line),
                        ("noItemLine", def.no_item_line),
                        ("alreadyRewardedLine", def.already_rewarded_line),
                    ] {
                        if line >= line_count {
                            return Err(puzzle.error(
                                ContentErrorCode::InvalidValue,
                                format!(
                                    "chest {} {} is out of range for npc '{}' ({} lines)",
                                    field, line, def.npc, line_count
                                ),
                            ));
                        }
                    }
                }
            }
        }

        Ok(ContentDatabase::new(
            self.items.into_iter().map(|def| def.value).collect(),
            self.puzzles.into_iter().map(|def| def.value).collect(),
            self.doors.into_iter().map(|def| def.value).collect(),
            self.npcs.into_iter().map(|def| def.value).collect(),
            level.value,
        )
        .with_exits(self.exits.into_iter().map(|def| def.value).collect()))
    }
}

fn ensure_unique<T>(
    def_type: &str,
    defs: &[Located<T>],
    name_of: impl Fn(&T) -> &String,
) -> Result<(), ContentCompileError> {
    let mut seen = HashSet::<&str>::new();
    for def in defs {
        let name = name_of(&def.value);
        if !seen.insert(name.as_str()) {
            return Err(def.error(
                ContentErrorCode::DuplicateDef,
                format!("duplicate {def_type} '{name}'; each defName may be defined only once"),
            ));
        }
    }
    Ok(())
}

fn names<T>(defs: &[Located<T>], name_of: impl Fn(&T) -> &String) -> HashSet<&str> {
    defs.iter()
        .map(|def| name_of(&def.value).as_str())
        .collect()
}

fn parse_defs_document(
    file_path: &Path,
    raw: &str,
    pending: &mut PendingDefs,
) -> Result<(), ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let cx = DocContext {
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(cx.error(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "ItemDef" => pending.items.push(cx.located(child, parse_item_def(&cx, child)?)),
            "PuzzleDef" => pending
                .puzzles
                .push(cx.located(child, parse_puzzle_def(&cx, child)?)),
            "DoorDef" => pending.doors.push(cx.located(child, parse_door_def(&cx, child)?)),
            "NpcDef" => pending.npcs.push(cx.located(child, parse_npc_def(&cx, child)?)),
            "ExitDef" => pending.exits.push(cx.located(child, parse_exit_def(&cx, child)?)),
            "LevelDef" => pending
                .levels
                .push(cx.located(child, parse_level_def(&cx, child)?)),
            other => {
                return Err(cx.error(
                    ContentErrorCode::UnknownDefType,
                    format!(
                        "unsupported def type <{other}>; expected ItemDef, PuzzleDef, DoorDef, NpcDef, ExitDef or LevelDef"
                    ),
                    child,
                ))
            }
        }
    }

    Ok(())
}

fn parse_item_def(cx: &DocContext<'_, '_>, node: Node<'_, '_>) -> Result<ItemDef, ContentCompileError> {
    let mut def_name = None;
    let mut label = None;
    let mut behavior = ItemBehavior::Collectible;

    for field in cx.fields(node, "ItemDef")? {
        match field.tag_name().name() {
            "defName" => def_name = Some(cx.text(field, "defName")?),
            "label" => label = Some(cx.text(field, "label")?),
            "behavior" => {
                let value = cx.text(field, "behavior")?;
                behavior = match value.as_str() {
                    "Usable" => ItemBehavior::Usable,
                    "Collectible" => ItemBehavior::Collectible,
                    _ => {
                        return Err(cx.error(
                            ContentErrorCode::InvalidValue,
                            format!("invalid behavior '{value}'; allowed values: Usable, Collectible"),
                            field,
                        ))
                    }
                };
            }
            _ => return Err(cx.unknown_field(field, "ItemDef")),
        }
    }

    Ok(ItemDef {
        def_name: cx.require(def_name, node, "ItemDef", "defName")?,
        label: cx.require(label, node, "ItemDef", "label")?,
        behavior,
    })
}

fn parse_puzzle_def(
    cx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<PuzzleDef, ContentCompileError> {
    let mut def_name = None;
    let mut label = None;
    let mut mechanic = None;

    for field in cx.fields(node, "PuzzleDef")? {
        let parsed = match field.tag_name().name() {
            "defName" => {
                def_name = Some(cx.text(field, "defName")?);
                continue;
            }
            "label" => {
                label = Some(cx.text(field, "label")?);
                continue;
            }
            "digitCode" => MechanicDef::DigitCode(parse_digit_code(cx, field)?),
            "symbolLock" => MechanicDef::SymbolLock(parse_symbol_lock(cx, field)?),
            "pickup" => MechanicDef::Pickup(parse_pickup(cx, field)?),
            "chest" => MechanicDef::Chest(parse_chest(cx, field)?),
            _ => return Err(cx.unknown_field(field, "PuzzleDef")),
        };
        if mechanic.replace(parsed).is_some() {
            return Err(cx.error(
                ContentErrorCode::InvalidValue,
                "a <PuzzleDef> may declare only one mechanic".to_string(),
                field,
            ));
        }
    }

    let def_name = cx.require(def_name, node, "PuzzleDef", "defName")?;
    Ok(PuzzleDef {
        label: label.unwrap_or_else(|| def_name.clone()),
        def_name,
        mechanic,
    })
}

fn parse_digit_code(
    cx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<DigitCodeDef, ContentCompileError> {
    let mut code = None;
    let mut reward_item = None;
    for field in cx.fields(node, "digitCode")? {
        match field.tag_name().name() {
            "code" => {
                let value = cx.text(field, "code")?;
                if !value.chars().all(|ch| ch.is_ascii_digit()) {
                    return Err(cx.error(
                        ContentErrorCode::InvalidValue,
                        format!("code '{value}' must contain only digits"),
                        field,
                    ));
                }
                code = Some(value);
            }
            "reward" => reward_item = Some(cx.text(field, "reward")?),
            _ => return Err(cx.unknown_field(field, "digitCode")),
        }
    }
    Ok(DigitCodeDef {
        code: cx.require(code, node, "digitCode", "code")?,
        reward_item,
    })
}

fn parse_symbol_lock(
    cx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<SymbolLockDef, ContentCompileError> {
    let mut symbol_count = None;
    let mut combination = None;
    let mut unlocks_door = None;
    for field in cx.fields(node, "symbolLock")? {
        match field.tag_name().name() {
            "symbolCount" => {
                let value: u32 = cx.number(field, "symbolCount")?;
                if value == 0 {
                    return Err(cx.error(
                        ContentErrorCode::InvalidValue,
                        "symbolCount must be >= 1".to_string(),
                        field,
                    ));
                }
                symbol_count = Some(value);
            }
            "combination" => {
                let mut values = Vec::new();
                for li in cx.list_items(field, "combination")? {
                    values.push(cx.number::<u32>(li, "li")?);
                }
                combination = Some((field, values));
            }
            "unlocks" => unlocks_door = Some(cx.text(field, "unlocks")?),
            _ => return Err(cx.unknown_field(field, "symbolLock")),
        }
    }

    let symbol_count = cx.require(symbol_count, node, "symbolLock", "symbolCount")?;
    let (combination_node, combination) =
        cx.require(combination, node, "symbolLock", "combination")?;
    if combination.is_empty() {
        return Err(cx.error(
            ContentErrorCode::InvalidValue,
            "combination must list at least one symbol".to_string(),
            combination_node,
        ));
    }
    if let Some(bad) = combination.iter().find(|symbol| **symbol >= symbol_count) {
        return Err(cx.error(
            ContentErrorCode::InvalidValue,
            format!("combination symbol {bad} is out of range for symbolCount {symbol_count}"),
            combination_node,
        ));
    }

    Ok(SymbolLockDef {
        symbol_count,
        combination,
        unlocks_door,
    })
}

fn parse_pickup(cx: &DocContext<'_, '_>, node: Node<'_, '_>) -> Result<PickupDef, ContentCompileError> {
    let mut item = None;
    for field in cx.fields(node, "pickup")? {
        match field.tag_name().name() {
            "item" => item = Some(cx.text(field, "item")?),
            _ => return Err(cx.unknown_field(field, "pickup")),
        }
    }
    Ok(PickupDef {
        item: cx.require(item, node, "pickup", "item")?,
    })
}

fn parse_chest(cx: &DocContext<'_, '_>, node: Node<'_, '_>) -> Result<ChestDef, ContentCompileError> {
    let mut npc = None;
    let mut choice_line = None;
    let mut true_answer_line = None;
    let mut truth_chest = false;
    let mut required_item = None;
    let mut reward_item = None;
    let mut no_item_line = None;
    let mut already_rewarded_line = None;
    let mut failure_puzzle = None;

    for field in cx.fields(node, "chest")? {
        match field.tag_name().name() {
            "npc" => npc = Some(cx.text(field, "npc")?),
            "choiceLine" => choice_line = Some(cx.number(field, "choiceLine")?),
            "trueAnswerLine" => true_answer_line = Some(cx.number(field, "trueAnswerLine")?),
            "truthChest" => truth_chest = cx.flag(field, "truthChest")?,
            "requiredItem" => required_item = Some(cx.text(field, "requiredItem")?),
            "rewardItem" => reward_item = Some(cx.text(field, "rewardItem")?),
            "noItemLine" => no_item_line = Some(cx.number(field, "noItemLine")?),
            "alreadyRewardedLine" => {
                already_rewarded_line = Some(cx.number(field, "alreadyRewardedLine")?)
            }
            "failurePuzzle" => failure_puzzle = Some(cx.text(field, "failurePuzzle")?),
            _ => return Err(cx.unknown_field(field, "chest")),
        }
    }

    Ok(ChestDef {
        npc: cx.require(npc, node, "chest", "npc")?,
        choice_line: cx.require(choice_line, node, "chest", "choiceLine")?,
        true_answer_line: cx.require(true_answer_line, node, "chest", "trueAnswerLine")?,
        truth_chest,
        required_item,
        reward_item,
        no_item_line: cx.require(no_item_line, node, "chest", "noItemLine")?,
        already_rewarded_line: cx.require(
            already_rewarded_line,
            node,
            "chest",
            "alreadyRewardedLine",
        )?,
        failure_puzzle,
    })
}

fn parse_door_def(cx: &DocContext<'_, '_>, node: Node<'_, '_>) -> Result<DoorDef, ContentCompileError> {
    let mut def_name = None;
    let mut label = None;
    let mut starts_locked = true;
    let mut exit_position = None;
    let mut exit_boundary = None;

    for field in cx.fields(node, "DoorDef")? {
        match field.tag_name().name() {
            "defName" => def_name = Some(cx.text(field, "defName")?),
            "label" => label = Some(cx.text(field, "label")?),
            "startsLocked" => starts_locked = cx.flag(field, "startsLocked")?,
            "exitPoint" => exit_position = Some(cx.position(field, "exitPoint")?),
            "exitBoundary" => exit_boundary = Some(cx.text(field, "exitBoundary")?),
            _ => return Err(cx.unknown_field(field, "DoorDef")),
        }
    }

    let def_name = cx.require(def_name, node, "DoorDef", "defName")?;
    Ok(DoorDef {
        label: label.unwrap_or_else(|| def_name.clone()),
        def_name,
        starts_locked,
        exit_position,
        exit_boundary,
    })
}

fn parse_exit_def(cx: &DocContext<'_, '_>, node: Node<'_, '_>) -> Result<ExitDef, ContentCompileError> {
    let mut def_name = None;
    let mut label = None;
    let mut required_item = None;
    let mut next_scene = None;

    for field in cx.fields(node, "ExitDef")? {
        match field.tag_name().name() {
            "defName" => def_name = Some(cx.text(field, "defName")?),
            "label" => label = Some(cx.text(field, "label")?),
            "requiredItem" => required_item = Some(cx.text(field, "requiredItem")?),
            "nextScene" => next_scene = Some(cx.text(field, "nextScene")?),
            _ => return Err(cx.unknown_field(field, "ExitDef")),
        }
    }

    let def_name = cx.require(def_name, node, "ExitDef", "defName")?;
    Ok(ExitDef {
        label: label.unwrap_or_else(|| def_name.clone()),
        next_scene: cx.require(next_scene, node, "ExitDef", "nextScene")?,
        def_name,
        required_item,
    })
}

fn parse_npc_def(cx: &DocContext<'_, '_>, node: Node<'_, '_>) -> Result<NpcDef, ContentCompileError> {
    let mut def_name = None;
    let mut label = None;
    let mut typing_speed = DEFAULT_TYPING_SPEED_SECONDS;
    let mut auto_progress_delay = DEFAULT_AUTO_PROGRESS_DELAY_SECONDS;
    let mut lines = None;
    let mut choices = Vec::<(Node<'_, '_>, DialogueChoice)>::new();
    let mut hint = None;

    for field in cx.fields(node, "NpcDef")? {
        match field.tag_name().name() {
            "defName" => def_name = Some(cx.text(field, "defName")?),
            "label" => label = Some(cx.text(field, "label")?),
            "typingSpeed" => typing_speed = cx.seconds(field, "typingSpeed")?,
            "autoProgressDelay" => auto_progress_delay = cx.seconds(field, "autoProgressDelay")?,
            "lines" => {
                let mut parsed = Vec::new();
                for li in cx.list_items(field, "lines")? {
                    parsed.push(DialogueLine {
                        text: li.text().map(str::trim).unwrap_or_default().to_string(),
                        auto_progress: cx.attr_flag(li, "autoProgress")?,
                        ends_dialogue: cx.attr_flag(li, "endsDialogue")?,
                    });
                }
                lines = Some((field, parsed));
            }
            "choices" => {
                for li in cx.list_items(field, "choices")? {
                    choices.push((li, parse_choice(cx, li)?));
                }
            }
            "hint" => hint = Some((field, parse_hint(cx, field)?)),
            _ => return Err(cx.unknown_field(field, "NpcDef")),
        }
    }

    let def_name = cx.require(def_name, node, "NpcDef", "defName")?;
    let (lines_node, lines) = cx.require(lines, node, "NpcDef", "lines")?;
    if lines.is_empty() {
        return Err(cx.error(
            ContentErrorCode::InvalidValue,
            format!("npc '{def_name}' must define at least one line"),
            lines_node,
        ));
    }
    let line_count = lines.len();
    let check_line = |line: usize, what: &str, at: Node<'_, '_>| {
        if line < line_count {
            Ok(())
        } else {
            Err(cx.error(
                ContentErrorCode::InvalidValue,
                format!("{what} {line} is out of range for npc '{def_name}' ({line_count} lines)"),
                at,
            ))
        }
    };

    let mut choice_lines = HashSet::<usize>::new();
    for (at, choice) in &choices {
        check_line(choice.line, "choice line", *at)?;
        if !choice_lines.insert(choice.line) {
            return Err(cx.error(
                ContentErrorCode::InvalidValue,
                format!("line {} declares more than one choice set", choice.line),
                *at,
            ));
        }
        for option in &choice.options {
            check_line(option.target, "choice target", *at)?;
        }
    }
    if let Some((at, hint)) = &hint {
        check_line(hint.choice_line, "hint choiceLine", *at)?;
        check_line(hint.end_line, "hint endLine", *at)?;
        for target in &hint.response_targets {
            check_line(*target, "hint response", *at)?;
        }
    }

    Ok(NpcDef {
        dialogue: NpcDialogue {
            speaker: label.unwrap_or_else(|| def_name.clone()),
            lines,
            choices: choices.into_iter().map(|(_, choice)| choice).collect(),
            typing_speed,
            auto_progress_delay,
            hint: hint.map(|(_, hint)| hint),
        },
        def_name,
    })
}

fn parse_choice(
    cx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<DialogueChoice, ContentCompileError> {
    let line = cx.attr_number(node, "line")?;
    let mut options = Vec::new();
    for option in node.children().filter(|child| child.is_element()) {
        if option.tag_name().name() != "option" {
            return Err(cx.unknown_field(option, "choice"));
        }
        options.push(ChoiceOption {
            label: cx.text(option, "option")?,
            target: cx.attr_number(option, "target")?,
        });
    }
    if options.is_empty() {
        return Err(cx.error(
            ContentErrorCode::MissingField,
            "choice must contain at least one <option>".to_string(),
            node,
        ));
    }
    Ok(DialogueChoice { line, options })
}

fn parse_hint(cx: &DocContext<'_, '_>, node: Node<'_, '_>) -> Result<HintGiver, ContentCompileError> {
    let mut choice_line = None;
    let mut end_line = None;
    let mut response_targets = Vec::new();
    for field in cx.fields(node, "hint")? {
        match field.tag_name().name() {
            "choiceLine" => choice_line = Some(cx.number(field, "choiceLine")?),
            "endLine" => end_line = Some(cx.number(field, "endLine")?),
            "responses" => {
                for li in cx.list_items(field, "responses")? {
                    response_targets.push(cx.number(li, "li")?);
                }
            }
            _ => return Err(cx.unknown_field(field, "hint")),
        }
    }
    Ok(HintGiver {
        choice_line: cx.require(choice_line, node, "hint", "choiceLine")?,
        response_targets,
        end_line: cx.require(end_line, node, "hint", "endLine")?,
    })
}

fn parse_level_def(cx: &DocContext<'_, '_>, node: Node<'_, '_>) -> Result<LevelDef, ContentCompileError> {
    let mut scene_name = None;
    let mut scene_index = 0;
    let mut slot_count = None;
    let mut default_boundary = None;
    let mut boundaries = Vec::new();
    let mut player_spawn = [0.0; 3];

    for field in cx.fields(node, "LevelDef")? {
        match field.tag_name().name() {
            "sceneName" => scene_name = Some(cx.text(field, "sceneName")?),
            "sceneIndex" => scene_index = cx.number(field, "sceneIndex")?,
            "slotCount" => {
                let value: usize = cx.number(field, "slotCount")?;
                if value == 0 {
                    return Err(cx.error(
                        ContentErrorCode::InvalidValue,
                        "slotCount must be >= 1".to_string(),
                        field,
                    ));
                }
                slot_count = Some(value);
            }
            "defaultBoundary" => default_boundary = Some(cx.text(field, "defaultBoundary")?),
            "boundaries" => {
                for li in cx.list_items(field, "boundaries")? {
                    boundaries.push(cx.text(li, "li")?);
                }
            }
            "playerSpawn" => player_spawn = cx.position(field, "playerSpawn")?,
            _ => return Err(cx.unknown_field(field, "LevelDef")),
        }
    }

    let default_boundary = cx.require(default_boundary, node, "LevelDef", "defaultBoundary")?;
    if !boundaries.contains(&default_boundary) {
        boundaries.insert(0, default_boundary.clone());
    }
    Ok(LevelDef {
        scene_name: cx.require(scene_name, node, "LevelDef", "sceneName")?,
        scene_index,
        slot_count: cx.require(slot_count, node, "LevelDef", "slotCount")?,
        default_boundary,
        boundaries,
        player_spawn,
    })
}

struct DocContext<'a, 'input> {
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl DocContext<'_, '_> {
    fn location(&self, node: Node<'_, '_>) -> SourceLocation {
        let pos = self.doc.text_pos_at(node.range().start);
        SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }
    }

    fn located<T>(&self, node: Node<'_, '_>, value: T) -> Located<T> {
        Located {
            value,
            file_path: self.file_path.to_path_buf(),
            location: self.location(node),
        }
    }

    fn error(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        ContentCompileError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: Some(self.location(node)),
        }
    }

    fn unknown_field(&self, field: Node<'_, '_>, owner: &str) -> ContentCompileError {
        self.error(
            ContentErrorCode::UnknownField,
            format!("unknown field <{}> in <{}>", field.tag_name().name(), owner),
            field,
        )
    }

    /// Element children of `node`, rejecting repeated field names.
    fn fields<'n, 'i>(
        &self,
        node: Node<'n, 'i>,
        owner: &str,
    ) -> Result<Vec<Node<'n, 'i>>, ContentCompileError> {
        let mut seen = HashSet::<&str>::new();
        let mut fields = Vec::new();
        for field in node.children().filter(|child| child.is_element()) {
            if !seen.insert(field.tag_name().name()) {
                return Err(self.error(
                    ContentErrorCode::DuplicateField,
                    format!("duplicate field <{}> in <{}>", field.tag_name().name(), owner),
                    field,
                ));
            }
            fields.push(field);
        }
        Ok(fields)
    }

    fn list_items<'n, 'i>(
        &self,
        node: Node<'n, 'i>,
        owner: &str,
    ) -> Result<Vec<Node<'n, 'i>>, ContentCompileError> {
        let mut items = Vec::new();
        for child in node.children().filter(|child| child.is_element()) {
            if child.tag_name().name() != "li" {
                return Err(self.error(
                    ContentErrorCode::UnknownField,
                    format!("<{owner}> may only contain <li> entries"),
                    child,
                ));
            }
            items.push(child);
        }
        Ok(items)
    }

    fn require<T>(
        &self,
        value: Option<T>,
        node: Node<'_, '_>,
        owner: &str,
        field: &str,
    ) -> Result<T, ContentCompileError> {
        value.ok_or_else(|| {
            self.error(
                ContentErrorCode::MissingField,
                format!("missing required field <{field}> in <{owner}>"),
                node,
            )
        })
    }

    fn text(&self, node: Node<'_, '_>, field_name: &str) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error(
                ContentErrorCode::MissingField,
                format!("field <{field_name}> must not be empty"),
                node,
            ));
        }
        Ok(value)
    }

    fn number<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<T, ContentCompileError> {
        let value = self.text(node, field_name)?;
        value.parse::<T>().map_err(|_| {
            self.error(
                ContentErrorCode::InvalidValue,
                format!("{field_name} '{value}' is not a valid number"),
                node,
            )
        })
    }

    fn seconds(&self, node: Node<'_, '_>, field_name: &str) -> Result<f32, ContentCompileError> {
        let value: f32 = self.number(node, field_name)?;
        if !value.is_finite() || value < 0.0 {
            return Err(self.error(
                ContentErrorCode::InvalidValue,
                format!("{field_name} must be finite and >= 0"),
                node,
            ));
        }
        Ok(value)
    }

    /// Parses `"x y z"`.
    fn position(&self, node: Node<'_, '_>, field_name: &str) -> Result<[f32; 3], ContentCompileError> {
        let value = self.text(node, field_name)?;
        let parts = value
            .split_whitespace()
            .map(str::parse::<f32>)
            .collect::<Result<Vec<_>, _>>()
            .ok()
            .filter(|parts| parts.len() == 3 && parts.iter().all(|v| v.is_finite()));
        match parts {
            Some(parts) => Ok([parts[0], parts[1], parts[2]]),
            None => Err(self.error(
                ContentErrorCode::InvalidValue,
                format!("{field_name} '{value}' must be three finite numbers 'x y z'"),
                node,
            )),
        }
    }

    fn flag(&self, node: Node<'_, '_>, field_name: &str) -> Result<bool, ContentCompileError> {
        let value = self.text(node, field_name)?;
        parse_bool(&value).ok_or_else(|| {
            self.error(
                ContentErrorCode::InvalidValue,
                format!("{field_name} '{value}' must be true or false"),
                node,
            )
        })
    }

    fn attr_flag(&self, node: Node<'_, '_>, name: &str) -> Result<bool, ContentCompileError> {
        match node.attribute(name) {
            None => Ok(false),
            Some(value) => parse_bool(value).ok_or_else(|| {
                self.error(
                    ContentErrorCode::InvalidValue,
                    format!("attribute {name}='{value}' must be true or false"),
                    node,
                )
            }),
        }
    }

    fn attr_number(&self, node: Node<'_, '_>, name: &str) -> Result<usize, ContentCompileError> {
        let Some(value) = node.attribute(name) else {
            return Err(self.error(
                ContentErrorCode::MissingField,
                format!("missing required attribute '{name}' on <{}>", node.tag_name().name()),
                node,
            ));
        };
        value.trim().parse::<usize>().map_err(|_| {
            self.error(
                ContentErrorCode::InvalidValue,
                format!("attribute {name}='{value}' is not a valid line index"),
                node,
            )
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<PathBuf>::new();
    collect_recursive(root, &mut files)?;
    files.sort_by_key(|path| normalize_rel_path(path.strip_prefix(root).unwrap_or(path)));
    Ok(files)
}

fn collect_recursive(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read XML file: {source}"),
        file_path: path,
        location: None,
    }
}
