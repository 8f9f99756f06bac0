use std::collections::HashMap;

use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GameCommand {
    Key { key: String },
    Focus { target: FocusTarget },
    Talk { npc: String },
    Advance,
    Choose { target: usize },
    EndDialogue,
    Show { puzzle: String },
    Hide { puzzle: String },
    Digits { puzzle: String, digits: String },
    ClearDigits { puzzle: String },
    Submit { puzzle: String },
    Cycle { puzzle: String, slot: usize },
    Wait { seconds: f32 },
    Level { scene: String },
    Bind { action: String, key: String },
    Unbind { action: String },
    Status,
    Save,
    Load,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FocusTarget {
    Npc(String),
    Puzzle(String),
    Door(String),
    Pickup(String),
    Exit(String),
    Nothing,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LocalAction {
    Help,
    Echo { text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParsedCommand {
    Local(LocalAction),
    Game(GameCommand),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandParseError {
    reason: String,
    usage: String,
}

const MAX_WAIT_SECONDS: f32 = 3600.0;

type ParseFn = fn(&[String]) -> Result<ParsedCommand, CommandParseError>;

struct CommandSpec {
    name: &'static str,
    help: &'static str,
    arg_schema: &'static str,
    parse: ParseFn,
}

const BUILTINS: &[(&str, &str, &str, ParseFn)] = &[
    ("help", "List commands", "", parse_help),
    ("echo", "Print text", "<text...>", parse_echo),
    ("key", "Press a bound key", "<key>", parse_key),
    (
        "focus",
        "Stand next to something",
        "<npc|puzzle|door|pickup|exit|none> [def_name]",
        parse_focus,
    ),
    ("talk", "Start talking to an NPC", "<npc>", parse_talk),
    ("advance", "Advance the conversation", "", parse_advance),
    ("choose", "Pick a dialogue option", "<target_line:usize>", parse_choose),
    ("end", "End the conversation", "", parse_end),
    ("show", "Open a puzzle", "<puzzle>", parse_show),
    ("hide", "Close a puzzle", "<puzzle>", parse_hide),
    ("digits", "Type digits on a keypad", "<puzzle> <digits>", parse_digits),
    ("clear", "Clear a keypad", "<puzzle>", parse_clear_digits),
    ("submit", "Submit a keypad code", "<puzzle>", parse_submit),
    ("cycle", "Cycle a symbol slot", "<puzzle> <slot:usize>", parse_cycle),
    ("wait", "Let time pass", "<seconds:f32>", parse_wait),
    ("level", "Enter a level", "<scene>", parse_level),
    ("bind", "Rebind an action", "<action> <key>", parse_bind),
    ("unbind", "Restore an action's default key", "<action>", parse_unbind),
    ("status", "Print game state", "", parse_status),
    ("save", "Write the save file", "", parse_save),
    ("load", "Restore the save file", "", parse_load),
    ("quit", "Save bindings and exit", "", parse_quit),
];

/// Console commands, matched case-insensitively and listed in registration
/// order.
pub(crate) struct CommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl CommandRegistry {
    pub(crate) fn with_builtins() -> Self {
        let mut registry = Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        };
        for (name, help, arg_schema, parse) in BUILTINS {
            if let Err(error) = registry.register(name, help, arg_schema, *parse) {
                warn!(command = name, error = %error, "console_command_registration_failed");
            }
        }
        registry
    }

    fn register(
        &mut self,
        name: &'static str,
        help: &'static str,
        arg_schema: &'static str,
        parse: ParseFn,
    ) -> Result<(), String> {
        if name.trim().is_empty() {
            return Err("command name cannot be empty".to_string());
        }
        let lower = name.to_ascii_lowercase();
        if self.lookup_by_lower_name.contains_key(&lower) {
            return Err(format!("duplicate command registration: {name}"));
        }
        self.specs.push(CommandSpec {
            name,
            help,
            arg_schema,
            parse,
        });
        self.lookup_by_lower_name
            .insert(lower, self.specs.len() - 1);
        Ok(())
    }

    fn lookup(&self, input_name: &str) -> Option<&CommandSpec> {
        let index = self
            .lookup_by_lower_name
            .get(&input_name.to_ascii_lowercase())?;
        self.specs.get(*index)
    }

    pub(crate) fn help_lines(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|spec| {
                if spec.arg_schema.is_empty() {
                    format!("{} - {}", spec.name, spec.help)
                } else {
                    format!("{} {} - {}", spec.name, spec.arg_schema, spec.help)
                }
            })
            .collect()
    }

    /// Parses one input line. `Ok(None)` for blank lines; `Err` carries the
    /// message to print.
    pub(crate) fn parse_line(&self, raw_line: &str) -> Result<Option<ParsedCommand>, String> {
        let tokens = tokenize_line(raw_line.trim())
            .map_err(|reason| format!("error: {reason}. usage: help"))?;
        let Some((command_name, args)) = tokens.split_first() else {
            return Ok(None);
        };
        let Some(spec) = self.lookup(command_name) else {
            return Err(format!("error: unknown command '{command_name}'. try: help"));
        };
        (spec.parse)(args)
            .map(Some)
            .map_err(|error| format!("error: {}. usage: {}", error.reason, error.usage))
    }
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut pending = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                pending = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if pending {
                    tokens.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            _ => {
                current.push(ch);
                pending = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }
    if pending {
        tokens.push(current);
    }
    Ok(tokens)
}

fn usage_error(reason: impl Into<String>, usage: &str) -> CommandParseError {
    CommandParseError {
        reason: reason.into(),
        usage: usage.to_string(),
    }
}

fn require_no_args(args: &[String], usage: &str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(usage_error("unexpected extra arguments", usage))
    }
}

fn one_arg<'a>(args: &'a [String], name: &str, usage: &str) -> Result<&'a str, CommandParseError> {
    match args {
        [only] => Ok(only.as_str()),
        _ => Err(usage_error(
            format!("expected exactly one argument <{name}>"),
            usage,
        )),
    }
}

fn parse_number<T: std::str::FromStr>(
    raw: &str,
    what: &str,
    expected: &str,
    usage: &str,
) -> Result<T, CommandParseError> {
    raw.parse::<T>().map_err(|_| {
        usage_error(
            format!("invalid {what} '{raw}' (expected {expected})"),
            usage,
        )
    })
}

fn parse_help(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "help")?;
    Ok(ParsedCommand::Local(LocalAction::Help))
}

fn parse_echo(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    if args.is_empty() {
        return Err(usage_error(
            "missing required argument <text...>",
            "echo <text...>",
        ));
    }
    Ok(ParsedCommand::Local(LocalAction::Echo {
        text: args.join(" "),
    }))
}

fn parse_key(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let key = one_arg(args, "key", "key <key>")?;
    Ok(ParsedCommand::Game(GameCommand::Key {
        key: key.to_string(),
    }))
}

fn parse_focus(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "focus <npc|puzzle|door|pickup|exit> <def_name> | focus none";
    let target = match args {
        [kind] if kind.eq_ignore_ascii_case("none") => FocusTarget::Nothing,
        [kind, name] => match kind.to_ascii_lowercase().as_str() {
            "npc" => FocusTarget::Npc(name.clone()),
            "puzzle" => FocusTarget::Puzzle(name.clone()),
            "door" => FocusTarget::Door(name.clone()),
            "pickup" => FocusTarget::Pickup(name.clone()),
            "exit" => FocusTarget::Exit(name.clone()),
            _ => {
                return Err(usage_error(
                    format!("unknown focus kind '{kind}' (expected npc|puzzle|door|pickup|exit)"),
                    USAGE,
                ))
            }
        },
        _ => return Err(usage_error("expected <kind> <def_name> or none", USAGE)),
    };
    Ok(ParsedCommand::Game(GameCommand::Focus { target }))
}

fn parse_talk(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let npc = one_arg(args, "npc", "talk <npc>")?;
    Ok(ParsedCommand::Game(GameCommand::Talk {
        npc: npc.to_string(),
    }))
}

fn parse_advance(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "advance")?;
    Ok(ParsedCommand::Game(GameCommand::Advance))
}

fn parse_choose(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "choose <target_line>";
    let raw = one_arg(args, "target_line", USAGE)?;
    let target = parse_number(raw, "target line", "usize", USAGE)?;
    Ok(ParsedCommand::Game(GameCommand::Choose { target }))
}

fn parse_end(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "end")?;
    Ok(ParsedCommand::Game(GameCommand::EndDialogue))
}

fn parse_show(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let puzzle = one_arg(args, "puzzle", "show <puzzle>")?.to_string();
    Ok(ParsedCommand::Game(GameCommand::Show { puzzle }))
}

fn parse_hide(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let puzzle = one_arg(args, "puzzle", "hide <puzzle>")?.to_string();
    Ok(ParsedCommand::Game(GameCommand::Hide { puzzle }))
}

fn parse_digits(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "digits <puzzle> <digits>";
    let [puzzle, digits] = args else {
        return Err(usage_error("expected <puzzle> <digits>", USAGE));
    };
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(usage_error(
            format!("invalid digits '{digits}' (expected 0-9 only)"),
            USAGE,
        ));
    }
    Ok(ParsedCommand::Game(GameCommand::Digits {
        puzzle: puzzle.clone(),
        digits: digits.clone(),
    }))
}

fn parse_clear_digits(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let puzzle = one_arg(args, "puzzle", "clear <puzzle>")?.to_string();
    Ok(ParsedCommand::Game(GameCommand::ClearDigits { puzzle }))
}

fn parse_submit(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let puzzle = one_arg(args, "puzzle", "submit <puzzle>")?.to_string();
    Ok(ParsedCommand::Game(GameCommand::Submit { puzzle }))
}

fn parse_cycle(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "cycle <puzzle> <slot>";
    let [puzzle, slot] = args else {
        return Err(usage_error("expected <puzzle> <slot>", USAGE));
    };
    let slot = parse_number(slot, "slot", "usize", USAGE)?;
    Ok(ParsedCommand::Game(GameCommand::Cycle {
        puzzle: puzzle.clone(),
        slot,
    }))
}

fn parse_wait(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "wait <seconds>";
    let raw = one_arg(args, "seconds", USAGE)?;
    let seconds: f32 = parse_number(raw, "duration", "f32", USAGE)?;
    if !seconds.is_finite() || !(0.0..=MAX_WAIT_SECONDS).contains(&seconds) {
        return Err(usage_error(
            format!("invalid duration '{raw}' (expected 0 to {MAX_WAIT_SECONDS} seconds)"),
            USAGE,
        ));
    }
    Ok(ParsedCommand::Game(GameCommand::Wait { seconds }))
}

fn parse_level(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let scene = one_arg(args, "scene", "level <scene>")?.to_string();
    Ok(ParsedCommand::Game(GameCommand::Level { scene }))
}

fn parse_bind(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let [action, key] = args else {
        return Err(usage_error("expected <action> <key>", "bind <action> <key>"));
    };
    Ok(ParsedCommand::Game(GameCommand::Bind {
        action: action.clone(),
        key: key.clone(),
    }))
}

fn parse_unbind(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let action = one_arg(args, "action", "unbind <action>")?.to_string();
    Ok(ParsedCommand::Game(GameCommand::Unbind { action }))
}

fn parse_status(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "status")?;
    Ok(ParsedCommand::Game(GameCommand::Status))
}

fn parse_save(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "save")?;
    Ok(ParsedCommand::Game(GameCommand::Save))
}

fn parse_load(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "load")?;
    Ok(ParsedCommand::Game(GameCommand::Load))
}

fn parse_quit(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "quit")?;
    Ok(ParsedCommand::Game(GameCommand::Quit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Option<ParsedCommand>, String> {
        CommandRegistry::with_builtins().parse_line(line)
    }

    #[test]
    fn help_lists_commands_in_registration_order() {
        let lines = CommandRegistry::with_builtins().help_lines();
        assert_eq!(lines.len(), BUILTINS.len());
        assert_eq!(lines[0], "help - List commands");
        assert_eq!(lines[2], "key <key> - Press a bound key");
        assert_eq!(lines.last().map(String::as_str), Some("quit - Save bindings and exit"));
    }

    #[test]
    fn unknown_command_reports_clear_error() {
        assert_eq!(
            parse("nope"),
            Err("error: unknown command 'nope'. try: help".to_string())
        );
    }

    #[test]
    fn blank_line_is_ignored() {
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn commands_match_case_insensitively() {
        assert_eq!(
            parse("CHOOSE 3"),
            Ok(Some(ParsedCommand::Game(GameCommand::Choose { target: 3 })))
        );
    }

    #[test]
    fn bad_args_report_usage_hint() {
        assert_eq!(
            parse("choose two"),
            Err(
                "error: invalid target line 'two' (expected usize). usage: choose <target_line>"
                    .to_string()
            )
        );
        assert_eq!(
            parse("wait -1"),
            Err(
                "error: invalid duration '-1' (expected 0 to 3600 seconds). usage: wait <seconds>"
                    .to_string()
            )
        );
        assert!(parse("digits puzzle.keypad 12a").is_err());
    }

    #[test]
    fn focus_parses_kind_and_name() {
        assert_eq!(
            parse("focus npc npc.fool"),
            Ok(Some(ParsedCommand::Game(GameCommand::Focus {
                target: FocusTarget::Npc("npc.fool".to_string())
            })))
        );
        assert_eq!(
            parse("focus none"),
            Ok(Some(ParsedCommand::Game(GameCommand::Focus {
                target: FocusTarget::Nothing
            })))
        );
        assert_eq!(
            parse("focus EXIT exit.stairs"),
            Ok(Some(ParsedCommand::Game(GameCommand::Focus {
                target: FocusTarget::Exit("exit.stairs".to_string())
            })))
        );
        assert!(parse("focus chest box").is_err());
    }

    #[test]
    fn tokenizer_handles_quotes_and_errors() {
        assert_eq!(
            tokenize_line("echo \"two words\" \"\" x").expect("tokens"),
            vec!["echo", "two words", "", "x"]
        );
        assert!(tokenize_line("echo \"oops").is_err());
    }
}
