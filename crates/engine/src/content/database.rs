use std::collections::HashMap;

use crate::dialogue::NpcDialogue;
use crate::state::ItemBehavior;

#[derive(Debug, Clone, PartialEq)]
pub struct ItemDef {
    pub def_name: String,
    pub label: String,
    pub behavior: ItemBehavior,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PuzzleDef {
    pub def_name: String,
    pub label: String,
    pub mechanic: Option<MechanicDef>,
}

/// Interactive behavior attached to a puzzle. Puzzles without one are driven
/// purely through the registry (for example by an external mini-game).
#[derive(Debug, Clone, PartialEq)]
pub enum MechanicDef {
    DigitCode(DigitCodeDef),
    SymbolLock(SymbolLockDef),
    Pickup(PickupDef),
    Chest(ChestDef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DigitCodeDef {
    pub code: String,
    pub reward_item: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolLockDef {
    pub symbol_count: u32,
    pub combination: Vec<u32>,
    pub unlocks_door: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickupDef {
    pub item: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChestDef {
    pub npc: String,
    pub choice_line: usize,
    pub true_answer_line: usize,
    pub truth_chest: bool,
    pub required_item: Option<String>,
    pub reward_item: Option<String>,
    pub no_item_line: usize,
    pub already_rewarded_line: usize,
    pub failure_puzzle: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoorDef {
    pub def_name: String,
    pub label: String,
    pub starts_locked: bool,
    pub exit_position: Option<[f32; 3]>,
    pub exit_boundary: Option<String>,
}

/// Leaves the level for `next_scene`, optionally gated on holding an item.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitDef {
    pub def_name: String,
    pub label: String,
    pub required_item: Option<String>,
    pub next_scene: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NpcDef {
    pub def_name: String,
    pub dialogue: NpcDialogue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelDef {
    pub scene_name: String,
    pub scene_index: usize,
    pub slot_count: usize,
    pub default_boundary: String,
    pub boundaries: Vec<String>,
    pub player_spawn: [f32; 3],
}

impl Default for LevelDef {
    fn default() -> Self {
        Self {
            scene_name: "TheFool".to_string(),
            scene_index: 0,
            slot_count: 12,
            default_boundary: "Room1".to_string(),
            boundaries: vec!["Room1".to_string()],
            player_spawn: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ContentDatabase {
    items: Vec<ItemDef>,
    puzzles: Vec<PuzzleDef>,
    doors: Vec<DoorDef>,
    npcs: Vec<NpcDef>,
    exits: Vec<ExitDef>,
    level: LevelDef,
    puzzle_index_by_name: HashMap<String, usize>,
    door_index_by_name: HashMap<String, usize>,
    npc_index_by_name: HashMap<String, usize>,
    exit_index_by_name: HashMap<String, usize>,
}

impl ContentDatabase {
    pub fn new(
        items: Vec<ItemDef>,
        puzzles: Vec<PuzzleDef>,
        doors: Vec<DoorDef>,
        npcs: Vec<NpcDef>,
        level: LevelDef,
    ) -> Self {
        let puzzle_index_by_name = index_by_name(puzzles.iter().map(|def| def.def_name.as_str()));
        let door_index_by_name = index_by_name(doors.iter().map(|def| def.def_name.as_str()));
        let npc_index_by_name = index_by_name(npcs.iter().map(|def| def.def_name.as_str()));
        Self {
            items,
            puzzles,
            doors,
            npcs,
            exits: Vec::new(),
            level,
            puzzle_index_by_name,
            door_index_by_name,
            npc_index_by_name,
            exit_index_by_name: HashMap::new(),
        }
    }

    pub fn with_exits(mut self, exits: Vec<ExitDef>) -> Self {
        self.exit_index_by_name = index_by_name(exits.iter().map(|def| def.def_name.as_str()));
        self.exits = exits;
        self
    }

    pub fn items(&self) -> &[ItemDef] {
        &self.items
    }

    pub fn puzzles(&self) -> &[PuzzleDef] {
        &self.puzzles
    }

    pub fn doors(&self) -> &[DoorDef] {
        &self.doors
    }

    pub fn npcs(&self) -> &[NpcDef] {
        &self.npcs
    }

    pub fn exits(&self) -> &[ExitDef] {
        &self.exits
    }

    pub fn level(&self) -> &LevelDef {
        &self.level
    }

    pub fn puzzle_index(&self, def_name: &str) -> Option<usize> {
        self.puzzle_index_by_name.get(def_name).copied()
    }

    pub fn door_index(&self, def_name: &str) -> Option<usize> {
        self.door_index_by_name.get(def_name).copied()
    }

    pub fn exit_index(&self, def_name: &str) -> Option<usize> {
        self.exit_index_by_name.get(def_name).copied()
    }

    pub fn npc(&self, def_name: &str) -> Option<&NpcDef> {
        self.npc_index_by_name
            .get(def_name)
            .and_then(|idx| self.npcs.get(*idx))
    }
}

fn index_by_name<'a>(names: impl Iterator<Item = &'a str>) -> HashMap<String, usize> {
    names
        .enumerate()
        .map(|(idx, name)| (name.to_string(), idx))
        .collect()
}
