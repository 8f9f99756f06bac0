mod chest;
mod digit_code;
mod symbol;

use std::collections::BTreeMap;

use rand::Rng;
use tracing::warn;

use crate::content::{ContentDatabase, MechanicDef};
use crate::state::{DoorRegistry, ItemId, ItemRegistry};

pub use chest::{ChestPuzzle, ChestResolution};
pub use digit_code::{DigitCodePad, DigitSubmit};
pub use symbol::SymbolLock;

/// Interact-once trigger that hands out an item and completes its puzzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickupTrigger {
    pub puzzle: usize,
    pub item: ItemId,
}

/// Interactive puzzle behavior, keyed by puzzle index.
#[derive(Debug, Clone, Default)]
pub struct PuzzleMechanics {
    digit_codes: BTreeMap<usize, DigitCodePad>,
    symbol_locks: BTreeMap<usize, SymbolLock>,
    pickups: BTreeMap<usize, PickupTrigger>,
    chests: Vec<ChestPuzzle>,
}

impl PuzzleMechanics {
    pub fn from_content(
        content: &ContentDatabase,
        items: &ItemRegistry,
        doors: &DoorRegistry,
        rng: &mut impl Rng,
    ) -> Self {
        let mut mechanics = Self::default();
        let item = |puzzle: &str, name: &Option<String>| -> Option<ItemId> {
            let name = name.as_deref()?;
            let id = items.id_by_name(name);
            if id.is_none() {
                warn!(puzzle, item = name, "mechanic_item_missing");
            }
            id
        };

        for (index, def) in content.puzzles().iter().enumerate() {
            let puzzle = def.def_name.as_str();
            match &def.mechanic {
                None => {}
                Some(MechanicDef::DigitCode(code)) => {
                    let reward = item(puzzle, &code.reward_item);
                    mechanics
                        .digit_codes
                        .insert(index, DigitCodePad::new(index, code.code.clone(), reward));
                }
                Some(MechanicDef::SymbolLock(lock)) => {
                    let door = lock
                        .unlocks_door
                        .as_deref()
                        .and_then(|name| doors.id_by_name(name));
                    mechanics.symbol_locks.insert(
                        index,
                        SymbolLock::new(
                            index,
                            lock.symbol_count,
                            lock.combination.clone(),
                            door,
                            rng,
                        ),
                    );
                }
                Some(MechanicDef::Pickup(pickup)) => {
                    if let Some(item) = item(puzzle, &Some(pickup.item.clone())) {
                        mechanics
                            .pickups
                            .insert(index, PickupTrigger { puzzle: index, item });
                    }
                }
                Some(MechanicDef::Chest(chest)) => mechanics.chests.push(ChestPuzzle {
                    puzzle: index,
                    npc: chest.npc.clone(),
                    choice_line: chest.choice_line,
                    true_answer_line: chest.true_answer_line,
                    truth_chest: chest.truth_chest,
                    required_item: item(puzzle, &chest.required_item),
                    reward_item: item(puzzle, &chest.reward_item),
                    no_item_line: chest.no_item_line,
                    already_rewarded_line: chest.already_rewarded_line,
                    failure_puzzle: chest
                        .failure_puzzle
                        .as_deref()
                        .and_then(|name| content.puzzle_index(name)),
                }),
            }
        }
        mechanics
    }

    /// Analytics label for the puzzle's mechanic.
    pub fn kind(&self, puzzle: usize) -> &'static str {
        if self.digit_codes.contains_key(&puzzle) {
            "digit_code"
        } else if self.symbol_locks.contains_key(&puzzle) {
            "symbol"
        } else if self.pickups.contains_key(&puzzle) {
            "pickup"
        } else if self.chests.iter().any(|chest| chest.puzzle == puzzle) {
            "chest"
        } else {
            "puzzle"
        }
    }

    pub fn digit_code(&self, puzzle: usize) -> Option<&DigitCodePad> {
        self.digit_codes.get(&puzzle)
    }

    pub fn digit_code_mut(&mut self, puzzle: usize) -> Option<&mut DigitCodePad> {
        self.digit_codes.get_mut(&puzzle)
    }

    pub fn symbol_lock(&self, puzzle: usize) -> Option<&SymbolLock> {
        self.symbol_locks.get(&puzzle)
    }

    pub fn symbol_lock_mut(&mut self, puzzle: usize) -> Option<&mut SymbolLock> {
        self.symbol_locks.get_mut(&puzzle)
    }

    pub fn pickup(&self, puzzle: usize) -> Option<PickupTrigger> {
        self.pickups.get(&puzzle).copied()
    }

    pub fn chest_for_npc(&self, npc: &str) -> Option<&ChestPuzzle> {
        self.chests.iter().find(|chest| chest.npc == npc)
    }
}
