mod doors;
mod hint;
mod inventory;
mod items;
mod pause;
mod puzzles;

use thiserror::Error;
use tracing::info;

use crate::content::ContentDatabase;
use crate::dialogue::DialogueEngine;

pub use doors::{DoorId, DoorRegistry};
pub use hint::HintState;
pub use inventory::{InventorySnapshotEntry, InventoryStore};
pub use items::{ItemBehavior, ItemDefinition, ItemId, ItemRegistry};
pub use pause::{PauseGate, PauseSource};
pub use puzzles::{PuzzleCompletion, PuzzlePhase, PuzzleRegistry, ShowOutcome};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("{store} index {index} is out of range (count {count})")]
    OutOfRange {
        store: &'static str,
        index: usize,
        count: usize,
    },
    #[error("{store} restore expects {expected} entries, got {actual}")]
    LengthMismatch {
        store: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("unknown {kind} '{name}'")]
    NotFound { kind: &'static str, name: String },
    #[error("{what} is not wired for {owner}")]
    MissingReference { what: &'static str, owner: String },
}

/// Every store the game mutates, owned in one place.
#[derive(Debug, Clone)]
pub struct GameState {
    pub items: ItemRegistry,
    pub inventory: InventoryStore,
    pub puzzles: PuzzleRegistry,
    pub doors: DoorRegistry,
    pub hint: HintState,
    pub dialogue: DialogueEngine,
    pub pause: PauseGate,
    level: String,
}

impl GameState {
    pub fn from_content(content: &ContentDatabase) -> Self {
        Self {
            items: ItemRegistry::from_defs(content.items()),
            inventory: InventoryStore::new(content.level().slot_count),
            puzzles: PuzzleRegistry::new(content.puzzles().len()),
            doors: DoorRegistry::from_defs(content.doors()),
            hint: HintState::default(),
            dialogue: DialogueEngine::new(
                content
                    .npcs()
                    .iter()
                    .map(|npc| (npc.def_name.clone(), npc.dialogue.clone())),
            ),
            pause: PauseGate::default(),
            level: content.level().scene_name.clone(),
        }
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    /// Starts `scene_name`. Entering a different level clears the hint.
    pub fn enter_level(&mut self, scene_name: &str) -> bool {
        if self.level == scene_name {
            return false;
        }
        self.hint.clear();
        self.level = scene_name.to_string();
        info!(scene = scene_name, "level_entered");
        true
    }

    /// Adopts a level name from a save without touching the hint flag.
    pub(crate) fn restore_level(&mut self, scene_name: &str) {
        self.level = scene_name.to_string();
    }

    /// Level defaults: empty inventory, no completions, content door states,
    /// hint unset and no conversation.
    pub fn reset_to_defaults(&mut self) {
        self.inventory = InventoryStore::new(self.inventory.slot_count());
        self.puzzles = PuzzleRegistry::new(self.puzzles.count());
        self.doors.reset_to_defaults();
        self.hint.clear();
        self.dialogue.end();
        self.dialogue.drain_events();
    }
}

#[cfg(test)]
mod tests {
    use crate::content::{DoorDef, ItemDef, LevelDef};

    use super::*;

    fn content() -> ContentDatabase {
        ContentDatabase::new(
            vec![ItemDef {
                def_name: "item.key".to_string(),
                label: "Key".to_string(),
                behavior: ItemBehavior::Usable,
            }],
            Vec::new(),
            vec![DoorDef {
                def_name: "door.a".to_string(),
                label: "A".to_string(),
                starts_locked: true,
                exit_position: None,
                exit_boundary: None,
            }],
            Vec::new(),
            LevelDef {
                slot_count: 4,
                ..LevelDef::default()
            },
        )
    }

    #[test]
    fn entering_a_new_level_clears_the_hint() {
        let mut state = GameState::from_content(&content());
        state.hint.set();
        assert!(!state.enter_level("TheFool"));
        assert!(state.hint.is_set());
        assert!(state.enter_level("TheMagician"));
        assert!(!state.hint.is_set());
        assert_eq!(state.level(), "TheMagician");
    }

    #[test]
    fn reset_restores_level_defaults() {
        let mut state = GameState::from_content(&content());
        state.inventory.add_to_first_empty_slot(ItemId(1));
        state.doors.unlock(DoorId(0)).expect("unlock");
        state.hint.set();
        state.reset_to_defaults();
        assert!(state.inventory.export_snapshot().is_empty());
        assert_eq!(state.inventory.slot_count(), 4);
        assert_eq!(state.doors.export_states(), vec![true]);
        assert!(!state.hint.is_set());
    }
}
