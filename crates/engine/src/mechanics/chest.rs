use crate::dialogue::ChoiceOutcome;
use crate::state::{InventoryStore, ItemId};

/// Talking chest bound to one NPC's dialogue. A truth chest rewards the
/// player for picking its true answer; a false chest punishes the same pick
/// by reopening another puzzle.
#[derive(Debug, Clone)]
pub struct ChestPuzzle {
    pub puzzle: usize,
    pub npc: String,
    pub choice_line: usize,
    pub true_answer_line: usize,
    pub truth_chest: bool,
    pub required_item: Option<ItemId>,
    pub reward_item: Option<ItemId>,
    pub no_item_line: usize,
    pub already_rewarded_line: usize,
    pub failure_puzzle: Option<usize>,
}

/// What a choice at the chest's choice line does to the game state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChestResolution {
    pub truth_chest: bool,
    pub correct: bool,
    pub take: Option<ItemId>,
    pub give: Option<ItemId>,
    pub complete: Option<usize>,
    pub reset: Option<usize>,
}

impl ChestPuzzle {
    /// Entry line when the player arrives without the required item.
    pub fn entry_override(&self, inventory: &InventoryStore) -> Option<usize> {
        let required = self.required_item?;
        if inventory.has_item(required) {
            return None;
        }
        let has_reward = self
            .reward_item
            .is_some_and(|reward| inventory.has_item(reward));
        Some(if has_reward {
            self.already_rewarded_line
        } else {
            self.no_item_line
        })
    }

    /// `None` when the choice was not made on this chest's choice line.
    pub fn resolve(
        &self,
        choice: &ChoiceOutcome,
        inventory: &InventoryStore,
    ) -> Option<ChestResolution> {
        if choice.npc != self.npc || choice.from_line != self.choice_line {
            return None;
        }
        let correct = choice.target == self.true_answer_line;
        let mut resolution = ChestResolution {
            truth_chest: self.truth_chest,
            correct,
            take: None,
            give: None,
            complete: None,
            reset: None,
        };
        let held = self
            .required_item
            .filter(|required| inventory.has_item(*required));
        if let (true, Some(required)) = (correct, held) {
            resolution.take = Some(required);
            if self.truth_chest {
                resolution.give = self.reward_item;
                resolution.complete = self.reward_item.map(|_| self.puzzle);
            } else {
                resolution.reset = self.failure_puzzle;
            }
        }
        Some(resolution)
    }
}
