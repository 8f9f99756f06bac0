use tracing::debug;

use crate::state::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitSubmit {
    Solved { reward: Option<ItemId> },
    Rejected,
}

/// Keypad input for one digit-code puzzle.
#[derive(Debug, Clone)]
pub struct DigitCodePad {
    puzzle: usize,
    code: String,
    input: String,
    reward: Option<ItemId>,
}

impl DigitCodePad {
    pub fn new(puzzle: usize, code: impl Into<String>, reward: Option<ItemId>) -> Self {
        Self {
            puzzle,
            code: code.into(),
            input: String::new(),
            reward,
        }
    }

    pub fn puzzle(&self) -> usize {
        self.puzzle
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Appends a digit. Non-digits and input past the code length are dropped.
    pub fn press(&mut self, digit: char) -> bool {
        if !digit.is_ascii_digit() || self.input.len() >= self.code.len() {
            return false;
        }
        self.input.push(digit);
        true
    }

    pub fn clear(&mut self) {
        self.input.clear();
    }

    pub fn submit(&mut self) -> DigitSubmit {
        let solved = self.input == self.code;
        self.input.clear();
        if solved {
            DigitSubmit::Solved {
                reward: self.reward,
            }
        } else {
            debug!(puzzle = self.puzzle, "digit_code_rejected");
            DigitSubmit::Rejected
        }
    }
}
