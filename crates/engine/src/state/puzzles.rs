use tracing::{debug, warn};

use super::StateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PuzzlePhase {
    NotStarted,
    Open,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOutcome {
    Opened { closed: Option<usize> },
    AlreadyCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PuzzleCompletion {
    pub index: usize,
    pub newly_completed: bool,
    /// Unscaled seconds since the puzzle was shown, when it was open.
    pub elapsed_seconds: Option<f32>,
}

#[derive(Debug, Clone, Copy)]
struct OpenPuzzle {
    index: usize,
    elapsed_seconds: f32,
}

/// Completion flags for every registered puzzle plus the single open one.
/// The flag list is sized once and never resized.
#[derive(Debug, Clone)]
pub struct PuzzleRegistry {
    completed: Vec<bool>,
    open: Option<OpenPuzzle>,
}

impl PuzzleRegistry {
    pub fn new(count: usize) -> Self {
        Self {
            completed: vec![false; count],
            open: None,
        }
    }

    pub fn count(&self) -> usize {
        self.completed.len()
    }

    pub fn open_puzzle(&self) -> Option<usize> {
        self.open.map(|open| open.index)
    }

    pub fn phase(&self, index: usize) -> Option<PuzzlePhase> {
        let completed = *self.completed.get(index)?;
        Some(if completed {
            PuzzlePhase::Completed
        } else if self.open_puzzle() == Some(index) {
            PuzzlePhase::Open
        } else {
            PuzzlePhase::NotStarted
        })
    }

    /// Advances the timer of the open puzzle.
    pub fn tick(&mut self, dt_seconds: f32) {
        if let Some(open) = self.open.as_mut() {
            open.elapsed_seconds += dt_seconds.max(0.0);
        }
    }

    pub fn show(&mut self, index: usize) -> Result<ShowOutcome, StateError> {
        self.check_index(index, "puzzle_show_rejected")?;
        if self.completed[index] {
            debug!(puzzle = index, "puzzle_already_completed");
            return Ok(ShowOutcome::AlreadyCompleted);
        }
        if self.open_puzzle() == Some(index) {
            return Ok(ShowOutcome::Opened { closed: None });
        }
        let closed = self.open.take().map(|open| open.index);
        self.open = Some(OpenPuzzle {
            index,
            elapsed_seconds: 0.0,
        });
        debug!(puzzle = index, closed = ?closed, "puzzle_opened");
        Ok(ShowOutcome::Opened { closed })
    }

    /// Closes `index` if it is the open puzzle. Completion is unchanged.
    pub fn hide(&mut self, index: usize) -> Result<bool, StateError> {
        self.check_index(index, "puzzle_hide_rejected")?;
        if self.open_puzzle() == Some(index) {
            self.open = None;
            debug!(puzzle = index, "puzzle_closed");
            return Ok(true);
        }
        Ok(false)
    }

    pub fn complete(&mut self, index: usize) -> Result<PuzzleCompletion, StateError> {
        self.check_index(index, "puzzle_complete_rejected")?;
        let elapsed_seconds = match self.open {
            Some(open) if open.index == index => {
                self.open = None;
                Some(open.elapsed_seconds)
            }
            _ => None,
        };
        let newly_completed = !self.completed[index];
        self.completed[index] = true;
        Ok(PuzzleCompletion {
            index,
            newly_completed,
            elapsed_seconds,
        })
    }

    pub fn mark_incomplete(&mut self, index: usize) -> Result<bool, StateError> {
        self.check_index(index, "puzzle_mark_incomplete_rejected")?;
        let was_completed = self.completed[index];
        self.completed[index] = false;
        Ok(was_completed)
    }

    /// Out-of-range indices read as not completed.
    pub fn is_completed(&self, index: usize) -> bool {
        match self.completed.get(index) {
            Some(completed) => *completed,
            None => {
                warn!(puzzle = index, count = self.completed.len(), "puzzle_index_out_of_range");
                false
            }
        }
    }

    pub fn export_states(&self) -> Vec<bool> {
        self.completed.clone()
    }

    /// Replaces every flag, or nothing when the lengths differ. A successful
    /// import closes the open puzzle.
    pub fn import_states(&mut self, states: &[bool]) -> Result<(), StateError> {
        if states.len() != self.completed.len() {
            let error = StateError::LengthMismatch {
                store: "puzzles",
                expected: self.completed.len(),
                actual: states.len(),
            };
            warn!(error = %error, "puzzle_restore_rejected");
            return Err(error);
        }
        self.completed.copy_from_slice(states);
        self.open = None;
        Ok(())
    }

    fn check_index(&self, index: usize, event: &'static str) -> Result<(), StateError> {
        if index < self.completed.len() {
            return Ok(());
        }
        let error = StateError::OutOfRange {
            store: "puzzles",
            index,
            count: self.completed.len(),
        };
        warn!(error = %error, event, "puzzle_operation_rejected");
        Err(error)
    }
}
