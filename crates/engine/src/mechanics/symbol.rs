use rand::Rng;

use crate::state::{DoorId, StateError};

/// Row of symbol slots that must be cycled into a fixed combination.
#[derive(Debug, Clone)]
pub struct SymbolLock {
    puzzle: usize,
    symbol_count: u32,
    combination: Vec<u32>,
    current: Vec<u32>,
    door: Option<DoorId>,
}

impl SymbolLock {
    pub fn new(
        puzzle: usize,
        symbol_count: u32,
        combination: Vec<u32>,
        door: Option<DoorId>,
        rng: &mut impl Rng,
    ) -> Self {
        let mut lock = Self {
            puzzle,
            symbol_count: symbol_count.max(1),
            current: combination.clone(),
            combination,
            door,
        };
        lock.scramble(rng);
        lock
    }

    pub fn puzzle(&self) -> usize {
        self.puzzle
    }

    pub fn door(&self) -> Option<DoorId> {
        self.door
    }

    pub fn current(&self) -> &[u32] {
        &self.current
    }

    /// Puts every slot on a symbol other than its correct one. With a
    /// single-symbol alphabet the slots stay on the only symbol there is.
    pub fn scramble(&mut self, rng: &mut impl Rng) {
        for (slot, correct) in self.current.iter_mut().zip(&self.combination) {
            *slot = if self.symbol_count <= 1 {
                *correct
            } else {
                let pick = rng.gen_range(0..self.symbol_count - 1);
                if pick >= *correct {
                    pick + 1
                } else {
                    pick
                }
            };
        }
    }

    /// Steps one slot to the next symbol, wrapping around. Returns whether
    /// the lock now shows the full combination.
    pub fn cycle(&mut self, slot: usize) -> Result<bool, StateError> {
        let count = self.current.len();
        let Some(symbol) = self.current.get_mut(slot) else {
            return Err(StateError::OutOfRange {
                store: "symbol_lock",
                index: slot,
                count,
            });
        };
        *symbol = (*symbol + 1) % self.symbol_count;
        Ok(self.is_solved())
    }

    pub fn is_solved(&self) -> bool {
        self.current == self.combination
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn scramble_never_starts_on_the_answer() {
        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let lock = SymbolLock::new(0, 3, vec![0, 1, 2, 2], None, &mut rng);
            for (shown, correct) in lock.current().iter().zip([0, 1, 2, 2]) {
                assert_ne!(*shown, correct);
                assert!(*shown < 3);
            }
        }
    }

    #[test]
    fn single_symbol_alphabet_starts_solved() {
        let mut rng = StdRng::seed_from_u64(7);
        let lock = SymbolLock::new(0, 1, vec![0, 0], None, &mut rng);
        assert!(lock.is_solved());
    }

    #[test]
    fn cycling_wraps_and_reports_solution() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut lock = SymbolLock::new(2, 2, vec![1], Some(DoorId(0)), &mut rng);
        assert_eq!(lock.current(), &[0]);
        assert_eq!(lock.cycle(0), Ok(true));
        assert_eq!(lock.cycle(0), Ok(false));
        assert_eq!(lock.current(), &[0]);
        assert!(lock.cycle(3).is_err());
    }
}
