use tracing::debug;

/// Whether the current level's hint has been given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HintState {
    given: bool,
}

impl HintState {
    pub fn set(&mut self) {
        if !self.given {
            debug!("hint_given");
        }
        self.given = true;
    }

    pub fn clear(&mut self) {
        self.given = false;
    }

    pub fn is_set(&self) -> bool {
        self.given
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_clear_are_idempotent() {
        let mut hint = HintState::default();
        assert!(!hint.is_set());
        hint.set();
        hint.set();
        assert!(hint.is_set());
        hint.clear();
        hint.clear();
        assert!(!hint.is_set());
    }
}
