use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PauseSource {
    Menu,
    Inventory,
    Puzzle,
}

impl PauseSource {
    const COUNT: usize = 3;

    const fn index(self) -> usize {
        match self {
            PauseSource::Menu => 0,
            PauseSource::Inventory => 1,
            PauseSource::Puzzle => 2,
        }
    }
}

/// Reference-counted pause. Gameplay stays paused until every source has
/// released all of the tokens it acquired.
#[derive(Debug, Clone, Copy, Default)]
pub struct PauseGate {
    held: [u32; PauseSource::COUNT],
}

impl PauseGate {
    pub fn acquire(&mut self, source: PauseSource) {
        let was_paused = self.is_paused();
        self.held[source.index()] += 1;
        if !was_paused {
            debug!(source = ?source, "gameplay_paused");
        }
    }

    pub fn release(&mut self, source: PauseSource) {
        let count = &mut self.held[source.index()];
        if *count == 0 {
            warn!(source = ?source, "pause_release_without_token");
            return;
        }
        *count -= 1;
        if !self.is_paused() {
            debug!(source = ?source, "gameplay_resumed");
        }
    }

    pub fn holds(&self, source: PauseSource) -> bool {
        self.held[source.index()] > 0
    }

    pub fn is_paused(&self) -> bool {
        self.held.iter().any(|count| *count > 0)
    }

    pub fn time_scale(&self) -> f32 {
        if self.is_paused() {
            0.0
        } else {
            1.0
        }
    }

    pub fn reset(&mut self) {
        self.held = [0; PauseSource::COUNT];
    }
}
