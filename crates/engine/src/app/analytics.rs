use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

static ANALYTICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_analytics_lock_poison_once(operation: &'static str) {
    if ANALYTICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "analytics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsEvent {
    SessionStart,
    SessionEnd,
    LevelStart {
        level_name: String,
    },
    LevelComplete {
        level_name: String,
        level_index: usize,
    },
    PuzzleAttempt {
        puzzle_index: usize,
        puzzle_type: &'static str,
    },
    PuzzleComplete {
        puzzle_index: usize,
        puzzle_type: &'static str,
        time_taken: f32,
    },
    ItemUsed {
        item_name: String,
        context: &'static str,
    },
    ItemCollected {
        item_name: String,
        source: String,
    },
    DialogueEvent {
        npc_name: String,
        dialogue_index: usize,
        choice: Option<String>,
    },
    ChestChoice {
        truth_chest: bool,
        choice_correct: bool,
    },
}

impl AnalyticsEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AnalyticsEvent::SessionStart => "session_start",
            AnalyticsEvent::SessionEnd => "session_end",
            AnalyticsEvent::LevelStart { .. } => "level_start",
            AnalyticsEvent::LevelComplete { .. } => "level_complete",
            AnalyticsEvent::PuzzleAttempt { .. } => "puzzle_attempt",
            AnalyticsEvent::PuzzleComplete { .. } => "puzzle_complete",
            AnalyticsEvent::ItemUsed { .. } => "item_used",
            AnalyticsEvent::ItemCollected { .. } => "item_collected",
            AnalyticsEvent::DialogueEvent { .. } => "dialogue_event",
            AnalyticsEvent::ChestChoice { .. } => "chest_choice",
        }
    }
}

/// Fire-and-forget telemetry. Implementations must not fail the caller.
pub trait AnalyticsSink {
    fn record(&mut self, event: AnalyticsEvent);
}

/// Writes every event to the log instead of a telemetry backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn record(&mut self, event: AnalyticsEvent) {
        info!(event = event.name(), details = ?event, "analytics_event");
    }
}

/// Shared in-memory event log. Clones share the same buffer, so a caller
/// can keep one handle while the session owns another.
#[derive(Clone, Debug, Default)]
pub struct AnalyticsLog {
    events: Arc<RwLock<Vec<AnalyticsEvent>>>,
}

impl AnalyticsLog {
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        match self.events.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                warn_analytics_lock_poison_once("read");
                poisoned.into_inner().clone()
            }
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(AnalyticsEvent::name).collect()
    }
}

impl AnalyticsSink for AnalyticsLog {
    fn record(&mut self, event: AnalyticsEvent) {
        match self.events.write() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => {
                warn_analytics_lock_poison_once("write");
                poisoned.into_inner().push(event);
            }
        }
    }
}
