mod analytics;
mod input;
mod loop_runner;
mod session;
mod ui;
mod world;

pub use analytics::{AnalyticsEvent, AnalyticsLog, AnalyticsSink, TracingAnalytics};
pub use input::{InputAction, KeyBindings, HOTBAR_SLOTS};
pub use loop_runner::{FixedStepClock, LoopConfig, StepPlan};
pub use session::{GameSession, Interactable};
pub use ui::{NullUi, UiSink};
pub use world::{HeadlessWorld, Vec3, WorldLink};
