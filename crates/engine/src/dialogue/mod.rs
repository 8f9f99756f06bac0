mod engine;

use thiserror::Error;

pub use engine::{ChoiceOutcome, DialogueEngine, DialogueEvent, DialoguePhase};

pub const DEFAULT_TYPING_SPEED_SECONDS: f32 = 0.05;
pub const DEFAULT_AUTO_PROGRESS_DELAY_SECONDS: f32 = 1.5;

/// Authored conversation for one NPC. Line indices used by choices and the
/// hint configuration are validated when content is compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct NpcDialogue {
    pub speaker: String,
    pub lines: Vec<DialogueLine>,
    pub choices: Vec<DialogueChoice>,
    pub typing_speed: f32,
    pub auto_progress_delay: f32,
    pub hint: Option<HintGiver>,
}

impl NpcDialogue {
    pub fn new(speaker: impl Into<String>, lines: Vec<DialogueLine>) -> Self {
        Self {
            speaker: speaker.into(),
            lines,
            choices: Vec::new(),
            typing_speed: DEFAULT_TYPING_SPEED_SECONDS,
            auto_progress_delay: DEFAULT_AUTO_PROGRESS_DELAY_SECONDS,
            hint: None,
        }
    }

    pub fn choice_at(&self, line: usize) -> Option<&DialogueChoice> {
        self.choices.iter().find(|choice| choice.line == line)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogueLine {
    pub text: String,
    pub auto_progress: bool,
    pub ends_dialogue: bool,
}

impl DialogueLine {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            auto_progress: false,
            ends_dialogue: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogueChoice {
    pub line: usize,
    pub options: Vec<ChoiceOption>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceOption {
    pub label: String,
    pub target: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HintGiver {
    pub choice_line: usize,
    pub response_targets: Vec<usize>,
    pub end_line: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DialogueError {
    #[error("dialogue with '{active}' is already active")]
    AlreadyActive { active: String },
    #[error("npc '{npc}' has no dialogue")]
    NoDialogue { npc: String },
    #[error("no dialogue is active")]
    NotActive,
    #[error("dialogue is not waiting for a choice")]
    NotAwaitingChoice,
    #[error("line {target} is not an offered choice")]
    InvalidChoice { target: usize },
}
