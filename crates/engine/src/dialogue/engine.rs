use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::state::HintState;

use super::{ChoiceOption, DialogueError, NpcDialogue};

/// Timers within this many seconds of expiry count as expired.
const TIMER_EPSILON: f32 = 1e-6;
/// Upper bound on line transitions resolved inside one tick.
const MAX_STEPS_PER_TICK: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialoguePhase {
    Idle,
    Typing,
    Revealed,
    AutoAdvancing,
    AwaitingChoice,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DialogueEvent {
    Started {
        npc: String,
        speaker: String,
        entry_line: usize,
    },
    LineStarted {
        npc: String,
        line: usize,
    },
    ChoicesShown {
        npc: String,
        line: usize,
        labels: Vec<String>,
    },
    ChoiceMade {
        npc: String,
        from_line: usize,
        target: usize,
    },
    Ended {
        npc: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOutcome {
    pub npc: String,
    pub from_line: usize,
    pub target: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Typing { elapsed: f32 },
    Revealed,
    AutoAdvancing { remaining: f32 },
    AwaitingChoice,
}

#[derive(Debug, Clone)]
struct Session {
    npc: String,
    line: usize,
    step: Step,
}

/// Conversation state machine for every NPC. At most one conversation runs
/// at a time; time only moves through [`tick`](Self::tick).
#[derive(Debug, Clone, Default)]
pub struct DialogueEngine {
    dialogues: BTreeMap<String, NpcDialogue>,
    session: Option<Session>,
    events: Vec<DialogueEvent>,
}

impl DialogueEngine {
    pub fn new(dialogues: impl IntoIterator<Item = (String, NpcDialogue)>) -> Self {
        Self {
            dialogues: dialogues.into_iter().collect(),
            session: None,
            events: Vec::new(),
        }
    }

    pub fn dialogue(&self, npc: &str) -> Option<&NpcDialogue> {
        self.dialogues.get(npc)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn active_npc(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.npc.as_str())
    }

    pub fn line_index(&self) -> Option<usize> {
        self.session.as_ref().map(|session| session.line)
    }

    pub fn phase(&self) -> DialoguePhase {
        match self.session.as_ref().map(|session| session.step) {
            None => DialoguePhase::Idle,
            Some(Step::Typing { .. }) => DialoguePhase::Typing,
            Some(Step::Revealed) => DialoguePhase::Revealed,
            Some(Step::AutoAdvancing { .. }) => DialoguePhase::AutoAdvancing,
            Some(Step::AwaitingChoice) => DialoguePhase::AwaitingChoice,
        }
    }

    /// The part of the current line revealed so far.
    pub fn visible_text(&self) -> &str {
        let Some((session, dialogue)) = self.active() else {
            return "";
        };
        let Some(line) = dialogue.lines.get(session.line) else {
            return "";
        };
        match session.step {
            Step::Typing { elapsed } => {
                let shown = revealed_chars(elapsed, dialogue.typing_speed, &line.text);
                match line.text.char_indices().nth(shown) {
                    Some((byte_idx, _)) => &line.text[..byte_idx],
                    None => &line.text,
                }
            }
            _ => &line.text,
        }
    }

    pub fn choice_options(&self) -> &[ChoiceOption] {
        match self.active() {
            Some((session, dialogue)) if session.step == Step::AwaitingChoice => dialogue
                .choice_at(session.line)
                .map(|choice| choice.options.as_slice())
                .unwrap_or_default(),
            _ => &[],
        }
    }

    pub fn drain_events(&mut self) -> Vec<DialogueEvent> {
        std::mem::take(&mut self.events)
    }

    /// Opens a conversation. The entry line is `entry_override` when given
    /// and valid, else the hint end line for a hint giver whose hint was
    /// already given, else line 0.
    pub fn start(
        &mut self,
        npc: &str,
        entry_override: Option<usize>,
        hint: &HintState,
    ) -> Result<(), DialogueError> {
        if let Some(active) = self.active_npc() {
            let error = DialogueError::AlreadyActive {
                active: active.to_string(),
            };
            warn!(npc, error = %error, "dialogue_start_rejected");
            return Err(error);
        }
        let Some(dialogue) = self.dialogues.get(npc).filter(|d| !d.lines.is_empty()) else {
            let error = DialogueError::NoDialogue {
                npc: npc.to_string(),
            };
            warn!(npc, error = %error, "dialogue_start_rejected");
            return Err(error);
        };

        let hint_entry = dialogue
            .hint
            .as_ref()
            .filter(|_| hint.is_set())
            .map(|giver| giver.end_line);
        let entry_line = match entry_override {
            Some(line) if line < dialogue.lines.len() => line,
            Some(line) => {
                warn!(npc, line, "dialogue_entry_override_out_of_range");
                hint_entry.unwrap_or(0)
            }
            None => hint_entry.unwrap_or(0),
        };

        self.events.push(DialogueEvent::Started {
            npc: npc.to_string(),
            speaker: dialogue.speaker.clone(),
            entry_line,
        });
        self.session = Some(Session {
            npc: npc.to_string(),
            line: entry_line,
            step: Step::Typing { elapsed: 0.0 },
        });
        debug!(npc, entry_line, "dialogue_started");
        self.begin_line(entry_line);
        Ok(())
    }

    /// Advances typing and auto-progress timers by `dt_seconds` of unscaled
    /// time.
    pub fn tick(&mut self, dt_seconds: f32, hint: &HintState) {
        let mut budget = dt_seconds.max(0.0);
        for _ in 0..MAX_STEPS_PER_TICK {
            let Some((session, dialogue)) = self.active() else {
                return;
            };
            match session.step {
                Step::Typing { elapsed } => {
                    let total = typing_duration(dialogue, session.line);
                    let needed = total - elapsed;
                    if budget + TIMER_EPSILON < needed {
                        self.set_step(Step::Typing {
                            elapsed: elapsed + budget,
                        });
                        return;
                    }
                    budget = (budget - needed.max(0.0)).max(0.0);
                    self.finish_typing();
                }
                Step::AutoAdvancing { remaining } => {
                    if budget + TIMER_EPSILON < remaining {
                        self.set_step(Step::AutoAdvancing {
                            remaining: remaining - budget,
                        });
                        return;
                    }
                    budget = (budget - remaining).max(0.0);
                    self.next_step(hint);
                }
                Step::Revealed | Step::AwaitingChoice => return,
            }
        }
        warn!(npc = ?self.active_npc(), "dialogue_tick_step_limit");
    }

    /// Player interaction: completes a line being typed and moves on.
    /// Ignored while choices are on screen.
    pub fn advance(&mut self, hint: &HintState) -> Result<(), DialogueError> {
        let Some(session) = self.session.as_ref() else {
            return Err(DialogueError::NotActive);
        };
        match session.step {
            Step::AwaitingChoice => {
                debug!(npc = %session.npc, "dialogue_advance_ignored_awaiting_choice");
            }
            Step::Typing { .. } | Step::Revealed | Step::AutoAdvancing { .. } => {
                self.next_step(hint);
            }
        }
        Ok(())
    }

    pub fn choose_option(
        &mut self,
        target: usize,
        hint: &mut HintState,
    ) -> Result<ChoiceOutcome, DialogueError> {
        let Some((session, dialogue)) = self.active() else {
            return Err(DialogueError::NotActive);
        };
        if session.step != Step::AwaitingChoice {
            return Err(DialogueError::NotAwaitingChoice);
        }
        let offered = dialogue
            .choice_at(session.line)
            .is_some_and(|choice| choice.options.iter().any(|option| option.target == target));
        if !offered {
            warn!(npc = %session.npc, target, "dialogue_choice_rejected");
            return Err(DialogueError::InvalidChoice { target });
        }
        if dialogue
            .hint
            .as_ref()
            .is_some_and(|giver| giver.response_targets.contains(&target))
        {
            hint.set();
        }

        let outcome = ChoiceOutcome {
            npc: session.npc.clone(),
            from_line: session.line,
            target,
        };
        self.events.push(DialogueEvent::ChoiceMade {
            npc: outcome.npc.clone(),
            from_line: outcome.from_line,
            target,
        });
        self.begin_line(target);
        Ok(outcome)
    }

    /// Returns to idle from any phase. Returns whether a conversation ended.
    pub fn end(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        debug!(npc = %session.npc, line = session.line, "dialogue_ended");
        self.events.push(DialogueEvent::Ended { npc: session.npc });
        true
    }

    fn active(&self) -> Option<(&Session, &NpcDialogue)> {
        let session = self.session.as_ref()?;
        let dialogue = self.dialogues.get(&session.npc)?;
        Some((session, dialogue))
    }

    fn set_step(&mut self, step: Step) {
        if let Some(session) = self.session.as_mut() {
            session.step = step;
        }
    }

    fn begin_line(&mut self, line: usize) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.line = line;
        session.step = Step::Typing { elapsed: 0.0 };
        self.events.push(DialogueEvent::LineStarted {
            npc: session.npc.clone(),
            line,
        });
    }

    fn finish_typing(&mut self) {
        let Some((session, dialogue)) = self.active() else {
            return;
        };
        let step = match dialogue.lines.get(session.line) {
            Some(line) if line.auto_progress => Step::AutoAdvancing {
                remaining: dialogue.auto_progress_delay,
            },
            _ => Step::Revealed,
        };
        self.set_step(step);
    }

    fn next_step(&mut self, hint: &HintState) {
        let Some((session, dialogue)) = self.active() else {
            return;
        };
        let line_index = session.line;
        let ends = dialogue
            .lines
            .get(line_index)
            .map_or(true, |line| line.ends_dialogue);
        if ends {
            self.end();
            return;
        }

        if let Some(choice) = dialogue.choice_at(line_index) {
            let hint_skip = dialogue
                .hint
                .as_ref()
                .filter(|giver| giver.choice_line == line_index && hint.is_set())
                .map(|giver| giver.end_line);
            if let Some(end_line) = hint_skip {
                debug!(npc = %session.npc, end_line, "dialogue_hint_choice_skipped");
                self.begin_line(end_line);
                return;
            }
            let event = DialogueEvent::ChoicesShown {
                npc: session.npc.clone(),
                line: line_index,
                labels: choice
                    .options
                    .iter()
                    .map(|option| option.label.clone())
                    .collect(),
            };
            self.events.push(event);
            self.set_step(Step::AwaitingChoice);
            return;
        }

        if line_index + 1 < dialogue.lines.len() {
            self.begin_line(line_index + 1);
        } else {
            self.end();
        }
    }
}

fn typing_duration(dialogue: &NpcDialogue, line: usize) -> f32 {
    let chars = dialogue
        .lines
        .get(line)
        .map_or(0, |line| line.text.chars().count());
    chars as f32 * dialogue.typing_speed.max(0.0)
}

fn revealed_chars(elapsed: f32, typing_speed: f32, text: &str) -> usize {
    let total = text.chars().count();
    if typing_speed <= 0.0 {
        return total;
    }
    // The first character appears as soon as the line starts.
    let shown = ((elapsed + TIMER_EPSILON) / typing_speed).floor() as usize + 1;
    shown.min(total)
}

#[cfg(test)]
mod tests {
    use crate::dialogue::{ChoiceOption, DialogueChoice, DialogueLine, HintGiver};

    use super::*;

    fn line(text: &str) -> DialogueLine {
        DialogueLine::plain(text)
    }

    fn engine_with(dialogue: NpcDialogue) -> DialogueEngine {
        DialogueEngine::new([("npc".to_string(), dialogue)])
    }

    fn hint_giver() -> NpcDialogue {
        let mut dialogue = NpcDialogue::new(
            "Fool",
            vec![
                line("Hello."),
                line("Need a hint?"),
                DialogueLine {
                    ends_dialogue: true,
                    ..line("Look under the rug.")
                },
                DialogueLine {
                    ends_dialogue: true,
                    ..line("Good luck.")
                },
                DialogueLine {
                    ends_dialogue: true,
                    ..line("Already told you.")
                },
            ],
        );
        dialogue.choices = vec![DialogueChoice {
            line: 1,
            options: vec![
                ChoiceOption {
                    label: "Yes".to_string(),
                    target: 2,
                },
                ChoiceOption {
                    label: "No".to_string(),
                    target: 3,
                },
            ],
        }];
        dialogue.hint = Some(HintGiver {
            choice_line: 1,
            response_targets: vec![2],
            end_line: 4,
        });
        dialogue
    }

    #[test]
    fn typing_reveals_one_character_per_interval() {
        let mut engine = engine_with(NpcDialogue::new("A", vec![line("Hey!")]));
        let hint = HintState::default();
        engine.start("npc", None, &hint).expect("start");
        assert_eq!(engine.phase(), DialoguePhase::Typing);
        assert_eq!(engine.visible_text(), "H");
        engine.tick(0.05, &hint);
        assert_eq!(engine.visible_text(), "He");
        engine.tick(0.1, &hint);
        assert_eq!(engine.visible_text(), "Hey!");
        assert_eq!(engine.phase(), DialoguePhase::Typing);
        engine.tick(0.05, &hint);
        assert_eq!(engine.phase(), DialoguePhase::Revealed);
    }

    #[test]
    fn advance_while_typing_reveals_and_moves_on() {
        let mut engine = engine_with(NpcDialogue::new("A", vec![line("First"), line("Second")]));
        let hint = HintState::default();
        engine.start("npc", None, &hint).expect("start");
        engine.advance(&hint).expect("advance");
        assert_eq!(engine.line_index(), Some(1));
        assert_eq!(engine.phase(), DialoguePhase::Typing);
        engine.advance(&hint).expect("advance");
        assert!(!engine.is_active());
        assert_eq!(engine.advance(&hint), Err(DialogueError::NotActive));
    }

    #[test]
    fn auto_progress_fires_after_delay() {
        let mut dialogue = NpcDialogue::new(
            "A",
            vec![
                DialogueLine {
                    auto_progress: true,
                    ..line("Hi")
                },
                line("Next"),
            ],
        );
        dialogue.typing_speed = 0.05;
        let mut engine = engine_with(dialogue);
        let hint = HintState::default();
        engine.start("npc", None, &hint).expect("start");
        engine.tick(0.1, &hint);
        assert_eq!(engine.phase(), DialoguePhase::AutoAdvancing);
        engine.tick(1.4, &hint);
        assert_eq!(engine.line_index(), Some(0));
        engine.tick(0.1, &hint);
        assert_eq!(engine.line_index(), Some(1));
        assert_eq!(engine.phase(), DialoguePhase::Typing);
    }

    fn four_lines_with_second_auto() -> DialogueEngine {
        let mut dialogue = NpcDialogue::new(
            "A",
            vec![
                line("Hello"),
                DialogueLine {
                    auto_progress: true,
                    ..line("Wait")
                },
                line("Then"),
                line("Bye"),
            ],
        );
        dialogue.typing_speed = 0.05;
        dialogue.auto_progress_delay = 1.5;
        engine_with(dialogue)
    }

    #[test]
    fn revealed_auto_line_moves_on_without_advance() {
        let mut engine = four_lines_with_second_auto();
        let hint = HintState::default();
        engine.start("npc", None, &hint).expect("start");
        engine.advance(&hint).expect("advance past line 0");
        assert_eq!(engine.line_index(), Some(1));

        engine.tick(0.2, &hint);
        assert_eq!(engine.visible_text(), "Wait");
        assert_eq!(engine.phase(), DialoguePhase::AutoAdvancing);
        engine.tick(1.4, &hint);
        assert_eq!(engine.line_index(), Some(1));
        engine.tick(0.1, &hint);
        assert_eq!(engine.line_index(), Some(2));
        assert_eq!(engine.phase(), DialoguePhase::Typing);
    }

    #[test]
    fn advance_during_auto_delay_cancels_the_timer() {
        let mut engine = four_lines_with_second_auto();
        let hint = HintState::default();
        engine.start("npc", None, &hint).expect("start");
        engine.advance(&hint).expect("advance past line 0");
        engine.tick(0.2, &hint);
        engine.tick(1.0, &hint);
        assert_eq!(engine.phase(), DialoguePhase::AutoAdvancing);

        engine.advance(&hint).expect("skip the delay");
        assert_eq!(engine.line_index(), Some(2));
        engine.tick(0.5, &hint);
        engine.tick(5.0, &hint);
        assert_eq!(engine.line_index(), Some(2));
        assert_eq!(engine.phase(), DialoguePhase::Revealed);
    }

    #[test]
    fn ending_cancels_pending_auto_progress() {
        let mut engine = engine_with(NpcDialogue::new(
            "A",
            vec![
                DialogueLine {
                    auto_progress: true,
                    ..line("Hi")
                },
                line("Next"),
            ],
        ));
        let hint = HintState::default();
        engine.start("npc", None, &hint).expect("start");
        engine.tick(0.5, &hint);
        assert!(engine.end());
        engine.tick(5.0, &hint);
        assert_eq!(engine.phase(), DialoguePhase::Idle);
        assert!(!engine.end());
        let events = engine.drain_events();
        assert_eq!(
            events
                .iter()
                .filter(|event| matches!(event, DialogueEvent::Ended { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn second_start_is_rejected_while_active() {
        let mut engine = DialogueEngine::new([
            ("a".to_string(), NpcDialogue::new("A", vec![line("One")])),
            ("b".to_string(), NpcDialogue::new("B", vec![line("Two")])),
        ]);
        let hint = HintState::default();
        engine.start("a", None, &hint).expect("start");
        let err = engine.start("b", None, &hint).expect_err("busy");
        assert_eq!(
            err,
            DialogueError::AlreadyActive {
                active: "a".to_string()
            }
        );
        assert_eq!(engine.active_npc(), Some("a"));
        assert_eq!(engine.line_index(), Some(0));
    }

    #[test]
    fn unknown_npc_is_rejected() {
        let mut engine = DialogueEngine::default();
        let err = engine
            .start("ghost", None, &HintState::default())
            .expect_err("missing");
        assert!(matches!(err, DialogueError::NoDialogue { .. }));
    }

    #[test]
    fn hint_response_sets_flag_and_later_start_uses_end_line() {
        let mut engine = engine_with(hint_giver());
        let mut hint = HintState::default();
        engine.start("npc", None, &hint).expect("start");
        engine.advance(&hint).expect("advance");
        engine.advance(&hint).expect("advance");
        assert_eq!(engine.phase(), DialoguePhase::AwaitingChoice);
        let labels = engine
            .choice_options()
            .iter()
            .map(|option| option.label.as_str())
            .collect::<Vec<_>>();
        assert_eq!(labels, vec!["Yes", "No"]);

        let outcome = engine.choose_option(2, &mut hint).expect("choose");
        assert_eq!(outcome.from_line, 1);
        assert!(hint.is_set());
        engine.advance(&hint).expect("advance");
        assert!(!engine.is_active());

        engine.start("npc", None, &hint).expect("restart");
        assert_eq!(engine.line_index(), Some(4));
    }

    #[test]
    fn hint_choice_line_is_skipped_once_hint_is_given() {
        let mut engine = engine_with(hint_giver());
        let mut hint = HintState::default();
        hint.set();
        engine.start("npc", Some(0), &hint).expect("start");
        engine.advance(&hint).expect("advance");
        engine.advance(&hint).expect("advance");
        assert_eq!(engine.line_index(), Some(4));
        assert_eq!(engine.phase(), DialoguePhase::Typing);
    }

    #[test]
    fn choose_outside_choice_phase_or_off_menu_is_rejected() {
        let mut engine = engine_with(hint_giver());
        let mut hint = HintState::default();
        assert_eq!(
            engine.choose_option(2, &mut hint),
            Err(DialogueError::NotActive)
        );
        engine.start("npc", None, &hint).expect("start");
        assert_eq!(
            engine.choose_option(2, &mut hint),
            Err(DialogueError::NotAwaitingChoice)
        );
        engine.advance(&hint).expect("advance");
        engine.advance(&hint).expect("advance");
        assert_eq!(
            engine.choose_option(0, &mut hint),
            Err(DialogueError::InvalidChoice { target: 0 })
        );
        assert_eq!(engine.phase(), DialoguePhase::AwaitingChoice);
        engine.advance(&hint).expect("ignored");
        assert_eq!(engine.phase(), DialoguePhase::AwaitingChoice);
    }

    #[test]
    fn entry_override_wins_over_hint() {
        let mut engine = engine_with(hint_giver());
        let mut hint = HintState::default();
        hint.set();
        engine.start("npc", Some(3), &hint).expect("start");
        assert_eq!(engine.line_index(), Some(3));
        let events = engine.drain_events();
        assert_eq!(
            events[0],
            DialogueEvent::Started {
                npc: "npc".to_string(),
                speaker: "Fool".to_string(),
                entry_line: 3
            }
        );
    }

    #[test]
    fn multibyte_text_is_revealed_on_char_boundaries() {
        let mut engine = engine_with(NpcDialogue::new("A", vec![line("héllo")]));
        let hint = HintState::default();
        engine.start("npc", None, &hint).expect("start");
        engine.tick(0.05, &hint);
        assert_eq!(engine.visible_text(), "hé");
    }
}
