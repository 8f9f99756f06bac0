use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use arcana_engine::{
    BindingOverrides, BootOutcome, FixedStepClock, GameSession, InputAction, Interactable,
    KeyBindings, LoopConfig,
};
use arcana_engine::state::DoorId;
use tracing::{error, info, warn};

use super::bootstrap::AppWiring;
use super::console::{CommandRegistry, FocusTarget, GameCommand, LocalAction, ParsedCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        mut session,
        start_mode,
        overrides,
        bindings_path,
    } = app;

    match session.boot(start_mode) {
        BootOutcome::NewGame { saved } => info!(saved, "new_game_started"),
        BootOutcome::Continued(report) => info!(?report, "save_continued"),
        BootOutcome::Fallback { reason } => warn!(reason = %reason, "save_unreadable_new_game"),
    }

    let mut runner = ConsoleRunner::new(session, overrides, bindings_path, &config);
    let registry = CommandRegistry::with_builtins();
    println!("type 'help' for commands");

    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                error!(error = %err, "stdin_read_failed");
                break;
            }
        };
        let flow = match registry.parse_line(&line) {
            Ok(None) => Flow::Continue,
            Ok(Some(ParsedCommand::Local(LocalAction::Help))) => {
                registry.help_lines().iter().for_each(|line| println!("{line}"));
                Flow::Continue
            }
            Ok(Some(ParsedCommand::Local(LocalAction::Echo { text }))) => {
                println!("{text}");
                Flow::Continue
            }
            Ok(Some(ParsedCommand::Game(command))) => {
                let (flow, output) = runner.execute(command);
                output.iter().for_each(|line| println!("{line}"));
                flow
            }
            Err(message) => {
                println!("{message}");
                Flow::Continue
            }
        };
        if flow == Flow::Quit {
            break;
        }
    }

    runner.shutdown();
    ExitCode::SUCCESS
}

/// Applies console commands to the session. Time only passes through
/// `wait`, which feeds the fixed-step clock.
struct ConsoleRunner {
    session: GameSession,
    overrides: BindingOverrides,
    bindings: KeyBindings,
    bindings_path: PathBuf,
    clock: FixedStepClock,
}

impl ConsoleRunner {
    fn new(
        session: GameSession,
        overrides: BindingOverrides,
        bindings_path: PathBuf,
        config: &LoopConfig,
    ) -> Self {
        Self {
            session,
            bindings: KeyBindings::new(&overrides),
            overrides,
            bindings_path,
            clock: FixedStepClock::new(config),
        }
    }

    fn execute(&mut self, command: GameCommand) -> (Flow, Vec<String>) {
        let mut out = Vec::new();
        match command {
            GameCommand::Key { key } => match self.bindings.resolve(&key) {
                Some(action) => self.session.handle_action(action),
                None => out.push(format!("no action bound to '{key}'")),
            },
            GameCommand::Focus { target } => match self.resolve_focus(target) {
                Ok(focus) => self.session.set_focus(focus),
                Err(message) => out.push(message),
            },
            GameCommand::Talk { npc } => {
                if let Err(err) = self.session.start_dialogue(&npc) {
                    out.push(format!("error: {err}"));
                }
            }
            GameCommand::Advance => {
                if let Err(err) = self.session.advance_dialogue() {
                    out.push(format!("error: {err}"));
                }
            }
            GameCommand::Choose { target } => {
                if let Err(err) = self.session.choose_dialogue_option(target) {
                    out.push(format!("error: {err}"));
                }
            }
            GameCommand::EndDialogue => {
                self.session.end_dialogue();
            }
            GameCommand::Show { puzzle } => {
                let result = self
                    .puzzle(&puzzle)
                    .and_then(|index| self.session.show_puzzle(index).map_err(|e| e.to_string()));
                if let Err(message) = result {
                    out.push(format!("error: {message}"));
                }
            }
            GameCommand::Hide { puzzle } => {
                let result = self
                    .puzzle(&puzzle)
                    .and_then(|index| self.session.hide_puzzle(index).map_err(|e| e.to_string()));
                if let Err(message) = result {
                    out.push(format!("error: {message}"));
                }
            }
            GameCommand::Digits { puzzle, digits } => {
                let result = self.puzzle(&puzzle).and_then(|index| {
                    for digit in digits.chars() {
                        self.session
                            .press_digit(index, digit)
                            .map_err(|e| e.to_string())?;
                    }
                    Ok(())
                });
                if let Err(message) = result {
                    out.push(format!("error: {message}"));
                }
            }
            GameCommand::ClearDigits { puzzle } => {
                let result = self
                    .puzzle(&puzzle)
                    .and_then(|index| self.session.clear_digits(index).map_err(|e| e.to_string()));
                if let Err(message) = result {
                    out.push(format!("error: {message}"));
                }
            }
            GameCommand::Submit { puzzle } => {
                let result = self.puzzle(&puzzle).and_then(|index| {
                    self.session
                        .submit_digits(index)
                        .map_err(|e| e.to_string())
                });
                match result {
                    Ok(outcome) => out.push(format!("{outcome:?}")),
                    Err(message) => out.push(format!("error: {message}")),
                }
            }
            GameCommand::Cycle { puzzle, slot } => {
                let result = self.puzzle(&puzzle).and_then(|index| {
                    self.session
                        .cycle_symbol(index, slot)
                        .map_err(|e| e.to_string())
                });
                match result {
                    Ok(true) => out.push("the symbols align".to_string()),
                    Ok(false) => {}
                    Err(message) => out.push(format!("error: {message}")),
                }
            }
            GameCommand::Wait { seconds } => self.wait(Duration::from_secs_f32(seconds)),
            GameCommand::Level { scene } => {
                if !self.session.enter_level(&scene) {
                    out.push(format!("already in {scene}"));
                }
            }
            GameCommand::Bind { action, key } => {
                if InputAction::from_id(&action).is_none() {
                    out.push(format!("error: unknown action '{action}'"));
                } else {
                    self.overrides.set(&action, &key);
                    self.bindings = KeyBindings::new(&self.overrides);
                }
            }
            GameCommand::Unbind { action } => {
                if self.overrides.remove(&action) {
                    self.bindings = KeyBindings::new(&self.overrides);
                } else {
                    out.push(format!("'{action}' has no override"));
                }
            }
            GameCommand::Status => out.extend(self.status_lines()),
            GameCommand::Save => match self.session.save() {
                Ok(_) => out.push(format!("saved to {}", self.session.saves().save_path().display())),
                Err(err) => out.push(format!("error: {err}")),
            },
            GameCommand::Load => match self.session.load() {
                Ok(report) => out.push(format!("loaded: {report:?}")),
                Err(err) => out.push(format!("error: {err}")),
            },
            GameCommand::Quit => return (Flow::Quit, out),
        }
        (Flow::Continue, out)
    }

    /// Runs every fixed tick that fits in `duration`, one frame at a time.
    fn wait(&mut self, duration: Duration) {
        let frame = self.clock.fixed_dt();
        let mut remaining = duration;
        while !remaining.is_zero() {
            let step = remaining.min(frame);
            remaining -= step;
            let plan = self.clock.advance(step);
            for _ in 0..plan.ticks_to_run {
                self.session.update(self.clock.fixed_dt_seconds());
            }
        }
    }

    fn puzzle(&self, name: &str) -> Result<usize, String> {
        self.session
            .content()
            .puzzle_index(name)
            .or_else(|| name.parse().ok())
            .filter(|index| *index < self.session.content().puzzles().len())
            .ok_or_else(|| format!("unknown puzzle '{name}'"))
    }

    fn resolve_focus(&self, target: FocusTarget) -> Result<Option<Interactable>, String> {
        let content = self.session.content();
        Ok(Some(match target {
            FocusTarget::Nothing => return Ok(None),
            FocusTarget::Npc(name) => {
                if content.npc(&name).is_none() {
                    return Err(format!("unknown npc '{name}'"));
                }
                Interactable::Npc(name)
            }
            FocusTarget::Puzzle(name) => Interactable::Puzzle(self.puzzle(&name)?),
            FocusTarget::Pickup(name) => Interactable::Pickup(self.puzzle(&name)?),
            FocusTarget::Door(name) => Interactable::Door(DoorId(
                content
                    .door_index(&name)
                    .ok_or_else(|| format!("unknown door '{name}'"))?,
            )),
            FocusTarget::Exit(name) => Interactable::Exit(
                content
                    .exit_index(&name)
                    .ok_or_else(|| format!("unknown exit '{name}'"))?,
            ),
        }))
    }

    fn status_lines(&self) -> Vec<String> {
        let state = self.session.state();
        let world = self.session.world();
        let position = world.player_position();
        let slots = state
            .inventory
            .slots()
            .iter()
            .map(|slot| match slot.and_then(|id| state.items.lookup(id)) {
                Some(item) => item.label.clone(),
                None => "-".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" | ");
        let flags = |states: Vec<bool>| {
            states
                .iter()
                .map(|flag| if *flag { "T" } else { "F" })
                .collect::<String>()
        };
        vec![
            format!(
                "level {} | scene {} | boundary {}",
                state.level(),
                world.active_scene(),
                world.map_boundary().unwrap_or_default()
            ),
            format!(
                "position ({:.2}, {:.2}, {:.2})",
                position.x, position.y, position.z
            ),
            format!("inventory [{slots}]"),
            format!(
                "puzzles {} | doors locked {} | hint {}",
                flags(state.puzzles.export_states()),
                flags(state.doors.export_states()),
                state.hint.is_set()
            ),
            format!(
                "dialogue {:?} line {:?} | paused {} | focus {:?}",
                state.dialogue.phase(),
                state.dialogue.line_index(),
                state.pause.is_paused(),
                self.session.focus()
            ),
        ]
    }

    fn shutdown(&mut self) {
        self.session.shutdown();
        if let Err(err) = self.overrides.save(&self.bindings_path) {
            warn!(error = %err, "bindings_save_failed");
        }
    }
}
