use rand::Rng;
use tracing::{debug, info, warn};

use super::analytics::{AnalyticsEvent, AnalyticsSink};
use super::input::InputAction;
use super::ui::UiSink;
use super::world::{Vec3, WorldLink};
use crate::content::ContentDatabase;
use crate::dialogue::{ChoiceOutcome, DialogueError, DialogueEvent};
use crate::mechanics::{ChestResolution, DigitSubmit, PuzzleMechanics};
use crate::save::{BootOutcome, RestoreReport, SaveCoordinator, SaveError, SaveSnapshot, StartMode};
use crate::state::{
    DoorId, GameState, ItemId, PauseSource, PuzzleCompletion, ShowOutcome, StateError,
};

/// The thing the player currently stands next to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interactable {
    Npc(String),
    Puzzle(usize),
    Door(DoorId),
    Pickup(usize),
    Exit(usize),
}

/// Owns the game state and routes player intent and ticks through it,
/// reporting to the world, UI and analytics collaborators.
pub struct GameSession {
    content: ContentDatabase,
    state: GameState,
    mechanics: PuzzleMechanics,
    saves: SaveCoordinator,
    world: Box<dyn WorldLink>,
    ui: Box<dyn UiSink>,
    analytics: Box<dyn AnalyticsSink>,
    focus: Option<Interactable>,
    menu_open: bool,
    inventory_open: bool,
    shown_text: String,
}

impl GameSession {
    pub fn new(
        content: ContentDatabase,
        saves: SaveCoordinator,
        world: Box<dyn WorldLink>,
        ui: Box<dyn UiSink>,
        mut analytics: Box<dyn AnalyticsSink>,
        rng: &mut impl Rng,
    ) -> Self {
        let state = GameState::from_content(&content);
        let mechanics = PuzzleMechanics::from_content(&content, &state.items, &state.doors, rng);
        analytics.record(AnalyticsEvent::SessionStart);
        analytics.record(AnalyticsEvent::LevelStart {
            level_name: state.level().to_string(),
        });
        info!(
            level = state.level(),
            items = content.items().len(),
            puzzles = content.puzzles().len(),
            doors = content.doors().len(),
            npcs = content.npcs().len(),
            "session_started"
        );
        Self {
            content,
            state,
            mechanics,
            saves,
            world,
            ui,
            analytics,
            focus: None,
            menu_open: false,
            inventory_open: false,
            shown_text: String::new(),
        }
    }

    pub fn content(&self) -> &ContentDatabase {
        &self.content
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn mechanics(&self) -> &PuzzleMechanics {
        &self.mechanics
    }

    pub fn world(&self) -> &dyn WorldLink {
        self.world.as_ref()
    }

    pub fn saves(&self) -> &SaveCoordinator {
        &self.saves
    }

    pub fn menu_open(&self) -> bool {
        self.menu_open
    }

    pub fn inventory_open(&self) -> bool {
        self.inventory_open
    }

    pub fn focus(&self) -> Option<&Interactable> {
        self.focus.as_ref()
    }

    pub fn set_focus(&mut self, focus: Option<Interactable>) {
        self.focus = focus;
    }

    pub fn handle_action(&mut self, action: InputAction) {
        match action {
            InputAction::Interact => self.interact(),
            InputAction::Menu => self.toggle_menu(),
            InputAction::Inventory => self.toggle_inventory(),
            InputAction::Hotbar(slot) => {
                self.use_hotbar_slot(slot as usize);
            }
            InputAction::MoveUp
            | InputAction::MoveDown
            | InputAction::MoveLeft
            | InputAction::MoveRight
            | InputAction::Jump => {
                debug!(action = %action.id(), "movement_ignored_headless");
            }
        }
    }

    /// Advances an active conversation, otherwise acts on the focused
    /// interactable. Blocked while the menu or inventory is open.
    pub fn interact(&mut self) {
        if self.state.dialogue.is_active() {
            if let Err(error) = self.advance_dialogue() {
                warn!(error = %error, "dialogue_advance_failed");
            }
            return;
        }
        if self.menu_open || self.inventory_open {
            debug!(
                menu_open = self.menu_open,
                inventory_open = self.inventory_open,
                "interact_blocked"
            );
            return;
        }
        let Some(focus) = self.focus.clone() else {
            debug!("interact_without_focus");
            return;
        };
        let result = match focus {
            Interactable::Npc(npc) => self.start_dialogue(&npc).map_err(|error| error.to_string()),
            Interactable::Puzzle(index) => self
                .show_puzzle(index)
                .map(|_| ())
                .map_err(|error| error.to_string()),
            Interactable::Door(door) => self
                .try_enter_door(door)
                .map(|_| ())
                .map_err(|error| error.to_string()),
            Interactable::Pickup(puzzle) => self
                .collect_pickup(puzzle)
                .map(|_| ())
                .map_err(|error| error.to_string()),
            Interactable::Exit(exit) => self
                .try_exit_level(exit)
                .map(|_| ())
                .map_err(|error| error.to_string()),
        };
        if let Err(error) = result {
            warn!(error = %error, "interact_failed");
        }
    }

    pub fn toggle_menu(&mut self) {
        self.menu_open = !self.menu_open;
        if self.menu_open {
            self.state.pause.acquire(PauseSource::Menu);
        } else {
            self.state.pause.release(PauseSource::Menu);
        }
        self.ui.set_menu_visible(self.menu_open);
    }

    pub fn toggle_inventory(&mut self) {
        self.inventory_open = !self.inventory_open;
        if self.inventory_open {
            self.state.pause.acquire(PauseSource::Inventory);
        } else {
            self.state.pause.release(PauseSource::Inventory);
        }
        self.ui.set_inventory_visible(self.inventory_open);
    }

    /// Selects a hotbar slot and uses whatever it holds.
    pub fn use_hotbar_slot(&mut self, slot: usize) -> Option<ItemId> {
        match self.state.inventory.select(slot) {
            Ok(Some(item)) => {
                let item_name = self.item_label(item);
                self.analytics.record(AnalyticsEvent::ItemUsed {
                    item_name,
                    context: "hotbar",
                });
                Some(item)
            }
            Ok(None) | Err(_) => None,
        }
    }

    /// Per-frame update with unscaled seconds. Returns the gameplay delta,
    /// which is zero while anything holds the pause gate.
    pub fn update(&mut self, dt_seconds: f32) -> f32 {
        self.state.dialogue.tick(dt_seconds, &self.state.hint);
        self.state.puzzles.tick(dt_seconds);
        self.flush_dialogue();
        dt_seconds * self.state.pause.time_scale()
    }

    pub fn start_dialogue(&mut self, npc: &str) -> Result<(), DialogueError> {
        let entry_override = self
            .mechanics
            .chest_for_npc(npc)
            .and_then(|chest| chest.entry_override(&self.state.inventory));
        let result = self
            .state
            .dialogue
            .start(npc, entry_override, &self.state.hint);
        self.flush_dialogue();
        result
    }

    pub fn advance_dialogue(&mut self) -> Result<(), DialogueError> {
        let result = self.state.dialogue.advance(&self.state.hint);
        self.flush_dialogue();
        result
    }

    pub fn choose_dialogue_option(&mut self, target: usize) -> Result<ChoiceOutcome, DialogueError> {
        let outcome = self
            .state
            .dialogue
            .choose_option(target, &mut self.state.hint)?;
        let chest = self
            .mechanics
            .chest_for_npc(&outcome.npc)
            .and_then(|chest| {
                chest
                    .resolve(&outcome, &self.state.inventory)
                    .map(|resolution| (chest.puzzle, resolution))
            });
        if let Some((puzzle, resolution)) = chest {
            self.apply_chest(puzzle, resolution);
        }
        self.flush_dialogue();
        Ok(outcome)
    }

    pub fn end_dialogue(&mut self) -> bool {
        let ended = self.state.dialogue.end();
        self.flush_dialogue();
        ended
    }

    pub fn show_puzzle(&mut self, index: usize) -> Result<ShowOutcome, StateError> {
        let already_open = self.state.puzzles.open_puzzle() == Some(index);
        let outcome = self.state.puzzles.show(index)?;
        if let ShowOutcome::Opened { closed } = outcome {
            if let Some(closed) = closed {
                self.ui.hide_puzzle(closed);
            }
            if !already_open {
                if closed.is_none() {
                    self.state.pause.acquire(PauseSource::Puzzle);
                }
                self.ui.show_puzzle(index);
                self.analytics.record(AnalyticsEvent::PuzzleAttempt {
                    puzzle_index: index,
                    puzzle_type: self.mechanics.kind(index),
                });
            }
        }
        Ok(outcome)
    }

    pub fn hide_puzzle(&mut self, index: usize) -> Result<bool, StateError> {
        let closed = self.state.puzzles.hide(index)?;
        if closed {
            self.state.pause.release(PauseSource::Puzzle);
            self.ui.hide_puzzle(index);
        }
        Ok(closed)
    }

    pub fn complete_puzzle(&mut self, index: usize) -> Result<PuzzleCompletion, StateError> {
        let completion = self.state.puzzles.complete(index)?;
        if completion.elapsed_seconds.is_some() {
            self.state.pause.release(PauseSource::Puzzle);
            self.ui.hide_puzzle(index);
        }
        if completion.newly_completed {
            info!(puzzle = index, "puzzle_completed");
            self.analytics.record(AnalyticsEvent::PuzzleComplete {
                puzzle_index: index,
                puzzle_type: self.mechanics.kind(index),
                time_taken: completion.elapsed_seconds.unwrap_or(0.0),
            });
        }
        Ok(completion)
    }

    pub fn mark_puzzle_incomplete(&mut self, index: usize) -> Result<bool, StateError> {
        self.state.puzzles.mark_incomplete(index)
    }

    pub fn press_digit(&mut self, puzzle: usize, digit: char) -> Result<bool, StateError> {
        let pad = self
            .mechanics
            .digit_code_mut(puzzle)
            .ok_or_else(|| missing("digit_code", puzzle))?;
        Ok(pad.press(digit))
    }

    pub fn clear_digits(&mut self, puzzle: usize) -> Result<(), StateError> {
        self.mechanics
            .digit_code_mut(puzzle)
            .ok_or_else(|| missing("digit_code", puzzle))?
            .clear();
        Ok(())
    }

    pub fn submit_digits(&mut self, puzzle: usize) -> Result<DigitSubmit, StateError> {
        let result = self
            .mechanics
            .digit_code_mut(puzzle)
            .ok_or_else(|| missing("digit_code", puzzle))?
            .submit();
        if let DigitSubmit::Solved { reward } = result {
            let completion = self.complete_puzzle(puzzle)?;
            if let (true, Some(reward)) = (completion.newly_completed, reward) {
                self.give_item(reward, "digit_code");
            }
        }
        Ok(result)
    }

    /// Cycles one symbol slot. Solving the lock completes its puzzle and
    /// unlocks the linked door.
    pub fn cycle_symbol(&mut self, puzzle: usize, slot: usize) -> Result<bool, StateError> {
        let lock = self
            .mechanics
            .symbol_lock_mut(puzzle)
            .ok_or_else(|| missing("symbol_lock", puzzle))?;
        let solved = lock.cycle(slot)?;
        let door = lock.door();
        if solved && !self.state.puzzles.is_completed(puzzle) {
            self.complete_puzzle(puzzle)?;
            if let Some(door) = door {
                self.state.doors.unlock(door)?;
                info!(puzzle, door = door.0, "door_unlocked_by_puzzle");
            }
        }
        Ok(solved)
    }

    /// Hands out the pickup's item once. Returns whether anything was given.
    pub fn collect_pickup(&mut self, puzzle: usize) -> Result<bool, StateError> {
        let trigger = self
            .mechanics
            .pickup(puzzle)
            .ok_or_else(|| missing("pickup", puzzle))?;
        if self.state.puzzles.is_completed(trigger.puzzle) {
            debug!(puzzle, "pickup_already_collected");
            return Ok(false);
        }
        if !self.give_item(trigger.item, "pickup") {
            return Ok(false);
        }
        self.complete_puzzle(trigger.puzzle)?;
        Ok(true)
    }

    /// Walks through an unlocked door: moves the player to its exit point and
    /// confines the camera to the exit room. Locked doors refuse.
    pub fn try_enter_door(&mut self, door: DoorId) -> Result<bool, StateError> {
        if self.state.doors.is_locked(door)? {
            debug!(door = door.0, "door_locked");
            return Ok(false);
        }
        let Some(def) = self.content.doors().get(door.0) else {
            return Err(StateError::OutOfRange {
                store: "doors",
                index: door.0,
                count: self.content.doors().len(),
            });
        };
        if let Some(exit) = def.exit_position {
            self.world.set_player_position(Vec3::from(exit));
        }
        if let Some(boundary) = def.exit_boundary.as_deref() {
            self.world.set_map_boundary(boundary);
        }
        debug!(door = %def.def_name, "door_entered");
        Ok(true)
    }

    /// Leaves the level through an exit. Exits with a required item refuse
    /// until the player holds it. Leaving discards the inventory and the
    /// hint before the next scene starts.
    pub fn try_exit_level(&mut self, exit: usize) -> Result<bool, StateError> {
        let Some(def) = self.content.exits().get(exit) else {
            return Err(StateError::OutOfRange {
                store: "exits",
                index: exit,
                count: self.content.exits().len(),
            });
        };
        if let Some(required) = def.required_item.as_deref() {
            let item = self
                .state
                .items
                .id_by_name(required)
                .ok_or_else(|| StateError::MissingReference {
                    what: "item",
                    owner: format!("exit {}", def.def_name),
                })?;
            if !self.state.inventory.has_item(item) {
                debug!(exit = %def.def_name, required, "exit_locked");
                return Ok(false);
            }
        }
        let next_scene = def.next_scene.clone();
        let discarded = self.state.inventory.clear();
        self.state.hint.clear();
        self.analytics.record(AnalyticsEvent::LevelComplete {
            level_name: self.state.level().to_string(),
            level_index: self.content.level().scene_index,
        });
        info!(
            from = self.state.level(),
            to = %next_scene,
            discarded,
            "level_exited"
        );
        self.enter_level(&next_scene);
        Ok(true)
    }

    /// Adds `item` to the first free slot. Returns `false` when full.
    pub fn give_item(&mut self, item: ItemId, source: &str) -> bool {
        if !self.state.inventory.add_to_first_empty_slot(item) {
            warn!(item = item.0, source, "inventory_full");
            return false;
        }
        let item_name = self.item_label(item);
        self.ui.show_item_pickup(&item_name);
        self.analytics.record(AnalyticsEvent::ItemCollected {
            item_name,
            source: source.to_string(),
        });
        true
    }

    /// Switches level. A different level clears the hint and asks the world
    /// to load its scene.
    pub fn enter_level(&mut self, scene_name: &str) -> bool {
        if !self.state.enter_level(scene_name) {
            return false;
        }
        self.world.request_scene(scene_name);
        self.analytics.record(AnalyticsEvent::LevelStart {
            level_name: scene_name.to_string(),
        });
        true
    }

    pub fn save(&self) -> Result<SaveSnapshot, SaveError> {
        self.saves.save(&self.state, self.world.as_ref())
    }

    pub fn load(&mut self) -> Result<RestoreReport, SaveError> {
        let snapshot = self.saves.load()?;
        self.end_dialogue();
        let open = self.state.puzzles.open_puzzle();
        let report = self
            .saves
            .restore(&snapshot, &mut self.state, self.world.as_mut());
        self.sync_puzzle_pause(open);
        Ok(report)
    }

    pub fn boot(&mut self, mode: StartMode) -> BootOutcome {
        self.end_dialogue();
        let open = self.state.puzzles.open_puzzle();
        let level = self.content.level().clone();
        let outcome = self
            .saves
            .boot(mode, &mut self.state, self.world.as_mut(), &level);
        self.sync_puzzle_pause(open);
        outcome
    }

    pub fn shutdown(&mut self) {
        self.end_dialogue();
        self.analytics.record(AnalyticsEvent::SessionEnd);
        info!("session_ended");
    }

    fn apply_chest(&mut self, puzzle: usize, resolution: ChestResolution) {
        self.analytics.record(AnalyticsEvent::ChestChoice {
            truth_chest: resolution.truth_chest,
            choice_correct: resolution.correct,
        });
        self.analytics.record(AnalyticsEvent::PuzzleAttempt {
            puzzle_index: puzzle,
            puzzle_type: "chest",
        });
        if let Some(item) = resolution.take {
            self.state.inventory.remove_first_matching(item);
        }
        if let Some(item) = resolution.give {
            self.give_item(item, "chest");
        }
        if let Some(index) = resolution.complete {
            if let Err(error) = self.complete_puzzle(index) {
                warn!(error = %error, puzzle = index, "chest_completion_failed");
            }
        }
        if let Some(index) = resolution.reset {
            if let Err(error) = self.mark_puzzle_incomplete(index) {
                warn!(error = %error, puzzle = index, "chest_reset_failed");
            }
        }
    }

    /// Forwards queued dialogue events to the UI and analytics, then pushes
    /// the visible text if it changed.
    fn flush_dialogue(&mut self) {
        for event in self.state.dialogue.drain_events() {
            match event {
                DialogueEvent::Started {
                    npc,
                    speaker,
                    entry_line,
                } => {
                    self.ui.show_dialogue(&speaker);
                    self.analytics.record(AnalyticsEvent::DialogueEvent {
                        npc_name: npc,
                        dialogue_index: entry_line,
                        choice: None,
                    });
                }
                DialogueEvent::LineStarted { .. } => self.ui.clear_choices(),
                DialogueEvent::ChoicesShown { labels, .. } => self.ui.show_choices(&labels),
                DialogueEvent::ChoiceMade {
                    npc,
                    from_line,
                    target,
                } => {
                    let choice = self
                        .state
                        .dialogue
                        .dialogue(&npc)
                        .and_then(|dialogue| dialogue.choice_at(from_line))
                        .and_then(|choice| choice.options.iter().find(|o| o.target == target))
                        .map(|option| option.label.clone());
                    self.analytics.record(AnalyticsEvent::DialogueEvent {
                        npc_name: npc,
                        dialogue_index: from_line,
                        choice,
                    });
                }
                DialogueEvent::Ended { .. } => {
                    self.ui.clear_choices();
                    self.ui.hide_dialogue();
                    self.shown_text.clear();
                }
            }
        }

        if self.state.dialogue.is_active() {
            let text = self.state.dialogue.visible_text();
            if text != self.shown_text {
                self.shown_text = text.to_string();
                self.ui.set_dialogue_text(&self.shown_text);
            }
        }
    }

    /// Closes the UI for a puzzle that was open before a restore and drops
    /// the puzzle pause token once no puzzle is open any more.
    fn sync_puzzle_pause(&mut self, was_open: Option<usize>) {
        if self.state.puzzles.open_puzzle().is_some() {
            return;
        }
        if let Some(index) = was_open {
            self.ui.hide_puzzle(index);
        }
        if self.state.pause.holds(PauseSource::Puzzle) {
            self.state.pause.release(PauseSource::Puzzle);
        }
    }

    fn item_label(&self, item: ItemId) -> String {
        self.state
            .items
            .lookup(item)
            .map(|definition| definition.label.clone())
            .unwrap_or_else(|| item.to_string())
    }
}

fn missing(what: &'static str, puzzle: usize) -> StateError {
    let error = StateError::MissingReference {
        what,
        owner: format!("puzzle {puzzle}"),
    };
    warn!(error = %error, "puzzle_mechanic_missing");
    error
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::app::{AnalyticsLog, HeadlessWorld, NullUi};
    use crate::content::{
        ChestDef, DigitCodeDef, DoorDef, ExitDef, ItemDef, LevelDef, MechanicDef, NpcDef,
        PickupDef, PuzzleDef, SymbolLockDef,
    };
    use crate::dialogue::{
        ChoiceOption, DialogueChoice, DialogueLine, DialoguePhase, NpcDialogue,
    };
    use crate::state::ItemBehavior;

    const CODE: usize = 0;
    const LOCK: usize = 1;
    const PICKUP: usize = 2;
    const CHEST: usize = 3;

    fn item(name: &str, label: &str) -> ItemDef {
        ItemDef {
            def_name: name.to_string(),
            label: label.to_string(),
            behavior: ItemBehavior::Usable,
        }
    }

    fn puzzle(name: &str, mechanic: MechanicDef) -> PuzzleDef {
        PuzzleDef {
            def_name: name.to_string(),
            label: name.to_string(),
            mechanic: Some(mechanic),
        }
    }

    fn content() -> ContentDatabase {
        let mut chest_lines = NpcDialogue::new(
            "Chest",
            vec![
                DialogueLine::plain("I hold the truth."),
                DialogueLine::plain("Am I honest?"),
                DialogueLine {
                    ends_dialogue: true,
                    ..DialogueLine::plain("You chose well.")
                },
                DialogueLine {
                    ends_dialogue: true,
                    ..DialogueLine::plain("Wrong.")
                },
                DialogueLine {
                    ends_dialogue: true,
                    ..DialogueLine::plain("Bring me a key.")
                },
                DialogueLine {
                    ends_dialogue: true,
                    ..DialogueLine::plain("You already have my coin.")
                },
            ],
        );
        chest_lines.choices = vec![DialogueChoice {
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

        ContentDatabase::new(
            vec![
                item("item.key", "Key"),
                item("item.coin", "Coin"),
                item("item.card", "Card"),
            ],
            vec![
                puzzle(
                    "puzzle.code",
                    MechanicDef::DigitCode(DigitCodeDef {
                        code: "42".to_string(),
                        reward_item: Some("item.key".to_string()),
                    }),
                ),
                puzzle(
                    "puzzle.lock",
                    MechanicDef::SymbolLock(SymbolLockDef {
                        symbol_count: 4,
                        combination: vec![1, 3],
                        unlocks_door: Some("door.vault".to_string()),
                    }),
                ),
                puzzle(
                    "puzzle.card",
                    MechanicDef::Pickup(PickupDef {
                        item: "item.card".to_string(),
                    }),
                ),
                puzzle(
                    "puzzle.chest",
                    MechanicDef::Chest(ChestDef {
                        npc: "npc.chest".to_string(),
                        choice_line: 1,
                        true_answer_line: 2,
                        truth_chest: true,
                        required_item: Some("item.key".to_string()),
                        reward_item: Some("item.coin".to_string()),
                        no_item_line: 4,
                        already_rewarded_line: 5,
                        failure_puzzle: None,
                    }),
                ),
            ],
            vec![DoorDef {
                def_name: "door.vault".to_string(),
                label: "Vault".to_string(),
                starts_locked: true,
                exit_position: Some([10.0, 2.0, 0.0]),
                exit_boundary: Some("Vault".to_string()),
            }],
            vec![NpcDef {
                def_name: "npc.chest".to_string(),
                dialogue: chest_lines,
            }],
            LevelDef {
                slot_count: 3,
                boundaries: vec!["Room1".to_string(), "Vault".to_string()],
                ..LevelDef::default()
            },
        )
        .with_exits(vec![
            ExitDef {
                def_name: "exit.stairs".to_string(),
                label: "Stairs".to_string(),
                required_item: Some("item.coin".to_string()),
                next_scene: "TheMagician".to_string(),
            },
            ExitDef {
                def_name: "exit.gate".to_string(),
                label: "Gate".to_string(),
                required_item: None,
                next_scene: "TheEmpress".to_string(),
            },
        ])
    }

    #[derive(Default)]
    struct UiRecord {
        calls: Vec<String>,
    }

    struct RecordingUi(Rc<RefCell<UiRecord>>);

    impl UiSink for RecordingUi {
        fn show_dialogue(&mut self, speaker: &str) {
            self.0.borrow_mut().calls.push(format!("show:{speaker}"));
        }
        fn show_choices(&mut self, labels: &[String]) {
            self.0
                .borrow_mut()
                .calls
                .push(format!("choices:{}", labels.join("|")));
        }
        fn hide_dialogue(&mut self) {
            self.0.borrow_mut().calls.push("hide".to_string());
        }
        fn show_item_pickup(&mut self, label: &str) {
            self.0.borrow_mut().calls.push(format!("pickup:{label}"));
        }
        fn hide_puzzle(&mut self, puzzle: usize) {
            self.0.borrow_mut().calls.push(format!("hide:{puzzle}"));
        }
    }

    fn session_with(ui: Box<dyn UiSink>) -> (GameSession, AnalyticsLog, tempfile::TempDir) {
        let temp = tempfile::TempDir::new().expect("temp");
        let content = content();
        let world = HeadlessWorld::from_level(content.level());
        let log = AnalyticsLog::default();
        let session = GameSession::new(
            content,
            SaveCoordinator::new(temp.path()),
            Box::new(world),
            ui,
            Box::new(log.clone()),
            &mut StdRng::seed_from_u64(7),
        );
        (session, log, temp)
    }

    fn session() -> (GameSession, AnalyticsLog, tempfile::TempDir) {
        session_with(Box::new(NullUi))
    }

    fn solve_lock(session: &mut GameSession) {
        for slot in 0..2 {
            for _ in 0..4 {
                let lock = session.mechanics().symbol_lock(LOCK).expect("lock");
                if lock.current()[slot] == [1, 3][slot] {
                    break;
                }
                session.cycle_symbol(LOCK, slot).expect("cycle");
            }
        }
    }

    #[test]
    fn menu_and_inventory_pause_independently() {
        let (mut session, _, _temp) = session();
        session.toggle_menu();
        session.toggle_inventory();
        session.toggle_menu();
        assert!(session.state().pause.is_paused());
        assert_eq!(session.update(0.5), 0.0);
        session.toggle_inventory();
        assert!(!session.state().pause.is_paused());
        assert_eq!(session.update(0.5), 0.5);
    }

    #[test]
    fn interact_is_blocked_while_menu_is_open() {
        let (mut session, _, _temp) = session();
        session.set_focus(Some(Interactable::Npc("npc.chest".to_string())));
        session.toggle_menu();
        session.interact();
        assert!(!session.state().dialogue.is_active());
        session.toggle_menu();
        session.interact();
        assert_eq!(session.state().dialogue.active_npc(), Some("npc.chest"));
    }

    #[test]
    fn digit_code_awards_reward_once() {
        let (mut session, log, _temp) = session();
        session.show_puzzle(CODE).expect("show");
        assert!(session.state().pause.holds(PauseSource::Puzzle));
        session.press_digit(CODE, '4').expect("press");
        session.press_digit(CODE, '1').expect("press");
        assert_eq!(
            session.submit_digits(CODE).expect("submit"),
            DigitSubmit::Rejected
        );
        session.press_digit(CODE, '4').expect("press");
        session.press_digit(CODE, '2').expect("press");
        assert!(matches!(
            session.submit_digits(CODE).expect("submit"),
            DigitSubmit::Solved { .. }
        ));
        assert!(session.state().puzzles.is_completed(CODE));
        assert!(!session.state().pause.is_paused());

        session.press_digit(CODE, '4').expect("press");
        session.press_digit(CODE, '2').expect("press");
        session.submit_digits(CODE).expect("submit again");
        let key = session.state().items.id_by_name("item.key").expect("key");
        assert_eq!(
            session
                .state()
                .inventory
                .slots()
                .iter()
                .filter(|slot| **slot == Some(key))
                .count(),
            1
        );
        assert_eq!(
            log.names(),
            vec![
                "session_start",
                "level_start",
                "puzzle_attempt",
                "puzzle_complete",
                "item_collected"
            ]
        );
    }

    #[test]
    fn missing_mechanic_is_reported() {
        let (mut session, _, _temp) = session();
        assert!(matches!(
            session.press_digit(LOCK, '1'),
            Err(StateError::MissingReference { .. })
        ));
    }

    #[test]
    fn solving_symbol_lock_opens_its_door() {
        let (mut session, _, _temp) = session();
        let vault = DoorId(0);
        assert_eq!(session.try_enter_door(vault), Ok(false));
        solve_lock(&mut session);
        assert!(session.state().puzzles.is_completed(LOCK));
        assert_eq!(session.state().doors.is_locked(vault), Ok(false));

        assert_eq!(session.try_enter_door(vault), Ok(true));
        assert_eq!(session.world().player_position(), Vec3::new(10.0, 2.0, 0.0));
        assert_eq!(session.world().map_boundary().as_deref(), Some("Vault"));
    }

    #[test]
    fn pickup_is_collected_once() {
        let (mut session, _, _temp) = session();
        session.set_focus(Some(Interactable::Pickup(PICKUP)));
        session.interact();
        session.interact();
        let card = session.state().items.id_by_name("item.card").expect("card");
        assert!(session.state().inventory.has_item(card));
        assert_eq!(session.state().inventory.export_snapshot().len(), 1);
        assert!(session.state().puzzles.is_completed(PICKUP));
    }

    #[test]
    fn chest_without_key_opens_on_no_item_line() {
        let (mut session, _, _temp) = session();
        session.start_dialogue("npc.chest").expect("start");
        assert_eq!(session.state().dialogue.line_index(), Some(4));
    }

    #[test]
    fn truth_chest_trades_key_for_coin() {
        let record = Rc::new(RefCell::new(UiRecord::default()));
        let (mut session, log, _temp) = session_with(Box::new(RecordingUi(record.clone())));
        let key = session.state().items.id_by_name("item.key").expect("key");
        let coin = session.state().items.id_by_name("item.coin").expect("coin");
        session.give_item(key, "test");

        session.start_dialogue("npc.chest").expect("start");
        assert_eq!(session.state().dialogue.line_index(), Some(0));
        session.advance_dialogue().expect("line 0");
        session.advance_dialogue().expect("show choices");
        assert_eq!(session.state().dialogue.phase(), DialoguePhase::AwaitingChoice);
        session.choose_dialogue_option(2).expect("choose yes");

        assert!(!session.state().inventory.has_item(key));
        assert!(session.state().inventory.has_item(coin));
        assert!(session.state().puzzles.is_completed(CHEST));
        assert!(log.names().contains(&"chest_choice"));

        session.advance_dialogue().expect("final line");
        assert!(!session.state().dialogue.is_active());
        let calls = record.borrow().calls.clone();
        assert!(calls.contains(&"choices:Yes|No".to_string()));
        assert!(calls.contains(&"pickup:Coin".to_string()));
        assert_eq!(calls.last().map(String::as_str), Some("hide"));

        session.start_dialogue("npc.chest").expect("restart");
        assert_eq!(session.state().dialogue.line_index(), Some(5));
    }

    #[test]
    fn load_restores_saved_progress() {
        let (mut session, _, _temp) = session();
        solve_lock(&mut session);
        session.save().expect("save");
        session.mark_puzzle_incomplete(LOCK).expect("reopen");
        session.state.doors.lock(DoorId(0)).expect("relock");

        session.load().expect("load");
        assert!(session.state().puzzles.is_completed(LOCK));
        assert_eq!(session.state().doors.is_locked(DoorId(0)), Ok(false));
    }

    #[test]
    fn level_change_clears_hint_and_requests_scene() {
        let (mut session, log, _temp) = session();
        session.state.hint.set();
        assert!(!session.enter_level("TheFool"));
        assert!(session.enter_level("TheMagician"));
        assert!(!session.state().hint.is_set());
        assert_eq!(session.world().active_scene(), "TheMagician");
        assert_eq!(log.names().last(), Some(&"level_start"));
    }

    #[test]
    fn load_closes_an_open_puzzle_and_tells_the_ui() {
        let record = Rc::new(RefCell::new(UiRecord::default()));
        let (mut session, _, _temp) = session_with(Box::new(RecordingUi(record.clone())));
        session.save().expect("save");
        session.show_puzzle(CODE).expect("show");
        assert!(session.state().pause.is_paused());

        session.load().expect("load");
        assert!(record.borrow().calls.contains(&"hide:0".to_string()));
        assert_eq!(session.state().puzzles.open_puzzle(), None);
        assert!(!session.state().pause.is_paused());
    }

    #[test]
    fn boot_closes_an_open_puzzle_and_tells_the_ui() {
        let record = Rc::new(RefCell::new(UiRecord::default()));
        let (mut session, _, _temp) = session_with(Box::new(RecordingUi(record.clone())));
        session.show_puzzle(LOCK).expect("show");

        session.boot(StartMode::NewGame);
        assert!(record.borrow().calls.contains(&"hide:1".to_string()));
        assert_eq!(session.state().puzzles.open_puzzle(), None);
        assert!(!session.state().pause.is_paused());
    }

    #[test]
    fn exit_waits_for_its_item_then_leaves_the_level() {
        let (mut session, log, _temp) = session();
        let key = session.state().items.id_by_name("item.key").expect("key");
        let coin = session.state().items.id_by_name("item.coin").expect("coin");
        session.set_focus(Some(Interactable::Exit(0)));
        session.give_item(key, "test");
        session.interact();
        assert_eq!(session.state().level(), "TheFool");
        assert!(!log.names().contains(&"level_complete"));

        session.give_item(coin, "test");
        session.state.hint.set();
        session.interact();
        assert_eq!(session.state().level(), "TheMagician");
        assert_eq!(session.world().active_scene(), "TheMagician");
        assert!(session.state().inventory.export_snapshot().is_empty());
        assert!(!session.state().hint.is_set());
        assert!(log.events().contains(&AnalyticsEvent::LevelComplete {
            level_name: "TheFool".to_string(),
            level_index: 0,
        }));
        let names = log.names();
        assert_eq!(&names[names.len() - 2..], ["level_complete", "level_start"]);
    }

    #[test]
    fn exit_without_requirement_is_always_open() {
        let (mut session, _, _temp) = session();
        assert_eq!(session.try_exit_level(1), Ok(true));
        assert_eq!(session.state().level(), "TheEmpress");
        assert!(matches!(
            session.try_exit_level(2),
            Err(StateError::OutOfRange { store: "exits", .. })
        ));
    }
}
