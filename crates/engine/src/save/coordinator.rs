use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{info, warn};

use super::atomic_io::write_text_atomic;
use super::snapshot::{parse_snapshot_json, SaveSnapshot};
use super::SaveError;
use crate::app::{Vec3, WorldLink};
use crate::content::LevelDef;
use crate::state::GameState;

pub const SAVE_FILE_NAME: &str = "saveData.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartMode {
    NewGame,
    #[default]
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartModeParseError(String);

impl fmt::Display for StartModeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown start mode '{}' (expected new or continue)", self.0)
    }
}

impl std::error::Error for StartModeParseError {}

impl FromStr for StartMode {
    type Err = StartModeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(StartMode::NewGame),
            "continue" => Ok(StartMode::Continue),
            _ => Err(StartModeParseError(value.to_string())),
        }
    }
}

/// What `restore` actually applied. Rejected parts are already logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub items_placed: usize,
    pub puzzles_restored: bool,
    pub doors_restored: bool,
    pub boundary_applied: bool,
    pub scene_requested: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOutcome {
    /// Defaults applied; `saved` tells whether the fresh save was written.
    NewGame { saved: bool },
    Continued(RestoreReport),
    /// The save could not be loaded, so defaults were applied instead.
    Fallback { reason: String },
}

/// Reads every store into a snapshot and dispatches a snapshot back into
/// the stores. It never changes game state on its own initiative.
#[derive(Debug, Clone)]
pub struct SaveCoordinator {
    save_path: PathBuf,
}

impl SaveCoordinator {
    pub fn new(save_dir: impl AsRef<Path>) -> Self {
        Self {
            save_path: save_dir.as_ref().join(SAVE_FILE_NAME),
        }
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub fn has_save(&self) -> bool {
        self.save_path.is_file()
    }

    pub fn build_snapshot(&self, state: &GameState, world: &dyn WorldLink) -> SaveSnapshot {
        SaveSnapshot {
            player_position: world.player_position(),
            map_boundary: world.map_boundary().unwrap_or_default(),
            inventory_save_data: state.inventory.export_snapshot(),
            scene_name: world.active_scene(),
            puzzle_completion_states: state.puzzles.export_states(),
            door_lock_states: state.doors.export_states(),
            hint_given: state.hint.is_set(),
        }
    }

    pub fn persist(&self, snapshot: &SaveSnapshot) -> Result<(), SaveError> {
        let json = snapshot.to_json()?;
        write_text_atomic(&self.save_path, &json).map_err(|source| SaveError::Write {
            path: self.save_path.clone(),
            source,
        })?;
        info!(path = %self.save_path.display(), "save_written");
        Ok(())
    }

    pub fn save(&self, state: &GameState, world: &dyn WorldLink) -> Result<SaveSnapshot, SaveError> {
        let snapshot = self.build_snapshot(state, world);
        self.persist(&snapshot)?;
        Ok(snapshot)
    }

    pub fn load(&self) -> Result<SaveSnapshot, SaveError> {
        let text = match fs::read_to_string(&self.save_path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(SaveError::NotFound {
                    path: self.save_path.clone(),
                })
            }
            Err(source) => {
                return Err(SaveError::Read {
                    path: self.save_path.clone(),
                    source,
                })
            }
        };
        let snapshot = parse_snapshot_json(&text)?;
        info!(path = %self.save_path.display(), "save_loaded");
        Ok(snapshot)
    }

    /// Applies `snapshot` in a fixed order: inventory, puzzles, doors, hint,
    /// player position, camera boundary, scene. Store-level rejections leave
    /// that store untouched and the rest of the restore continues.
    pub fn restore(
        &self,
        snapshot: &SaveSnapshot,
        state: &mut GameState,
        world: &mut dyn WorldLink,
    ) -> RestoreReport {
        let mut report = RestoreReport {
            items_placed: state
                .inventory
                .import_snapshot(&snapshot.inventory_save_data, &state.items),
            ..RestoreReport::default()
        };
        report.puzzles_restored = state
            .puzzles
            .import_states(&snapshot.puzzle_completion_states)
            .is_ok();
        report.doors_restored = state
            .doors
            .import_states(&snapshot.door_lock_states)
            .is_ok();

        if snapshot.hint_given {
            state.hint.set();
        } else {
            state.hint.clear();
        }

        world.set_player_position(snapshot.player_position);
        if !snapshot.map_boundary.is_empty() {
            report.boundary_applied = world.set_map_boundary(&snapshot.map_boundary);
        }

        if !snapshot.scene_name.is_empty() {
            state.restore_level(&snapshot.scene_name);
            if world.active_scene() != snapshot.scene_name {
                world.request_scene(&snapshot.scene_name);
                report.scene_requested = true;
            }
        }

        info!(
            items = report.items_placed,
            puzzles = report.puzzles_restored,
            doors = report.doors_restored,
            hint = snapshot.hint_given,
            scene = %snapshot.scene_name,
            "save_restored"
        );
        report
    }

    /// Level start: spawn point, default boundary, empty inventory, nothing
    /// completed, doors at their content defaults, hint unset.
    pub fn default_snapshot(state: &GameState, level: &LevelDef) -> SaveSnapshot {
        SaveSnapshot {
            player_position: Vec3::from(level.player_spawn),
            map_boundary: level.default_boundary.clone(),
            inventory_save_data: Vec::new(),
            scene_name: level.scene_name.clone(),
            puzzle_completion_states: vec![false; state.puzzles.count()],
            door_lock_states: state.doors.default_states(),
            hint_given: false,
        }
    }

    pub fn boot(
        &self,
        mode: StartMode,
        state: &mut GameState,
        world: &mut dyn WorldLink,
        level: &LevelDef,
    ) -> BootOutcome {
        if mode == StartMode::Continue && self.has_save() {
            match self.load() {
                Ok(snapshot) => {
                    state.reset_to_defaults();
                    return BootOutcome::Continued(self.restore(&snapshot, state, world));
                }
                Err(error) => {
                    warn!(path = %self.save_path.display(), error = %error, "load_failed");
                    self.apply_defaults(state, world, level);
                    return BootOutcome::Fallback {
                        reason: error.to_string(),
                    };
                }
            }
        }

        if mode == StartMode::Continue {
            info!(path = %self.save_path.display(), "no_save_found_starting_new_game");
        }
        let snapshot = self.apply_defaults(state, world, level);
        let saved = match self.persist(&snapshot) {
            Ok(()) => true,
            Err(error) => {
                warn!(error = %error, "save_failed");
                false
            }
        };
        BootOutcome::NewGame { saved }
    }

    fn apply_defaults(
        &self,
        state: &mut GameState,
        world: &mut dyn WorldLink,
        level: &LevelDef,
    ) -> SaveSnapshot {
        state.reset_to_defaults();
        let snapshot = Self::default_snapshot(state, level);
        self.restore(&snapshot, state, world);
        snapshot
    }
}
