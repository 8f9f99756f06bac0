use std::collections::HashSet;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::SaveError;
use crate::app::Vec3;
use crate::state::InventorySnapshotEntry;

/// Everything a save file holds. Field names match the on-disk JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSnapshot {
    pub player_position: Vec3,
    #[serde(default)]
    pub map_boundary: String,
    #[serde(default)]
    pub inventory_save_data: Vec<InventorySnapshotEntry>,
    #[serde(default)]
    pub scene_name: String,
    #[serde(default)]
    pub puzzle_completion_states: Vec<bool>,
    #[serde(default)]
    pub door_lock_states: Vec<bool>,
    #[serde(default)]
    pub hint_given: bool,
}

impl SaveSnapshot {
    pub fn to_json(&self) -> Result<String, SaveError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Structural checks serde cannot express. Registry sizes are checked
    /// later by the stores themselves. Repeated slot indices only warn; the
    /// inventory keeps the first entry for each slot.
    pub fn validate(&self) -> Result<(), SaveError> {
        if !self.player_position.is_finite() {
            return Err(expected_actual(
                "playerPosition",
                "finite coordinates",
                format!(
                    "({}, {}, {})",
                    self.player_position.x, self.player_position.y, self.player_position.z
                ),
            ));
        }

        let mut seen = HashSet::new();
        for (index, entry) in self.inventory_save_data.iter().enumerate() {
            if !seen.insert(entry.slot_index) {
                warn!(
                    entry = index,
                    slot_index = entry.slot_index,
                    "save_duplicate_slot_index"
                );
            }
        }
        Ok(())
    }
}

pub fn parse_snapshot_json(text: &str) -> Result<SaveSnapshot, SaveError> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    let snapshot: SaveSnapshot =
        serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
            let path = error.path().to_string();
            let message = error.into_inner().to_string();
            SaveError::Parse {
                json_path: if path.is_empty() { ".".to_string() } else { path },
                message,
            }
        })?;
    snapshot.validate()?;
    Ok(snapshot)
}

fn expected_actual(path: &str, expected: impl Display, actual: impl Display) -> SaveError {
    SaveError::Invalid {
        path: path.to_string(),
        message: format!("expected {expected}, got {actual}"),
    }
}
