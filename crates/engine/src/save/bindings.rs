use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::atomic_io::write_text_atomic;

pub const BINDINGS_FILE_NAME: &str = "rebinds.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingOverride {
    pub action: String,
    pub path: String,
}

/// User key remaps, stored apart from the game save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingOverrides {
    #[serde(default)]
    overrides: Vec<BindingOverride>,
}

#[derive(Debug, Error)]
pub enum BindingsError {
    #[error("read bindings '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("write bindings '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("encode bindings json: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("parse bindings '{}' at {json_path}: {message}", path.display())]
    Parse {
        path: PathBuf,
        json_path: String,
        message: String,
    },
}

impl BindingOverrides {
    pub fn overrides(&self) -> &[BindingOverride] {
        &self.overrides
    }

    pub fn set(&mut self, action: &str, path: &str) {
        match self.overrides.iter_mut().find(|entry| entry.action == action) {
            Some(entry) => entry.path = path.to_string(),
            None => self.overrides.push(BindingOverride {
                action: action.to_string(),
                path: path.to_string(),
            }),
        }
    }

    pub fn remove(&mut self, action: &str) -> bool {
        let before = self.overrides.len();
        self.overrides.retain(|entry| entry.action != action);
        self.overrides.len() != before
    }

    pub fn path_for(&self, action: &str) -> Option<&str> {
        self.overrides
            .iter()
            .find(|entry| entry.action == action)
            .map(|entry| entry.path.as_str())
    }

    /// A missing file means no overrides.
    pub fn load(path: &Path) -> Result<Self, BindingsError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "bindings_missing");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(BindingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut deserializer = serde_json::Deserializer::from_str(&text);
        let overrides: Self =
            serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
                BindingsError::Parse {
                    path: path.to_path_buf(),
                    json_path: error.path().to_string(),
                    message: error.into_inner().to_string(),
                }
            })?;
        info!(
            path = %path.display(),
            overrides = overrides.overrides.len(),
            "bindings_loaded"
        );
        Ok(overrides)
    }

    pub fn save(&self, path: &Path) -> Result<(), BindingsError> {
        let json = serde_json::to_string_pretty(self)?;
        write_text_atomic(path, &json).map_err(|source| BindingsError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "bindings_written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty_overrides() {
        let temp = tempfile::TempDir::new().expect("temp");
        let loaded =
            BindingOverrides::load(&temp.path().join(BINDINGS_FILE_NAME)).expect("load missing");
        assert!(loaded.overrides().is_empty());
    }

    #[test]
    fn save_then_load_keeps_overrides_in_order() {
        let temp = tempfile::TempDir::new().expect("temp");
        let path = temp.path().join(BINDINGS_FILE_NAME);
        let mut overrides = BindingOverrides::default();
        overrides.set("interact", "<Keyboard>/f");
        overrides.set("jump", "<Keyboard>/j");
        overrides.set("interact", "<Keyboard>/g");
        overrides.save(&path).expect("save");

        let loaded = BindingOverrides::load(&path).expect("load");
        assert_eq!(loaded, overrides);
        assert_eq!(loaded.overrides()[0].path, "<Keyboard>/g");
        assert_eq!(loaded.path_for("jump"), Some("<Keyboard>/j"));
    }

    #[test]
    fn remove_drops_only_named_action() {
        let mut overrides = BindingOverrides::default();
        overrides.set("menu", "<Keyboard>/p");
        assert!(!overrides.remove("jump"));
        assert!(overrides.remove("menu"));
        assert_eq!(overrides.path_for("menu"), None);
    }

    #[test]
    fn malformed_file_reports_json_path() {
        let temp = tempfile::TempDir::new().expect("temp");
        let path = temp.path().join(BINDINGS_FILE_NAME);
        fs::write(&path, r#"{"overrides": [{"action": "jump", "path": 7}]}"#).expect("write");
        match BindingOverrides::load(&path).expect_err("bad path type") {
            BindingsError::Parse { json_path, .. } => assert_eq!(json_path, "overrides[0].path"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
