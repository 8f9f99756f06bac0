mod atomic_io;
mod bindings;
mod coordinator;
mod snapshot;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use bindings::{BindingOverride, BindingOverrides, BindingsError, BINDINGS_FILE_NAME};
pub use coordinator::{
    BootOutcome, RestoreReport, SaveCoordinator, StartMode, StartModeParseError, SAVE_FILE_NAME,
};
pub use snapshot::{parse_snapshot_json, SaveSnapshot};

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("no save at '{}'", path.display())]
    NotFound { path: PathBuf },
    #[error("read save '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("write save '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("encode save json: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("parse save json at {json_path}: {message}")]
    Parse { json_path: String, message: String },
    #[error("validation failed at {path}: {message}")]
    Invalid { path: String, message: String },
}
