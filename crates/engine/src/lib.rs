use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod content;
pub mod dialogue;
pub mod mechanics;
pub mod save;
pub mod state;

pub use app::{
    AnalyticsEvent, AnalyticsLog, AnalyticsSink, FixedStepClock, GameSession, HeadlessWorld,
    InputAction, Interactable, KeyBindings, LoopConfig, NullUi, StepPlan, TracingAnalytics,
    UiSink, Vec3, WorldLink, HOTBAR_SLOTS,
};
pub use content::{
    compile_content, ContentCompileError, ContentDatabase, ContentErrorCode, LevelDef,
    SourceLocation,
};
pub use dialogue::{DialogueEngine, DialogueError, DialogueEvent, DialoguePhase, NpcDialogue};
pub use save::{
    BindingOverrides, BindingsError, BootOutcome, RestoreReport, SaveCoordinator, SaveError,
    SaveSnapshot, StartMode, BINDINGS_FILE_NAME, SAVE_FILE_NAME,
};
pub use state::{GameState, StateError};

pub const ROOT_ENV_VAR: &str = "ARCANA_ROOT";
pub const SAVE_DIR_ENV_VAR: &str = "ARCANA_SAVE_DIR";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub content_dir: PathBuf,
    pub save_dir: PathBuf,
}

impl AppPaths {
    pub fn save_file(&self) -> PathBuf {
        self.save_dir.join(SAVE_FILE_NAME)
    }

    pub fn bindings_file(&self) -> PathBuf {
        self.save_dir.join(BINDINGS_FILE_NAME)
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create save directory at {path}: {source}")]
    CreateSaveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "ARCANA_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/arcana\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

/// Resolves the project root, content directory and save directory, creating
/// the save directory when missing.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    let content_dir = root.join("assets").join("base");
    let save_dir = match read_env(SAVE_DIR_ENV_VAR)? {
        Some(value) => PathBuf::from(value),
        None => root.join("saves"),
    };

    fs::create_dir_all(&save_dir).map_err(|source| StartupError::CreateSaveDir {
        path: save_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        root,
        content_dir,
        save_dir: normalize_path(&save_dir),
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    if let Some(value) = read_env(ROOT_ENV_VAR)? {
        let normalized = normalize_path(&PathBuf::from(value));
        return if is_repo_marker(&normalized) {
            Ok(normalized)
        } else {
            Err(StartupError::InvalidEnvRoot { path: normalized })
        };
    }

    let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
    let exe_dir = exe
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

    exe_dir
        .ancestors()
        .find(|candidate| is_repo_marker(candidate))
        .map(normalize_path)
        .ok_or_else(|| StartupError::RootNotFound {
            start_dir: normalize_path(&exe_dir),
            env_var: ROOT_ENV_VAR,
        })
}

fn read_env(var: &'static str) -> Result<Option<String>, StartupError> {
    match env::var(var) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(source) => Err(StartupError::EnvVar { var, source }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
