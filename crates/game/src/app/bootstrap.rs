use std::io;
use std::path::PathBuf;

use arcana_engine::{
    compile_content, resolve_app_paths, BindingOverrides, GameSession, HeadlessWorld, LoopConfig,
    SaveCoordinator, StartMode, TracingAnalytics,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::console_ui::ConsoleUi;

const START_MODE_ENV_VAR: &str = "ARCANA_START";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) session: GameSession,
    pub(crate) start_mode: StartMode,
    pub(crate) overrides: BindingOverrides,
    pub(crate) bindings_path: PathBuf,
}

pub(crate) fn build_app() -> Result<AppWiring, String> {
    init_tracing();
    info!("=== Arcana Startup ===");

    let paths = resolve_app_paths().map_err(|error| error.to_string())?;
    info!(
        root = %paths.root.display(),
        content_dir = %paths.content_dir.display(),
        save_dir = %paths.save_dir.display(),
        "app_paths_resolved"
    );
    let content = compile_content(&paths.content_dir).map_err(|error| error.to_string())?;

    let bindings_path = paths.bindings_file();
    let overrides = BindingOverrides::load(&bindings_path).unwrap_or_else(|error| {
        warn!(error = %error, "bindings_load_failed_using_defaults");
        BindingOverrides::default()
    });

    let world = HeadlessWorld::from_level(content.level());
    let session = GameSession::new(
        content,
        SaveCoordinator::new(&paths.save_dir),
        Box::new(world),
        Box::new(ConsoleUi::new(io::stdout())),
        Box::new(TracingAnalytics),
        &mut rand::thread_rng(),
    );

    Ok(AppWiring {
        config: LoopConfig::default(),
        session,
        start_mode: parse_start_mode_from_env(),
        overrides,
        bindings_path,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// Continue is the default; it starts a new game when no save exists.
fn parse_start_mode_from_env() -> StartMode {
    match std::env::var(START_MODE_ENV_VAR) {
        Ok(raw) => raw.parse().unwrap_or_else(|error| {
            warn!(error = %error, "start_mode_invalid_using_default");
            StartMode::default()
        }),
        Err(_) => StartMode::default(),
    }
}
