mod bootstrap;
mod console;
mod console_ui;
mod loop_runner;

use std::process::ExitCode;

use tracing::error;

pub(crate) fn run() -> ExitCode {
    match bootstrap::build_app() {
        Ok(app) => loop_runner::run(app),
        Err(message) => {
            error!(error = %message, "startup_failed");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}
