#![forbid(unsafe_code)]

pub mod adapters;
pub mod app;
pub mod commands;
pub mod domain;
pub mod infrastructure;
pub mod ports;

#[cfg(test)]
mod testing;

use tracing::info;

pub use app::AppController;
pub use commands::{handle_command, IpcCommand};
pub use domain::DomainError;

/// Start the host-process core and run until interrupted.
pub async fn run() -> Result<(), DomainError> {
    // Initialize the application controller
    let controller = AppController::new().await?;

    let report = controller.start().await?;
    if report.relaunch_required {
        info!("Exiting so the relaunched instance can take over");
        return Ok(());
    }

    info!(
        config_path = %controller.config_path(),
        data_dir = %controller.data_dir(),
        "Talk Desktop ready"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
