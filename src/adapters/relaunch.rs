use std::process::Command;

use tracing::info;

use crate::domain::DomainError;
use crate::ports::Relauncher;

/// Restarts the application by spawning the current executable again.
///
/// The running process keeps going; the caller decides when to exit.
pub struct ProcessRelauncher;

impl Relauncher for ProcessRelauncher {
    fn relaunch(&self) -> Result<(), DomainError> {
        let exe = std::env::current_exe()
            .map_err(|e| DomainError::Relaunch(format!("Cannot locate executable: {}", e)))?;
        let args: Vec<_> = std::env::args_os().skip(1).collect();

        let child = Command::new(&exe)
            .args(&args)
            .spawn()
            .map_err(|e| DomainError::Relaunch(e.to_string()))?;

        info!(exe = ?exe, pid = child.id(), "Relaunched application");
        Ok(())
    }
}
