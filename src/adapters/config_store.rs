use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info};

use crate::domain::{DomainError, Overrides};
use crate::ports::ConfigStore;

/// Application directory name under the OS config/data roots.
const APP_DIR_NAME: &str = "Nextcloud Talk";

/// Overrides the data directory (portable installs, tests).
pub const DATA_DIR_ENV: &str = "TALK_DESKTOP_DATA_DIR";

/// JSON-based configuration store with OS-specific paths.
pub struct JsonConfigStore {
    data_dir: PathBuf,
}

impl JsonConfigStore {
    /// Create a new JsonConfigStore.
    /// Uses OS-specific application data directories unless `TALK_DESKTOP_DATA_DIR` is set.
    pub fn new() -> Result<Self, DomainError> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => Self::get_data_dir()?,
        };

        // Ensure the data directory exists
        std::fs::create_dir_all(&data_dir)?;

        info!(data_dir = ?data_dir, "ConfigStore initialized");

        Ok(Self { data_dir })
    }

    /// Create a store rooted at an explicit directory.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Get the OS-specific application data directory.
    /// - macOS: ~/Library/Application Support/Nextcloud Talk/
    /// - Windows: %APPDATA%\Nextcloud Talk\
    /// - Linux: ~/.config/Nextcloud Talk/
    fn get_data_dir() -> Result<PathBuf, DomainError> {
        #[cfg(target_os = "macos")]
        {
            dirs::data_dir()
                .map(|p| p.join(APP_DIR_NAME))
                .ok_or_else(|| DomainError::Config("Could not find application data directory".to_string()))
        }

        #[cfg(not(target_os = "macos"))]
        {
            dirs::config_dir()
                .map(|p| p.join(APP_DIR_NAME))
                .ok_or_else(|| DomainError::Config("Could not find application data directory".to_string()))
        }
    }

    /// Get the OS-specific log directory.
    /// - macOS: ~/Library/Application Support/Nextcloud Talk/logs/
    /// - Windows: %LOCALAPPDATA%\Nextcloud Talk\logs\
    /// - Linux: ~/.local/share/Nextcloud Talk/logs/
    fn get_logs_dir(&self) -> PathBuf {
        if std::env::var_os(DATA_DIR_ENV).is_some() {
            return self.data_dir.join("logs");
        }

        #[cfg(target_os = "windows")]
        {
            dirs::data_local_dir()
                .map(|p| p.join(APP_DIR_NAME).join("logs"))
                .unwrap_or_else(|| self.data_dir.join("logs"))
        }

        #[cfg(target_os = "linux")]
        {
            dirs::data_dir()
                .map(|p| p.join(APP_DIR_NAME).join("logs"))
                .unwrap_or_else(|| self.data_dir.join("logs"))
        }

        #[cfg(not(any(target_os = "windows", target_os = "linux")))]
        {
            self.data_dir.join("logs")
        }
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn load(&self) -> Result<Option<Value>, DomainError> {
        let config_path = self.config_path();

        debug!(path = ?config_path, "Loading configuration");
        let content = match fs::read_to_string(&config_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = ?config_path, "Configuration file not found, using defaults");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let document: Value = serde_json::from_str(&content)?;
        info!(path = ?config_path, "Configuration loaded");
        Ok(Some(document))
    }

    async fn save(&self, overrides: &Overrides) -> Result<(), DomainError> {
        let config_path = self.config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = overrides.to_json_pretty()?;
        fs::write(&config_path, content).await?;

        debug!(path = ?config_path, keys = overrides.len(), "Configuration saved");
        Ok(())
    }

    fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    fn logs_dir(&self) -> PathBuf {
        self.get_logs_dir()
    }
}
