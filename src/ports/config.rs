use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{DomainError, Overrides};

/// Configuration store port for persisting and loading the config overrides.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the raw config document from persistent storage.
    /// Returns `Ok(None)` if nothing has been stored yet.
    async fn load(&self) -> Result<Option<Value>, DomainError>;

    /// Overwrite persistent storage with the full override set.
    async fn save(&self, overrides: &Overrides) -> Result<(), DomainError>;

    /// Get the path to the configuration file.
    fn config_path(&self) -> PathBuf;

    /// Get the path to the application data directory.
    fn data_dir(&self) -> PathBuf;

    /// Get the path to the logs directory.
    fn logs_dir(&self) -> PathBuf;
}
