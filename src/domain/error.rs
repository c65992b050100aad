use thiserror::Error;

use crate::domain::config::ConfigKey;

/// Domain-level errors for Talk Desktop.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading config before `load()` completed. Always a programming error.
    #[error("Configuration accessed before it was loaded")]
    ConfigNotLoaded,

    #[error("Unknown configuration key: {0}")]
    UnknownConfigKey(String),

    #[error("Invalid value for {key}: expected {expected}")]
    InvalidValue { key: ConfigKey, expected: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Trust prompt failed: {0}")]
    Prompt(String),

    #[error("Unknown trust prompt: {0}")]
    UnknownPrompt(String),

    #[error("Invalid version '{0}'")]
    InvalidVersion(String),

    #[error("Migration '{name}' failed: {reason}")]
    Migration { name: String, reason: String },

    #[error("Relaunch failed: {0}")]
    Relaunch(String),
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
