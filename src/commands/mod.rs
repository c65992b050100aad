use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::AppController;
use crate::domain::{AppConfig, ConfigKey, TrustState, WindowId};

/// A request sent by a renderer window over IPC.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum IpcCommand {
    GetConfig,
    GetConfigValue { key: ConfigKey },
    /// An omitted value reverts the key to its default.
    SetConfig {
        key: ConfigKey,
        #[serde(default)]
        value: Option<Value>,
    },
    AcceptCertificate { id: String, accepted: bool },
    GetTrustState { fingerprint: String },
    WindowClosed { window: WindowId },
    GetPaths,
}

/// Dispatch an IPC command and serialize its result for the renderer.
pub async fn handle_command(
    controller: &AppController,
    command: IpcCommand,
) -> Result<Value, String> {
    match command {
        IpcCommand::GetConfig => to_json(get_config(controller)?),
        IpcCommand::GetConfigValue { key } => get_config_value(controller, key),
        IpcCommand::SetConfig { key, value } => {
            to_json(set_config(controller, key, value).await?)
        }
        IpcCommand::AcceptCertificate { id, accepted } => {
            accept_certificate(controller, &id, accepted)?;
            Ok(Value::Null)
        }
        IpcCommand::GetTrustState { fingerprint } => {
            to_json(get_trust_state(controller, &fingerprint)?)
        }
        IpcCommand::WindowClosed { window } => to_json(window_closed(controller, window)),
        IpcCommand::GetPaths => to_json(get_paths(controller)),
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

// ==================== Config Commands ====================

/// Get the current application configuration.
pub fn get_config(controller: &AppController) -> Result<AppConfig, String> {
    controller.config().get().map_err(|e| e.to_string())
}

/// Get a single configuration value.
pub fn get_config_value(controller: &AppController, key: ConfigKey) -> Result<Value, String> {
    controller.config().get_value(key).map_err(|e| e.to_string())
}

/// Update a configuration value, or revert it to its default when `value`
/// is omitted. Returns whether it changed.
pub async fn set_config(
    controller: &AppController,
    key: ConfigKey,
    value: Option<Value>,
) -> Result<bool, String> {
    let config = controller.config();
    let result = match value {
        Some(value) => config.set(key, value).await,
        None => config.reset(key).await,
    };
    result.map_err(|e| e.to_string())
}

/// Get application paths information.
pub fn get_paths(controller: &AppController) -> AppPaths {
    AppPaths {
        data_dir: controller.data_dir(),
        logs_dir: controller.logs_dir(),
        config_path: controller.config_path(),
    }
}

/// Application paths information.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPaths {
    pub data_dir: String,
    pub logs_dir: String,
    pub config_path: String,
}

// ==================== Certificate Commands ====================

/// Answer an open certificate trust prompt.
pub fn accept_certificate(
    controller: &AppController,
    id: &str,
    accepted: bool,
) -> Result<(), String> {
    controller
        .prompter()
        .accept(id, accepted)
        .map_err(|e| e.to_string())
}

/// Get the trust state of a certificate fingerprint.
pub fn get_trust_state(controller: &AppController, fingerprint: &str) -> Result<TrustState, String> {
    controller
        .trust()
        .trust_state(fingerprint)
        .map_err(|e| e.to_string())
}

// ==================== Window Commands ====================

/// A window was closed; its open prompts resolve as rejected.
pub fn window_closed(controller: &AppController, window: WindowId) -> usize {
    controller.prompter().window_destroyed(window)
}
