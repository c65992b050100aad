pub mod config_store;
pub mod relaunch;
pub mod trust_prompt;
pub mod window_broadcast;

pub use config_store::JsonConfigStore;
pub use relaunch::ProcessRelauncher;
pub use trust_prompt::IpcTrustPrompter;
pub use window_broadcast::WindowBroadcaster;
