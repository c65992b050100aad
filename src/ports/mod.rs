pub mod broadcast;
pub mod config;
pub mod prompt;
pub mod relaunch;

pub use broadcast::ConfigBroadcaster;
pub use config::ConfigStore;
pub use prompt::{TrustPromptRequest, TrustPrompter};
pub use relaunch::Relauncher;
