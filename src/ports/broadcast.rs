use crate::domain::ConfigChange;

/// Fire-and-forget delivery of config changes to every open window.
pub trait ConfigBroadcaster: Send + Sync {
    fn broadcast(&self, change: &ConfigChange);
}
