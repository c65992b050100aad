use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::ConfigChange;
use crate::ports::ConfigBroadcaster;

/// Buffered changes per subscriber before slow windows start lagging.
const CHANNEL_CAPACITY: usize = 64;

/// Delivers config changes to renderer windows over a broadcast channel.
///
/// Each window subscribes when it opens and drops its receiver when it closes.
pub struct WindowBroadcaster {
    sender: broadcast::Sender<ConfigChange>,
}

impl WindowBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe a window to config changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChange> {
        self.sender.subscribe()
    }

    /// Number of windows currently listening.
    pub fn window_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for WindowBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBroadcaster for WindowBroadcaster {
    fn broadcast(&self, change: &ConfigChange) {
        // No open window is fine
        let delivered = self.sender.send(change.clone()).unwrap_or(0);
        trace!(key = %change.key, windows = delivered, "Config change broadcast");
    }
}
