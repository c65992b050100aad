use serde::Serialize;
use tokio::sync::oneshot;

use crate::domain::{DomainError, UntrustedCertificate, WindowId};

/// A certificate trust question shown to the user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustPromptRequest {
    /// Correlation id echoed back by the UI with the answer.
    pub id: String,
    pub parent: WindowId,
    pub details: UntrustedCertificate,
}

/// Port for showing the certificate trust modal.
pub trait TrustPrompter: Send + Sync {
    /// Open a modal over `parent` and return the channel carrying the answer.
    ///
    /// Dropping the sender without answering (window closed) means "rejected".
    /// Dropping the receiver withdraws the prompt; a later answer is refused.
    fn open(
        &self,
        parent: WindowId,
        details: &UntrustedCertificate,
    ) -> Result<oneshot::Receiver<bool>, DomainError>;
}
