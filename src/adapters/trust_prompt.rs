use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{DomainError, UntrustedCertificate, WindowId};
use crate::ports::{TrustPromptRequest, TrustPrompter};

struct PendingPrompt {
    parent: WindowId,
    responder: oneshot::Sender<bool>,
}

/// Trust prompts rendered by the UI layer and answered over IPC.
///
/// Each opened prompt is announced on the request channel under a fresh
/// correlation id. The renderer answers with `accept(id, ..)`.
pub struct IpcTrustPrompter {
    requests: mpsc::UnboundedSender<TrustPromptRequest>,
    pending: Mutex<HashMap<String, PendingPrompt>>,
}

impl IpcTrustPrompter {
    /// Create the prompter and the receiving end the UI layer consumes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TrustPromptRequest>) {
        let (requests, receiver) = mpsc::unbounded_channel();
        (
            Self {
                requests,
                pending: Mutex::new(HashMap::new()),
            },
            receiver,
        )
    }

    /// Deliver the user's answer for a prompt.
    ///
    /// Fails with `UnknownPrompt` when the id was never issued or the
    /// waiting side already gave up on it.
    pub fn accept(&self, id: &str, accepted: bool) -> Result<(), DomainError> {
        let prompt = self
            .pending
            .lock()
            .remove(id)
            .ok_or_else(|| DomainError::UnknownPrompt(id.to_string()))?;

        if prompt.responder.send(accepted).is_err() {
            warn!(id = id, parent = %prompt.parent, "Trust prompt answered after it expired");
            return Err(DomainError::UnknownPrompt(id.to_string()));
        }

        info!(id = id, parent = %prompt.parent, accepted = accepted, "Trust prompt answered");
        Ok(())
    }

    /// Drop every prompt hosted by a destroyed window; each resolves as rejected.
    pub fn window_destroyed(&self, parent: WindowId) -> usize {
        let mut pending = self.pending.lock();
        prune_expired(&mut pending);
        let before = pending.len();
        pending.retain(|_, prompt| prompt.parent != parent);
        let dropped = before - pending.len();
        if dropped > 0 {
            warn!(parent = %parent, dropped = dropped, "Window closed with open trust prompts");
        }
        dropped
    }

    /// Number of prompts still awaiting an answer.
    pub fn pending_count(&self) -> usize {
        let mut pending = self.pending.lock();
        prune_expired(&mut pending);
        pending.len()
    }
}

/// Forget prompts nobody is waiting on any more.
fn prune_expired(pending: &mut HashMap<String, PendingPrompt>) {
    pending.retain(|id, prompt| {
        let expired = prompt.responder.is_closed();
        if expired {
            debug!(id = %id, parent = %prompt.parent, "Trust prompt expired");
        }
        !expired
    });
}

impl TrustPrompter for IpcTrustPrompter {
    fn open(
        &self,
        parent: WindowId,
        details: &UntrustedCertificate,
    ) -> Result<oneshot::Receiver<bool>, DomainError> {
        let id = Uuid::new_v4().to_string();
        let (responder, answer) = oneshot::channel();

        {
            let mut pending = self.pending.lock();
            prune_expired(&mut pending);
            pending.insert(id.clone(), PendingPrompt { parent, responder });
        }

        let request = TrustPromptRequest {
            id: id.clone(),
            parent,
            details: details.clone(),
        };
        if self.requests.send(request).is_err() {
            self.pending.lock().remove(&id);
            return Err(DomainError::Prompt("UI layer is not listening".to_string()));
        }

        info!(
            id = %id,
            parent = %parent,
            hostname = %details.hostname,
            fingerprint = %details.fingerprint(),
            "Trust prompt opened"
        );
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Certificate;

    fn details() -> UntrustedCertificate {
        UntrustedCertificate::new(
            "a.test",
            Certificate::with_fingerprint("sha256/ABCD"),
            "net::ERR_CERT_AUTHORITY_INVALID",
        )
    }

    #[tokio::test]
    async fn test_accept_resolves_answer() {
        let (prompter, mut requests) = IpcTrustPrompter::new();
        let answer = prompter.open(WindowId(1), &details()).unwrap();

        let request = requests.recv().await.unwrap();
        assert_eq!(request.parent, WindowId(1));
        assert_eq!(request.details.hostname, "a.test");

        prompter.accept(&request.id, true).unwrap();
        assert!(answer.await.unwrap());
        assert_eq!(prompter.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_id_is_an_error() {
        let (prompter, _requests) = IpcTrustPrompter::new();
        assert!(matches!(
            prompter.accept("missing", true),
            Err(DomainError::UnknownPrompt(_))
        ));
    }

    #[tokio::test]
    async fn test_window_destroyed_drops_its_prompts() {
        let (prompter, _requests) = IpcTrustPrompter::new();
        let first = prompter.open(WindowId(1), &details()).unwrap();
        let _other = prompter.open(WindowId(2), &details()).unwrap();

        assert_eq!(prompter.window_destroyed(WindowId(1)), 1);
        assert!(first.await.is_err());
        assert_eq!(prompter.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_answer_after_caller_gave_up_is_refused() {
        let (prompter, mut requests) = IpcTrustPrompter::new();
        let answer = prompter.open(WindowId(1), &details()).unwrap();
        let request = requests.recv().await.unwrap();

        drop(answer);

        assert!(matches!(
            prompter.accept(&request.id, true),
            Err(DomainError::UnknownPrompt(_))
        ));
        assert_eq!(prompter.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_prompts_are_pruned() {
        let (prompter, _requests) = IpcTrustPrompter::new();
        for _ in 0..3 {
            drop(prompter.open(WindowId(1), &details()).unwrap());
        }
        let _live = prompter.open(WindowId(2), &details()).unwrap();

        assert_eq!(prompter.pending_count(), 1);
        assert_eq!(prompter.window_destroyed(WindowId(1)), 0);
    }

    #[test]
    fn test_open_fails_without_ui() {
        let (prompter, requests) = IpcTrustPrompter::new();
        drop(requests);

        assert!(prompter.open(WindowId(1), &details()).is_err());
        assert_eq!(prompter.pending_count(), 0);
    }
}
