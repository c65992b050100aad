use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::app::AppConfigService;
use crate::domain::{
    Certificate, CertificateVerdict, ConfigKey, DomainError, PeerCertificate, TrustState,
    UntrustedCertificate, WindowId,
};
use crate::ports::TrustPrompter;

/// Upper bound on how long an unanswered prompt may pin its callers.
pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(600);

type PendingDecision = Shared<BoxFuture<'static, bool>>;

/// Decides whether to accept certificates that failed verification.
///
/// Accepted fingerprints are persisted in `trustedFingerprints`. Concurrent
/// requests for the same fingerprint share a single prompt.
pub struct CertificateTrustService {
    config: Arc<AppConfigService>,
    prompter: Arc<dyn TrustPrompter>,
    /// In-flight prompts by fingerprint. An entry is removed once its
    /// decision is final (and persisted, if accepted).
    pending: Arc<Mutex<HashMap<String, PendingDecision>>>,
    prompt_timeout: Duration,
}

impl CertificateTrustService {
    pub fn new(config: Arc<AppConfigService>, prompter: Arc<dyn TrustPrompter>) -> Self {
        Self {
            config,
            prompter,
            pending: Arc::new(Mutex::new(HashMap::new())),
            prompt_timeout: DEFAULT_PROMPT_TIMEOUT,
        }
    }

    /// Resolve unanswered prompts as rejected after `timeout`.
    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    pub fn trust_state(&self, fingerprint: &str) -> Result<TrustState, DomainError> {
        let pending = self.pending.lock();
        if self.is_trusted(fingerprint)? {
            Ok(TrustState::Trusted)
        } else if pending.contains_key(fingerprint) {
            Ok(TrustState::Pending)
        } else {
            Ok(TrustState::Unknown)
        }
    }

    /// Number of prompts currently waiting for the user.
    pub fn pending_prompts(&self) -> usize {
        self.pending.lock().len()
    }

    /// Ask the user whether to trust a certificate, unless already decided.
    ///
    /// Trusted fingerprints short-circuit to `true`. A fingerprint with an
    /// open prompt joins that prompt instead of opening another one. A
    /// closed window or an expired prompt counts as rejection.
    pub async fn prompt_certificate_trust(
        &self,
        window: WindowId,
        details: &UntrustedCertificate,
    ) -> Result<bool, DomainError> {
        let fingerprint = details.fingerprint();

        // Lookup and claim happen under one lock with no await in between.
        // The prompt task persists trust before it releases its entry, so
        // a caller never misses both.
        let decision = {
            let mut pending = self.pending.lock();

            if self.is_trusted(fingerprint)? {
                debug!(fingerprint = fingerprint, hostname = %details.hostname, "Certificate already trusted");
                return Ok(true);
            }

            match pending.get(fingerprint) {
                Some(decision) => {
                    debug!(fingerprint = fingerprint, hostname = %details.hostname, "Joining pending trust prompt");
                    decision.clone()
                }
                None => {
                    let decision = self.spawn_prompt(window, details.clone());
                    pending.insert(fingerprint.to_string(), decision.clone());
                    decision
                }
            }
        };

        Ok(decision.await)
    }

    /// TLS verification gate.
    ///
    /// Certificates the platform already verified keep the default result;
    /// anything else goes through the trust prompt.
    pub async fn verify_certificate(
        &self,
        window: WindowId,
        details: &UntrustedCertificate,
    ) -> Result<CertificateVerdict, DomainError> {
        if details.is_verified() {
            return Ok(CertificateVerdict::UseDefault);
        }

        warn!(
            hostname = %details.hostname,
            fingerprint = details.fingerprint(),
            result = %details.verification_result,
            "Certificate verification failed"
        );

        if self.prompt_certificate_trust(window, details).await? {
            Ok(CertificateVerdict::Accept)
        } else {
            Ok(CertificateVerdict::Reject)
        }
    }

    /// TLS verification gate for a request, as reported by the networking
    /// layer with the request URL and the raw peer certificate.
    pub async fn verify_request(
        &self,
        window: WindowId,
        url: &str,
        peer: &PeerCertificate<'_>,
        verification_result: &str,
    ) -> Result<CertificateVerdict, DomainError> {
        let details =
            UntrustedCertificate::from_url(url, Certificate::from_der(peer), verification_result)?;
        self.verify_certificate(window, &details).await
    }

    /// Forget a previously trusted fingerprint. Returns whether it was trusted.
    pub async fn revoke_trust(&self, fingerprint: &str) -> Result<bool, DomainError> {
        let revoked = self
            .config
            .update(ConfigKey::TrustedFingerprints, |current| {
                let list = fingerprint_list(current)
                    .into_iter()
                    .filter(|entry| entry != fingerprint)
                    .map(Value::String)
                    .collect();
                Value::Array(list)
            })
            .await?;

        if revoked {
            info!(fingerprint = fingerprint, "Certificate trust revoked");
        }
        Ok(revoked)
    }

    fn is_trusted(&self, fingerprint: &str) -> Result<bool, DomainError> {
        Ok(self
            .config
            .trusted_fingerprints()?
            .iter()
            .any(|trusted| trusted == fingerprint))
    }

    /// Run the prompt on its own task so cleanup happens even if every
    /// caller stops waiting.
    fn spawn_prompt(&self, window: WindowId, details: UntrustedCertificate) -> PendingDecision {
        let config = Arc::clone(&self.config);
        let prompter = Arc::clone(&self.prompter);
        let pending = Arc::clone(&self.pending);
        let timeout = self.prompt_timeout;

        let task = tokio::spawn(async move {
            let fingerprint = details.fingerprint().to_string();
            let accepted = ask(prompter.as_ref(), window, &details, timeout).await;

            if accepted {
                let persisted = config
                    .update(ConfigKey::TrustedFingerprints, |current| {
                        with_fingerprint(current, &fingerprint)
                    })
                    .await;
                match persisted {
                    Ok(_) => info!(
                        fingerprint = %fingerprint,
                        hostname = %details.hostname,
                        "Certificate trusted"
                    ),
                    // Still accepted for this session
                    Err(e) => error!(
                        fingerprint = %fingerprint,
                        error = %e,
                        "Failed to persist certificate trust"
                    ),
                }
            } else {
                info!(fingerprint = %fingerprint, hostname = %details.hostname, "Certificate rejected");
            }

            pending.lock().remove(&fingerprint);
            accepted
        });

        task.map(|joined| joined.unwrap_or(false)).boxed().shared()
    }
}

async fn ask(
    prompter: &dyn TrustPrompter,
    window: WindowId,
    details: &UntrustedCertificate,
    timeout: Duration,
) -> bool {
    let answer = match prompter.open(window, details) {
        Ok(answer) => answer,
        Err(e) => {
            error!(error = %e, hostname = %details.hostname, "Could not show trust prompt");
            return false;
        }
    };

    match tokio::time::timeout(timeout, answer).await {
        Ok(Ok(accepted)) => accepted,
        Ok(Err(_)) => {
            info!(window = %window, "Trust prompt closed without an answer");
            false
        }
        Err(_) => {
            warn!(window = %window, timeout = ?timeout, "Trust prompt timed out");
            false
        }
    }
}

fn fingerprint_list(value: Value) -> Vec<String> {
    serde_json::from_value(value).unwrap_or_default()
}

fn with_fingerprint(current: Value, fingerprint: &str) -> Value {
    let mut list = fingerprint_list(current);
    if !list.iter().any(|entry| entry == fingerprint) {
        list.push(fingerprint.to_string());
    }
    Value::Array(list.into_iter().map(Value::String).collect())
}
