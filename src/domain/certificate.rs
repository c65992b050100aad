use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::domain::DomainError;

/// Verification result reported for a certificate the platform accepted.
pub const VERIFICATION_OK: &str = "net::OK";

/// A TLS certificate as presented to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// `sha256/<base64>` digest of the DER encoding.
    pub fingerprint: String,
    #[serde(default)]
    pub issuer_name: String,
    #[serde(default)]
    pub subject_name: String,
    /// Unix seconds.
    #[serde(default)]
    pub valid_start: i64,
    /// Unix seconds.
    #[serde(default)]
    pub valid_expiry: i64,
    /// PEM-encoded certificate.
    #[serde(default)]
    pub data: String,
}

/// Peer certificate as handed over by the TLS stack for a failed request.
#[derive(Debug, Clone, Copy)]
pub struct PeerCertificate<'a> {
    pub der: &'a [u8],
    pub issuer_name: &'a str,
    pub subject_name: &'a str,
    pub valid_start: i64,
    pub valid_expiry: i64,
}

impl Certificate {
    /// Build a certificate from its DER encoding, deriving the fingerprint.
    pub fn from_der(peer: &PeerCertificate<'_>) -> Self {
        Self {
            fingerprint: fingerprint_of(peer.der),
            issuer_name: peer.issuer_name.to_string(),
            subject_name: peer.subject_name.to_string(),
            valid_start: peer.valid_start,
            valid_expiry: peer.valid_expiry,
            data: to_pem(peer.der),
        }
    }

    /// Certificate identified only by its fingerprint.
    pub fn with_fingerprint(fingerprint: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            issuer_name: String::new(),
            subject_name: String::new(),
            valid_start: 0,
            valid_expiry: 0,
            data: String::new(),
        }
    }
}

/// `sha256/<base64>` fingerprint of a DER-encoded certificate.
pub fn fingerprint_of(der: &[u8]) -> String {
    let digest = Sha256::digest(der);
    format!("sha256/{}", STANDARD.encode(digest))
}

fn to_pem(der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut pem = String::from("-----BEGIN CERTIFICATE-----\n");
    for line in encoded.as_bytes().chunks(64) {
        // base64 output is ASCII
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    pem
}

/// One TLS verification failure, as reported by the networking layer.
///
/// Transient: only the fingerprint is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UntrustedCertificate {
    pub hostname: String,
    pub certificate: Certificate,
    /// Chromium-style result, e.g. `net::ERR_CERT_AUTHORITY_INVALID`.
    pub verification_result: String,
}

impl UntrustedCertificate {
    pub fn new(
        hostname: impl Into<String>,
        certificate: Certificate,
        verification_result: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            certificate,
            verification_result: verification_result.into(),
        }
    }

    /// Build details from the URL of the request that failed verification.
    pub fn from_url(
        url: &str,
        certificate: Certificate,
        verification_result: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let parsed = Url::parse(url).map_err(|e| DomainError::Certificate(e.to_string()))?;
        let hostname = parsed
            .host_str()
            .ok_or_else(|| DomainError::Certificate(format!("URL has no host: {}", url)))?;
        Ok(Self::new(hostname, certificate, verification_result))
    }

    pub fn fingerprint(&self) -> &str {
        &self.certificate.fingerprint
    }

    /// Whether the platform verifier already accepted the certificate.
    pub fn is_verified(&self) -> bool {
        self.verification_result == VERIFICATION_OK
    }
}

/// Trust status of a fingerprint.
///
/// A declined prompt is not remembered, so there is no rejected state:
/// the fingerprint goes back to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustState {
    Unknown,
    Pending,
    Trusted,
}

/// Answer for the TLS verification gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CertificateVerdict {
    /// Keep the platform's own verification result.
    UseDefault,
    Accept,
    Reject,
}
