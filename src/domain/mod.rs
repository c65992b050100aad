pub mod certificate;
pub mod config;
pub mod error;
pub mod version;
pub mod window;

pub use certificate::{
    Certificate, CertificateVerdict, PeerCertificate, TrustState, UntrustedCertificate,
};
pub use config::{AppConfig, ConfigChange, ConfigKey, DroppedEntry, Overrides};
pub use error::DomainError;
pub use version::{AppVersion, LaunchKind};
pub use window::WindowId;
