pub mod config;
pub mod controller;
pub mod migrations;
pub mod trust;

pub use config::{AppConfigService, ListenerId, LoadReport};
pub use controller::AppController;
pub use migrations::{Migration, MigrationReport, MigrationRunner};
pub use trust::CertificateTrustService;
