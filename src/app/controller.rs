use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use crate::adapters::{IpcTrustPrompter, JsonConfigStore, ProcessRelauncher, WindowBroadcaster};
use crate::app::migrations::{default_migrations, MigrationReport, MigrationRunner};
use crate::app::{AppConfigService, CertificateTrustService, LoadReport};
use crate::domain::{AppVersion, ConfigChange, DomainError};
use crate::infrastructure::init_logging;
use crate::ports::{ConfigStore, TrustPromptRequest};

/// Application controller that orchestrates initialization and owns the services.
pub struct AppController {
    config: Arc<AppConfigService>,
    trust: Arc<CertificateTrustService>,
    prompter: Arc<IpcTrustPrompter>,
    broadcaster: Arc<WindowBroadcaster>,
    migrations: MigrationRunner,
    prompt_requests: Mutex<Option<mpsc::UnboundedReceiver<TrustPromptRequest>>>,
    load_report: LoadReport,
    _log_guard: Option<WorkerGuard>,
}

impl AppController {
    /// Initialize the application controller.
    /// This sets up configuration, logging, and the trust workflow.
    pub async fn new() -> Result<Self, DomainError> {
        // Step 1: Initialize config store
        let store = Arc::new(JsonConfigStore::new()?);

        // Step 2: Load configuration and build services
        let mut controller = Self::with_store(store).await?;

        // Step 3: Initialize logging
        let config = controller.config.get()?;
        controller._log_guard = init_logging(
            &controller.config.logs_dir(),
            config.log_level,
            config.file_logging,
        )?;
        controller
            .load_report
            .log(&controller.config.config_path());

        info!(
            version = env!("CARGO_PKG_VERSION"),
            trusted_certificates = config.trusted_fingerprints.len(),
            "AppController initialized"
        );

        Ok(controller)
    }

    /// Build the controller on top of an arbitrary config store, without logging.
    pub async fn with_store(store: Arc<dyn ConfigStore>) -> Result<Self, DomainError> {
        let broadcaster = Arc::new(WindowBroadcaster::new());
        let config = Arc::new(AppConfigService::new(store, broadcaster.clone()));
        let load_report = config.load().await;

        let (prompter, prompt_requests) = IpcTrustPrompter::new();
        let prompter = Arc::new(prompter);
        let trust = Arc::new(CertificateTrustService::new(
            config.clone(),
            prompter.clone(),
        ));

        let migrations = MigrationRunner::new(
            default_migrations(config.data_dir(), config.clone()),
            Arc::new(ProcessRelauncher),
        );

        Ok(Self {
            config,
            trust,
            prompter,
            broadcaster,
            migrations,
            prompt_requests: Mutex::new(Some(prompt_requests)),
            load_report,
            _log_guard: None,
        })
    }

    /// Run start-up migrations for the current version.
    pub async fn start(&self) -> Result<MigrationReport, DomainError> {
        let current = AppVersion::current()?;
        self.migrations.run(&self.config, &current).await
    }

    /// What loading the config file found, including dropped entries.
    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    pub fn config(&self) -> &Arc<AppConfigService> {
        &self.config
    }

    pub fn trust(&self) -> &Arc<CertificateTrustService> {
        &self.trust
    }

    pub fn prompter(&self) -> &Arc<IpcTrustPrompter> {
        &self.prompter
    }

    /// Subscribe a newly opened window to config changes.
    pub fn subscribe_window(&self) -> broadcast::Receiver<ConfigChange> {
        self.broadcaster.subscribe()
    }

    /// Hand the trust prompt request stream to the UI layer. Only the first call gets it.
    pub fn take_prompt_requests(&self) -> Option<mpsc::UnboundedReceiver<TrustPromptRequest>> {
        self.prompt_requests.lock().take()
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> String {
        self.config.data_dir().to_string_lossy().to_string()
    }

    /// Get the logs directory path.
    pub fn logs_dir(&self) -> String {
        self.config.logs_dir().to_string_lossy().to_string()
    }

    /// Get the config file path.
    pub fn config_path(&self) -> String {
        self.config.config_path().to_string_lossy().to_string()
    }
}
