use std::future::Future;
use std::io::ErrorKind;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::app::AppConfigService;
use crate::domain::{AppVersion, ConfigKey, DomainError, LaunchKind};
use crate::ports::Relauncher;

type Action = Box<dyn Fn() -> BoxFuture<'static, Result<(), DomainError>> + Send + Sync>;
type Validator = Box<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Web runtime cache directories inside the data dir.
const WEB_CACHE_DIRS: &[&str] = &["Cache", "Code Cache", "GPUCache"];

/// A one-time upgrade step.
///
/// Runs only for the launch kinds it opts into, and only while its
/// validator (if any) still reports it as relevant.
pub struct Migration {
    name: &'static str,
    on_first_start: bool,
    on_upgrade: bool,
    requires_relaunch: bool,
    validator: Option<Validator>,
    action: Action,
}

impl Migration {
    pub fn new<F, Fut>(name: &'static str, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        Self {
            name,
            on_first_start: false,
            on_upgrade: false,
            requires_relaunch: false,
            validator: None,
            action: Box::new(move || action().boxed()),
        }
    }

    /// Run when no previous version was recorded.
    pub fn run_on_first_start(mut self) -> Self {
        self.on_first_start = true;
        self
    }

    /// Run when the recorded version is older than the current one.
    pub fn run_on_upgrade(mut self) -> Self {
        self.on_upgrade = true;
        self
    }

    /// Relaunch the app once all migrations finished.
    pub fn relaunch_after(mut self) -> Self {
        self.requires_relaunch = true;
        self
    }

    pub fn with_validator<F, Fut>(mut self, validator: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.validator = Some(Box::new(move || validator().boxed()));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn applies_to(&self, launch: LaunchKind) -> bool {
        match launch {
            LaunchKind::FirstStart => self.on_first_start,
            LaunchKind::Upgrade => self.on_upgrade,
            LaunchKind::Same => false,
        }
    }

    /// Returns whether the action ran.
    async fn execute(&self) -> Result<bool, DomainError> {
        if let Some(validator) = &self.validator {
            if !validator().await {
                return Ok(false);
            }
        }
        (self.action)().await?;
        Ok(true)
    }
}

/// Outcome of a migration run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub launch: LaunchKind,
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    pub relaunch_required: bool,
}

/// Runs the ordered migration list once per launch.
pub struct MigrationRunner {
    migrations: Vec<Migration>,
    relauncher: Arc<dyn Relauncher>,
}

impl MigrationRunner {
    pub fn new(migrations: Vec<Migration>, relauncher: Arc<dyn Relauncher>) -> Self {
        Self {
            migrations,
            relauncher,
        }
    }

    /// Run applicable migrations, record the current version and relaunch if needed.
    ///
    /// A failing migration is logged and does not stop the others.
    pub async fn run(
        &self,
        config: &AppConfigService,
        current: &AppVersion,
    ) -> Result<MigrationReport, DomainError> {
        let last = config.last_app_version()?;
        let launch = LaunchKind::classify(last.as_deref(), current);
        info!(last = ?last, current = %current, launch = ?launch, "Running migrations");

        let mut report = MigrationReport {
            launch,
            applied: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            relaunch_required: false,
        };

        for migration in &self.migrations {
            let name = migration.name.to_string();
            if !migration.applies_to(launch) {
                report.skipped.push(name);
                continue;
            }

            match AssertUnwindSafe(migration.execute()).catch_unwind().await {
                Ok(Ok(true)) => {
                    info!(migration = migration.name, "Migration applied");
                    report.relaunch_required |= migration.requires_relaunch;
                    report.applied.push(name);
                }
                Ok(Ok(false)) => {
                    debug!(migration = migration.name, "Migration no longer relevant");
                    report.skipped.push(name);
                }
                Ok(Err(e)) => {
                    error!(migration = migration.name, error = %e, "Migration failed");
                    report.failed.push(name);
                }
                Err(_) => {
                    error!(migration = migration.name, "Migration panicked");
                    report.failed.push(name);
                }
            }
        }

        if let Err(e) = config
            .set(ConfigKey::LastAppVersion, json!(current.to_string()))
            .await
        {
            error!(error = %e, "Failed to record app version");
        }

        if report.relaunch_required {
            info!("Migrations require a relaunch");
            if let Err(e) = self.relauncher.relaunch() {
                error!(error = %e, "Relaunch after migrations failed");
            }
        }

        info!(
            applied = report.applied.len(),
            failed = report.failed.len(),
            "Migrations finished"
        );
        Ok(report)
    }
}

/// Built-in migrations, in execution order.
pub fn default_migrations(data_dir: PathBuf, config: Arc<AppConfigService>) -> Vec<Migration> {
    let cache_root = data_dir.clone();
    let dedupe_config = Arc::clone(&config);

    vec![
        // A new web client build must not be served from a stale cache
        Migration::new("clear-web-cache", move || {
            let data_dir = data_dir.clone();
            async move { clear_web_cache(&data_dir).await }
        })
        .run_on_upgrade()
        .with_validator(move || {
            let data_dir = cache_root.clone();
            async move { has_web_cache(&data_dir).await }
        }),
        Migration::new("dedupe-trusted-fingerprints", move || {
            let config = Arc::clone(&dedupe_config);
            async move {
                config
                    .update(ConfigKey::TrustedFingerprints, |current| {
                        let list: Vec<String> = serde_json::from_value(current).unwrap_or_default();
                        Value::Array(dedupe(&list).into_iter().map(Value::String).collect())
                    })
                    .await
                    .map(|_| ())
            }
        })
        .run_on_upgrade()
        .with_validator(move || {
            let config = Arc::clone(&config);
            async move {
                config
                    .trusted_fingerprints()
                    .map(|list| dedupe(&list) != list)
                    .unwrap_or(false)
            }
        }),
    ]
}

async fn has_web_cache(data_dir: &Path) -> bool {
    for dir in WEB_CACHE_DIRS {
        if tokio::fs::metadata(data_dir.join(dir)).await.is_ok() {
            return true;
        }
    }
    false
}

async fn clear_web_cache(data_dir: &Path) -> Result<(), DomainError> {
    for dir in WEB_CACHE_DIRS {
        let path = data_dir.join(dir);
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => info!(path = ?path, "Removed web cache"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Trim entries, drop empties and keep the first occurrence of each.
fn dedupe(list: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(list.len());
    for entry in list {
        let entry = entry.trim();
        if !entry.is_empty() && !seen.iter().any(|s: &String| s == entry) {
            seen.push(entry.to_string());
        }
    }
    seen
}
