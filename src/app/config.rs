use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::domain::config::same_value;
use crate::domain::{AppConfig, ConfigChange, ConfigKey, DomainError, DroppedEntry, Overrides};
use crate::ports::{ConfigBroadcaster, ConfigStore};

type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// What `load()` found on disk.
///
/// Loading runs before logging is set up, so the findings are kept here
/// and logged once the subscriber exists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Number of overrides kept.
    pub overrides: usize,
    /// Entries removed because they are unknown or of the wrong kind.
    pub dropped: Vec<DroppedEntry>,
    /// Why the file was ignored entirely, if it was.
    pub fallback: Option<String>,
}

impl LoadReport {
    pub fn log(&self, path: &Path) {
        for entry in &self.dropped {
            warn!(key = %entry.key, reason = %entry.reason, "Dropped config entry");
        }
        if let Some(reason) = &self.fallback {
            warn!(path = ?path, reason = %reason, "Ignoring configuration file, using defaults");
        }
        info!(
            overrides = self.overrides,
            dropped = self.dropped.len(),
            "Configuration initialized"
        );
    }
}

/// Handle returned by `on_change`, used to unregister the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Single source of truth for durable application settings.
///
/// Holds the validated overrides in memory, persists them through the
/// `ConfigStore` port on every change, and notifies windows and local
/// listeners. Reads before `load()` fail with `ConfigNotLoaded`.
pub struct AppConfigService {
    store: Arc<dyn ConfigStore>,
    broadcaster: Arc<dyn ConfigBroadcaster>,
    /// `None` until `load()` completes.
    overrides: RwLock<Option<Overrides>>,
    listeners: RwLock<HashMap<ConfigKey, Vec<(ListenerId, Listener)>>>,
    next_listener_id: AtomicU64,
    /// Serializes mutations so disk always ends up with the latest snapshot.
    write_lock: Mutex<()>,
}

impl AppConfigService {
    pub fn new(store: Arc<dyn ConfigStore>, broadcaster: Arc<dyn ConfigBroadcaster>) -> Self {
        Self {
            store,
            broadcaster,
            overrides: RwLock::new(None),
            listeners: RwLock::new(HashMap::new()),
            next_listener_id: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    /// Load and validate the persisted overrides.
    ///
    /// Never fails: a missing, unreadable or malformed file starts from defaults.
    pub async fn load(&self) -> LoadReport {
        let _write = self.write_lock.lock().await;

        let mut report = LoadReport::default();
        let overrides = match self.store.load().await {
            Ok(Some(document)) => match Overrides::decode(document) {
                Ok((overrides, dropped)) => {
                    report.dropped = dropped;
                    overrides
                }
                Err(e) => {
                    report.fallback = Some(e.to_string());
                    Overrides::default()
                }
            },
            Ok(None) => Overrides::default(),
            Err(e) => {
                report.fallback = Some(e.to_string());
                Overrides::default()
            }
        };

        report.overrides = overrides.len();
        debug!(overrides = report.overrides, "Configuration loaded");
        *self.overrides.write() = Some(overrides);
        report
    }

    pub fn is_loaded(&self) -> bool {
        self.overrides.read().is_some()
    }

    /// Get the full merged configuration.
    pub fn get(&self) -> Result<AppConfig, DomainError> {
        let guard = self.overrides.read();
        let overrides = guard.as_ref().ok_or(DomainError::ConfigNotLoaded)?;
        AppConfig::from_overrides(overrides)
    }

    /// Get the merged value of a single key.
    pub fn get_value(&self, key: ConfigKey) -> Result<Value, DomainError> {
        let guard = self.overrides.read();
        let overrides = guard.as_ref().ok_or(DomainError::ConfigNotLoaded)?;
        Ok(overrides.resolve(key))
    }

    /// Snapshot of the user-set values only.
    pub fn overrides(&self) -> Result<Overrides, DomainError> {
        self.overrides
            .read()
            .clone()
            .ok_or(DomainError::ConfigNotLoaded)
    }

    pub fn trusted_fingerprints(&self) -> Result<Vec<String>, DomainError> {
        Ok(serde_json::from_value(
            self.get_value(ConfigKey::TrustedFingerprints)?,
        )?)
    }

    pub fn last_app_version(&self) -> Result<Option<String>, DomainError> {
        Ok(serde_json::from_value(self.get_value(ConfigKey::LastAppVersion)?)?)
    }

    /// Set a value. Returns whether anything changed.
    ///
    /// Setting the current value is a no-op: no write, no notification.
    pub async fn set(&self, key: ConfigKey, value: Value) -> Result<bool, DomainError> {
        let _write = self.write_lock.lock().await;
        self.apply(key, Some(value)).await
    }

    /// Drop the override for a key, reverting it to its default.
    pub async fn reset(&self, key: ConfigKey) -> Result<bool, DomainError> {
        let _write = self.write_lock.lock().await;
        self.apply(key, None).await
    }

    /// Atomically derive a new value from the current one.
    pub async fn update<F>(&self, key: ConfigKey, f: F) -> Result<bool, DomainError>
    where
        F: FnOnce(Value) -> Value + Send,
    {
        let _write = self.write_lock.lock().await;
        let current = self.get_value(key)?;
        self.apply(key, Some(f(current))).await
    }

    /// Register a listener for changes of `key`.
    pub fn on_change<F>(&self, key: ConfigKey, listener: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(key)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Unregister a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, key: ConfigKey, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(entries) = listeners.get_mut(&key) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        before != entries.len()
    }

    pub fn config_path(&self) -> PathBuf {
        self.store.config_path()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.store.data_dir()
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.store.logs_dir()
    }

    /// Apply a change. Caller must hold `write_lock`.
    ///
    /// Readers keep seeing the previous value until the new snapshot is on disk.
    async fn apply(&self, key: ConfigKey, value: Option<Value>) -> Result<bool, DomainError> {
        if let Some(value) = &value {
            key.validate(value)?;
        }

        let (snapshot, new_value) = {
            let guard = self.overrides.read();
            let current = guard.as_ref().ok_or(DomainError::ConfigNotLoaded)?;

            let new_value = value.clone().unwrap_or_else(|| key.default_value());
            if same_value(&new_value, &current.resolve(key)) {
                return Ok(false);
            }

            let mut snapshot = current.clone();
            match value {
                Some(value) => snapshot.insert(key, value),
                None => snapshot.remove(key),
            };
            (snapshot, new_value)
        };

        if let Err(e) = self.store.save(&snapshot).await {
            error!(key = %key, error = %e, "Failed to persist configuration");
            return Err(e);
        }
        *self.overrides.write() = Some(snapshot);

        debug!(key = %key, value = %new_value, "Configuration updated");
        self.notify(ConfigChange {
            key,
            value: new_value,
        });
        Ok(true)
    }

    fn notify(&self, change: ConfigChange) {
        self.broadcaster.broadcast(&change);

        // Clone out so listeners may call back into the service
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .get(&change.key)
            .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        for listener in listeners {
            listener(&change.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::Theme;
    use crate::testing::{MemoryConfigStore, RecordingBroadcaster};
    use parking_lot::Mutex as SyncMutex;
    use serde_json::json;

    fn service_with(
        store: MemoryConfigStore,
    ) -> (AppConfigService, Arc<MemoryConfigStore>, Arc<RecordingBroadcaster>) {
        let store = Arc::new(store);
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let service = AppConfigService::new(store.clone(), broadcaster.clone());
        (service, store, broadcaster)
    }

    async fn loaded(
        store: MemoryConfigStore,
    ) -> (AppConfigService, Arc<MemoryConfigStore>, Arc<RecordingBroadcaster>) {
        let (service, store, broadcaster) = service_with(store);
        service.load().await;
        (service, store, broadcaster)
    }

    #[test]
    fn test_get_before_load_fails() {
        let (service, _, _) = service_with(MemoryConfigStore::default());
        assert!(!service.is_loaded());
        assert!(matches!(service.get(), Err(DomainError::ConfigNotLoaded)));
        assert!(matches!(
            service.get_value(ConfigKey::Theme),
            Err(DomainError::ConfigNotLoaded)
        ));
    }

    #[tokio::test]
    async fn test_set_before_load_fails() {
        let (service, store, _) = service_with(MemoryConfigStore::default());
        let result = service.set(ConfigKey::Theme, json!("dark")).await;
        assert!(matches!(result, Err(DomainError::ConfigNotLoaded)));
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn test_fresh_install_uses_defaults() {
        let (service, _, _) = loaded(MemoryConfigStore::default()).await;
        let defaults = AppConfig::from_overrides(&Overrides::default()).unwrap();

        assert_eq!(service.get().unwrap(), defaults);
        assert_eq!(service.trusted_fingerprints().unwrap(), Vec::<String>::new());
        assert!(service.overrides().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_failure_falls_back_to_defaults() {
        let store = MemoryConfigStore::with_document(json!({ "theme": "dark" }));
        store.set_fail_reads(true);
        let (service, _, _) = service_with(store);

        let report = service.load().await;

        assert!(service.is_loaded());
        assert_eq!(service.get().unwrap().theme, Theme::Default);
        assert!(report.fallback.is_some());
        assert_eq!(report.overrides, 0);
    }

    #[tokio::test]
    async fn test_non_object_file_falls_back_to_defaults() {
        let (service, _, _) = loaded(MemoryConfigStore::with_document(json!("oops"))).await;
        assert!(service.overrides().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_strips_unknown_and_invalid_keys() {
        let store = MemoryConfigStore::with_document(json!({
            "theme": "light",
            "launchAtStartup": "true",
            "legacyOption": 1,
        }));
        let (service, _, _) = service_with(store);

        let report = service.load().await;

        assert_eq!(report.overrides, 1);
        assert_eq!(report.dropped.len(), 2);
        assert!(report.fallback.is_none());
        let overrides = service.overrides().unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides.get(ConfigKey::Theme), Some(&json!("light")));
        assert_eq!(service.get_value(ConfigKey::LaunchAtStartup).unwrap(), json!(false));
    }

    #[tokio::test]
    async fn test_single_override_merges_with_defaults() {
        let (service, _, _) = loaded(MemoryConfigStore::default()).await;
        service.set(ConfigKey::Theme, json!("dark")).await.unwrap();

        let mut expected = AppConfig::from_overrides(&Overrides::default()).unwrap();
        expected.theme = Theme::Dark;
        assert_eq!(service.get().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_set_persists_broadcasts_and_notifies() {
        let (service, store, broadcaster) = loaded(MemoryConfigStore::default()).await;
        let seen = Arc::new(SyncMutex::new(Vec::new()));
        let sink = seen.clone();
        service.on_change(ConfigKey::ZoomFactor, move |value| sink.lock().push(value.clone()));

        assert!(service.set(ConfigKey::ZoomFactor, json!(1.5)).await.unwrap());

        assert_eq!(store.saves(), 1);
        assert_eq!(store.document(), Some(json!({ "zoomFactor": 1.5 })));
        assert_eq!(
            broadcaster.changes(),
            vec![ConfigChange {
                key: ConfigKey::ZoomFactor,
                value: json!(1.5)
            }]
        );
        assert_eq!(*seen.lock(), vec![json!(1.5)]);
    }

    #[tokio::test]
    async fn test_setting_same_value_is_a_noop() {
        let (service, store, broadcaster) = loaded(MemoryConfigStore::default()).await;
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        service.on_change(ConfigKey::Theme, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        service.set(ConfigKey::Theme, json!("dark")).await.unwrap();
        let saves = store.saves();

        assert!(!service.set(ConfigKey::Theme, json!("dark")).await.unwrap());
        assert_eq!(store.saves(), saves);
        assert_eq!(broadcaster.changes().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_setting_default_without_override_is_a_noop() {
        let (service, store, _) = loaded(MemoryConfigStore::default()).await;
        assert!(!service.set(ConfigKey::Theme, json!("default")).await.unwrap());
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn test_reset_reverts_to_default_and_notifies_default() {
        let (service, store, broadcaster) = loaded(MemoryConfigStore::default()).await;
        service.set(ConfigKey::LaunchAtStartup, json!(true)).await.unwrap();

        assert!(service.reset(ConfigKey::LaunchAtStartup).await.unwrap());

        assert_eq!(store.document(), Some(json!({})));
        assert_eq!(
            broadcaster.changes().last(),
            Some(&ConfigChange {
                key: ConfigKey::LaunchAtStartup,
                value: json!(false)
            })
        );
        assert!(!service.reset(ConfigKey::LaunchAtStartup).await.unwrap());
    }

    #[tokio::test]
    async fn test_numerically_equal_value_is_a_noop() {
        let (service, store, broadcaster) = loaded(MemoryConfigStore::default()).await;

        assert!(!service.set(ConfigKey::ZoomFactor, json!(1.0)).await.unwrap());

        assert_eq!(store.saves(), 0);
        assert!(broadcaster.changes().is_empty());
    }

    #[tokio::test]
    async fn test_value_is_not_visible_until_written() {
        let (service, store, broadcaster) = loaded(MemoryConfigStore::default()).await;
        let service = Arc::new(service);
        let gate = store.hold_writes();

        let writer = {
            let service = service.clone();
            tokio::spawn(async move { service.set(ConfigKey::Theme, json!("dark")).await })
        };
        while store.writes_started() == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(service.get_value(ConfigKey::Theme).unwrap(), json!("default"));
        assert!(broadcaster.changes().is_empty());

        gate.notify_one();
        assert!(writer.await.unwrap().unwrap());
        assert_eq!(service.get_value(ConfigKey::Theme).unwrap(), json!("dark"));
    }

    #[tokio::test]
    async fn test_invalid_value_is_rejected() {
        let (service, store, _) = loaded(MemoryConfigStore::default()).await;
        let result = service.set(ConfigKey::PlaySoundCall, json!("loud")).await;
        assert!(matches!(result, Err(DomainError::InvalidValue { .. })));
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_propagates_and_keeps_previous_value() {
        let (service, store, broadcaster) = loaded(MemoryConfigStore::default()).await;
        store.set_fail_writes(true);

        let result = service.set(ConfigKey::MonochromeTrayIcon, json!(true)).await;
        assert!(matches!(result, Err(DomainError::Io(_))));
        assert_eq!(
            service.get_value(ConfigKey::MonochromeTrayIcon).unwrap(),
            json!(false)
        );
        assert!(broadcaster.changes().is_empty());

        store.set_fail_writes(false);
        assert!(service.set(ConfigKey::MonochromeTrayIcon, json!(true)).await.unwrap());
        assert_eq!(store.saves(), 1);
    }

    #[tokio::test]
    async fn test_listeners_run_in_registration_order() {
        let (service, _, _) = loaded(MemoryConfigStore::default()).await;
        let order = Arc::new(SyncMutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            service.on_change(ConfigKey::Theme, move |_| order.lock().push(tag));
        }
        let unrelated = order.clone();
        service.on_change(ConfigKey::ZoomFactor, move |_| unrelated.lock().push("zoom"));

        service.set(ConfigKey::Theme, json!("light")).await.unwrap();
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_removed_listener_is_not_called() {
        let (service, _, _) = loaded(MemoryConfigStore::default()).await;
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let id = service.on_change(ConfigKey::Theme, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(service.remove_listener(ConfigKey::Theme, id));
        assert!(!service.remove_listener(ConfigKey::Theme, id));

        service.set(ConfigKey::Theme, json!("dark")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_listener_can_read_back() {
        let (service, _, _) = loaded(MemoryConfigStore::default()).await;
        let service = Arc::new(service);
        let seen = Arc::new(SyncMutex::new(None));

        let reader = Arc::downgrade(&service);
        let sink = seen.clone();
        service.on_change(ConfigKey::Theme, move |_| {
            if let Some(service) = reader.upgrade() {
                *sink.lock() = Some(service.get().unwrap().theme);
            }
        });

        service.set(ConfigKey::Theme, json!("dark")).await.unwrap();
        assert_eq!(*seen.lock(), Some(Theme::Dark));
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let (service, store, _) = loaded(MemoryConfigStore::default()).await;
        let service = Arc::new(service);

        let mut tasks = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                service
                    .update(ConfigKey::TrustedFingerprints, move |current| {
                        let mut list = current.as_array().cloned().unwrap_or_default();
                        list.push(json!(format!("sha256/{i}")));
                        Value::Array(list)
                    })
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(service.trusted_fingerprints().unwrap().len(), 8);
        let on_disk = store.document().unwrap();
        assert_eq!(on_disk["trustedFingerprints"].as_array().unwrap().len(), 8);
    }
}
