//! In-memory port implementations shared by unit tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{oneshot, Notify};

use crate::domain::{ConfigChange, DomainError, Overrides, UntrustedCertificate, WindowId};
use crate::ports::{ConfigBroadcaster, ConfigStore, Relauncher, TrustPrompter};

#[derive(Default)]
pub struct MemoryConfigStore {
    document: Mutex<Option<Value>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    saves: AtomicUsize,
    writes_started: AtomicUsize,
    write_gate: Mutex<Option<Arc<Notify>>>,
}

impl MemoryConfigStore {
    pub fn with_document(document: Value) -> Self {
        let store = Self::default();
        *store.document.lock() = Some(document);
        store
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every following save wait until the returned gate is notified once.
    pub fn hold_writes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.write_gate.lock() = Some(gate.clone());
        gate
    }

    /// Saves entered, including ones still waiting on the gate.
    pub fn writes_started(&self) -> usize {
        self.writes_started.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn document(&self) -> Option<Value> {
        self.document.lock().clone()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<Option<Value>, DomainError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DomainError::Io("read failed".to_string()));
        }
        Ok(self.document.lock().clone())
    }

    async fn save(&self, overrides: &Overrides) -> Result<(), DomainError> {
        self.writes_started.fetch_add(1, Ordering::SeqCst);
        let gate = self.write_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::Io("disk full".to_string()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.document.lock() = Some(serde_json::to_value(overrides)?);
        Ok(())
    }

    fn config_path(&self) -> PathBuf {
        PathBuf::from("memory/config.json")
    }

    fn data_dir(&self) -> PathBuf {
        PathBuf::from("memory")
    }

    fn logs_dir(&self) -> PathBuf {
        PathBuf::from("memory/logs")
    }
}

#[derive(Default)]
pub struct RecordingBroadcaster {
    changes: Mutex<Vec<ConfigChange>>,
}

impl RecordingBroadcaster {
    pub fn changes(&self) -> Vec<ConfigChange> {
        self.changes.lock().clone()
    }
}

impl ConfigBroadcaster for RecordingBroadcaster {
    fn broadcast(&self, change: &ConfigChange) {
        self.changes.lock().push(change.clone());
    }
}

/// Prompter whose answers are given by the test.
#[derive(Default)]
pub struct ScriptedPrompter {
    opened: Mutex<Vec<(WindowId, UntrustedCertificate)>>,
    responders: Mutex<Vec<oneshot::Sender<bool>>>,
}

impl ScriptedPrompter {
    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn opened(&self) -> Vec<(WindowId, UntrustedCertificate)> {
        self.opened.lock().clone()
    }

    /// Answer the oldest unanswered prompt.
    pub fn answer(&self, accepted: bool) {
        let responder = self.responders.lock().remove(0);
        let _ = responder.send(accepted);
    }

    /// Drop every unanswered prompt, as a closed window would.
    pub fn close_all(&self) {
        self.responders.lock().clear();
    }
}

impl TrustPrompter for ScriptedPrompter {
    fn open(
        &self,
        parent: WindowId,
        details: &UntrustedCertificate,
    ) -> Result<oneshot::Receiver<bool>, DomainError> {
        let (responder, answer) = oneshot::channel();
        self.opened.lock().push((parent, details.clone()));
        self.responders.lock().push(responder);
        Ok(answer)
    }
}

#[derive(Default)]
pub struct RecordingRelauncher {
    calls: AtomicUsize,
}

impl RecordingRelauncher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Relauncher for RecordingRelauncher {
    fn relaunch(&self) -> Result<(), DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
