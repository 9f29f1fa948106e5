//! In-memory persistence store.
//!
//! Backs tests and `--ephemeral` CLI runs. Nothing survives the process.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use partyline_types::error::PersistenceError;

use super::{PersistenceStore, StorageKey};

/// `HashMap`-backed implementation of `PersistenceStore`.
///
/// `set_failing(true)` makes every operation return an error, for exercising
/// the degrade-to-empty paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<StorageKey, String>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a slot with raw text (which need not be valid JSON).
    #[must_use]
    pub fn with_raw(self, key: StorageKey, value: impl Into<String>) -> Self {
        self.lock().insert(key, value.into());
        self
    }

    /// Read a slot without going through the async port.
    pub fn raw(&self, key: StorageKey) -> Option<String> {
        self.lock().get(&key).cloned()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<StorageKey, String>> {
        // A poisoned map still holds consistent strings.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, op: &str) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(match op {
                "get" => PersistenceError::Read("memory store unavailable".to_string()),
                _ => PersistenceError::Write("memory store unavailable".to_string()),
            });
        }
        Ok(())
    }
}

impl PersistenceStore for MemoryStore {
    async fn get(&self, key: StorageKey) -> Result<Option<String>, PersistenceError> {
        self.check("get")?;
        Ok(self.lock().get(&key).cloned())
    }

    async fn set(&self, key: StorageKey, value: &str) -> Result<(), PersistenceError> {
        self.check("set")?;
        self.lock().insert(key, value.to_string());
        Ok(())
    }

    async fn remove(&self, key: StorageKey) -> Result<(), PersistenceError> {
        self.check("remove")?;
        self.lock().remove(&key);
        Ok(())
    }
}
