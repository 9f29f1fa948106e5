//! Persistence port for the client's three durable slots.
//!
//! Defines the `PersistenceStore` interface plus JSON helpers that degrade
//! read failures to "absent". Implementations live in partyline-infra
//! (`SqliteStore`) and in [`memory`] (`MemoryStore`).

pub mod memory;

use std::fmt;

use partyline_types::error::PersistenceError;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use memory::MemoryStore;

/// The named slots the client persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// The local user's `UserProfile`.
    ActiveProfile,
    /// Id of the room the user is currently in.
    ActiveRoomId,
    /// Reconciled message history of the current room.
    MessageHistory,
}

impl StorageKey {
    pub const ALL: [StorageKey; 3] = [
        StorageKey::ActiveProfile,
        StorageKey::ActiveRoomId,
        StorageKey::MessageHistory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::ActiveProfile => "active_profile",
            StorageKey::ActiveRoomId => "active_room_id",
            StorageKey::MessageHistory => "message_history",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for the client's key/value persistent storage.
///
/// Values are JSON-encoded UTF-8 text. Uses RPITIT (native async fn in
/// traits, Rust 2024 edition). Implementations are assumed to be externally
/// synchronized; the supervisor never coordinates concurrent writers.
pub trait PersistenceStore: Send + Sync + 'static {
    /// Get the raw value of a slot. Returns None if the slot is empty.
    fn get(
        &self,
        key: StorageKey,
    ) -> impl std::future::Future<Output = Result<Option<String>, PersistenceError>> + Send;

    /// Set the raw value of a slot (upsert).
    fn set(
        &self,
        key: StorageKey,
        value: &str,
    ) -> impl std::future::Future<Output = Result<(), PersistenceError>> + Send;

    /// Empty a slot. No-op if it is already empty.
    fn remove(
        &self,
        key: StorageKey,
    ) -> impl std::future::Future<Output = Result<(), PersistenceError>> + Send;
}

/// Read and decode a slot.
///
/// Absent values, store failures, and corrupt JSON all yield `None`; the
/// latter two are logged.
pub async fn load_json<S, T>(store: &S, key: StorageKey) -> Option<T>
where
    S: PersistenceStore,
    T: DeserializeOwned,
{
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!(%key, error = %err, "failed to read persisted slot, treating as empty");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            let err = PersistenceError::Parse {
                key: key.to_string(),
                reason: err.to_string(),
            };
            tracing::warn!(%key, error = %err, "ignoring corrupt persisted slot");
            None
        }
    }
}

/// Encode and write a slot. Failures are logged, never propagated.
pub async fn save_json<S, T>(store: &S, key: StorageKey, value: &T)
where
    S: PersistenceStore,
    T: Serialize + ?Sized,
{
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!(%key, error = %err, "failed to encode slot value");
            return;
        }
    };

    if let Err(err) = store.set(key, &raw).await {
        tracing::warn!(%key, error = %err, "failed to persist slot");
    }
}

/// Empty a slot. Failures are logged, never propagated.
pub async fn clear_slot<S: PersistenceStore>(store: &S, key: StorageKey) {
    if let Err(err) = store.remove(key).await {
        tracing::warn!(%key, error = %err, "failed to clear persisted slot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partyline_types::message::UserProfile;

    #[tokio::test]
    async fn load_json_decodes_stored_value() {
        let store = MemoryStore::new();
        save_json(&store, StorageKey::ActiveProfile, &UserProfile::new("Alice", None)).await;

        let profile: Option<UserProfile> = load_json(&store, StorageKey::ActiveProfile).await;
        assert_eq!(profile, Some(UserProfile::new("Alice", None)));
    }

    #[tokio::test]
    async fn load_json_treats_corrupt_value_as_absent() {
        let store = MemoryStore::new().with_raw(StorageKey::ActiveRoomId, "{not json");
        let room: Option<String> = load_json(&store, StorageKey::ActiveRoomId).await;
        assert!(room.is_none());
    }

    #[tokio::test]
    async fn store_failures_are_not_fatal() {
        let store = MemoryStore::new();
        store.set_failing(true);

        save_json(&store, StorageKey::ActiveRoomId, "R1").await;
        clear_slot(&store, StorageKey::ActiveRoomId).await;
        let room: Option<String> = load_json(&store, StorageKey::ActiveRoomId).await;
        assert!(room.is_none());
    }

    #[test]
    fn storage_key_names_are_distinct() {
        let names: std::collections::HashSet<_> = StorageKey::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names.len(), 3);
        assert_eq!(StorageKey::MessageHistory.to_string(), "message_history");
    }
}
