//! SQLite implementation of the persistence port.
//!
//! Each `StorageKey` is one row of `client_state`. Values are stored exactly
//! as handed in (JSON text); decoding is the caller's concern.

use chrono::Utc;
use partyline_core::storage::{PersistenceStore, StorageKey};
use partyline_types::error::PersistenceError;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `PersistenceStore`.
pub struct SqliteStore {
    pool: DatabasePool,
}

impl SqliteStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Open the database at `database_url` and wrap it in a store.
    pub async fn open(database_url: &str) -> Result<Self, PersistenceError> {
        let pool = DatabasePool::new(database_url)
            .await
            .map_err(|e| PersistenceError::Read(format!("failed to open {database_url}: {e}")))?;
        Ok(Self::new(pool))
    }

    /// When the slot was last written (RFC 3339), if it is set.
    pub async fn updated_at(&self, key: StorageKey) -> Result<Option<String>, PersistenceError> {
        let row = sqlx::query("SELECT updated_at FROM client_state WHERE key = ?")
            .bind(key.as_str())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| PersistenceError::Read(e.to_string()))?;

        row.map(|row| row.try_get("updated_at"))
            .transpose()
            .map_err(|e| PersistenceError::Read(e.to_string()))
    }
}

impl PersistenceStore for SqliteStore {
    async fn get(&self, key: StorageKey) -> Result<Option<String>, PersistenceError> {
        let row = sqlx::query("SELECT value FROM client_state WHERE key = ?")
            .bind(key.as_str())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| PersistenceError::Read(e.to_string()))?;

        match row {
            Some(row) => {
                let value: String = row
                    .try_get("value")
                    .map_err(|e| PersistenceError::Read(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: StorageKey, value: &str) -> Result<(), PersistenceError> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"INSERT INTO client_state (key, value, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(key.as_str())
        .bind(value)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| PersistenceError::Write(e.to_string()))?;

        Ok(())
    }

    async fn remove(&self, key: StorageKey) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM client_state WHERE key = ?")
            .bind(key.as_str())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| PersistenceError::Write(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partyline_core::storage::{load_json, save_json};
    use partyline_types::message::{Message, UserProfile};

    async fn test_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        (SqliteStore::open(&url).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn test_get_missing_slot() {
        let (store, _dir) = test_store().await;
        assert_eq!(store.get(StorageKey::ActiveRoomId).await.unwrap(), None);
        assert_eq!(store.updated_at(StorageKey::ActiveRoomId).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites_and_remove_clears() {
        let (store, _dir) = test_store().await;

        store.set(StorageKey::ActiveRoomId, "\"R1\"").await.unwrap();
        store.set(StorageKey::ActiveRoomId, "\"R2\"").await.unwrap();
        assert_eq!(
            store.get(StorageKey::ActiveRoomId).await.unwrap().as_deref(),
            Some("\"R2\"")
        );
        assert!(store.updated_at(StorageKey::ActiveRoomId).await.unwrap().is_some());

        store.remove(StorageKey::ActiveRoomId).await.unwrap();
        assert_eq!(store.get(StorageKey::ActiveRoomId).await.unwrap(), None);

        // Removing an empty slot is a no-op.
        store.remove(StorageKey::ActiveRoomId).await.unwrap();
    }

    #[tokio::test]
    async fn test_slots_are_independent() {
        let (store, _dir) = test_store().await;

        save_json(&store, StorageKey::ActiveProfile, &UserProfile::new("Alice", None)).await;
        save_json(&store, StorageKey::MessageHistory, &vec![Message::chat("p-1", "Alice", "hi", 1)]).await;
        store.remove(StorageKey::ActiveProfile).await.unwrap();

        let history: Option<Vec<Message>> = load_json(&store, StorageKey::MessageHistory).await;
        assert_eq!(history.map(|h| h.len()), Some(1));
        let profile: Option<UserProfile> = load_json(&store, StorageKey::ActiveProfile).await;
        assert!(profile.is_none());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("persist.db").display());

        {
            let store = SqliteStore::open(&url).await.unwrap();
            store.set(StorageKey::ActiveRoomId, "\"R1\"").await.unwrap();
        }

        let store = SqliteStore::open(&url).await.unwrap();
        let room: Option<String> = load_json(&store, StorageKey::ActiveRoomId).await;
        assert_eq!(room.as_deref(), Some("R1"));
    }
}
