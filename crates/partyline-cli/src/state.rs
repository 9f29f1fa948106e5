//! Application state shared by the CLI commands.
//!
//! `AppState` holds the resolved data directory, the client configuration,
//! and the persistence store (SQLite, or memory for `--ephemeral` runs).

use std::path::PathBuf;
use std::sync::Arc;

use partyline_core::storage::{MemoryStore, PersistenceStore, StorageKey};
use partyline_infra::config::{database_url, load_client_config, resolve_data_dir};
use partyline_infra::sqlite::SqliteStore;
use partyline_types::config::ClientConfig;
use partyline_types::error::PersistenceError;

/// The concrete store selected at startup.
pub enum ClientStore {
    Sqlite(SqliteStore),
    Memory(MemoryStore),
}

impl PersistenceStore for ClientStore {
    async fn get(&self, key: StorageKey) -> Result<Option<String>, PersistenceError> {
        match self {
            Self::Sqlite(store) => store.get(key).await,
            Self::Memory(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: StorageKey, value: &str) -> Result<(), PersistenceError> {
        match self {
            Self::Sqlite(store) => store.set(key, value).await,
            Self::Memory(store) => store.set(key, value).await,
        }
    }

    async fn remove(&self, key: StorageKey) -> Result<(), PersistenceError> {
        match self {
            Self::Sqlite(store) => store.remove(key).await,
            Self::Memory(store) => store.remove(key).await,
        }
    }
}

pub struct AppState {
    pub data_dir: PathBuf,
    pub config: ClientConfig,
    pub store: Arc<ClientStore>,
}

impl AppState {
    /// Resolve the data dir, load config, and open the store.
    pub async fn init(ephemeral: bool, server_url: Option<String>) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let mut config = load_client_config(&data_dir).await;
        if let Some(url) = server_url {
            config.server_url = url;
        }

        let store = if ephemeral {
            tracing::debug!("using in-memory client store");
            ClientStore::Memory(MemoryStore::new())
        } else {
            tokio::fs::create_dir_all(&data_dir).await?;
            ClientStore::Sqlite(SqliteStore::open(&database_url(&data_dir)).await?)
        };

        Ok(Self {
            data_dir,
            config,
            store: Arc::new(store),
        })
    }
}
