//! Memory of the last successful create or join.
//!
//! The supervisor records the room and profile every time the user enters a
//! room and asks the registrar what to rejoin after a reconnect. When the
//! in-memory record is gone (fresh process), the persisted room id and
//! profile stand in for it.

use partyline_types::message::UserProfile;
use partyline_types::session::SessionRecord;

use crate::storage::{PersistenceStore, StorageKey, load_json};

#[derive(Debug, Default)]
pub struct SessionRegistrar {
    current: Option<SessionRecord>,
}

impl SessionRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the parameters of a successful create or join.
    pub fn record(&mut self, record: SessionRecord) {
        tracing::debug!(room_id = %record.room_id, nickname = %record.nickname, "session recorded");
        self.current = Some(record);
    }

    /// Forget the current session (explicit leave or teardown).
    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&SessionRecord> {
        self.current.as_ref()
    }

    /// What to rejoin after a reconnect, if anything.
    ///
    /// The in-memory record wins. Otherwise both the persisted room id and
    /// the persisted profile must be present and usable.
    pub async fn rejoin_if_known<S: PersistenceStore>(&self, store: &S) -> Option<SessionRecord> {
        if let Some(record) = &self.current {
            return Some(record.clone());
        }

        let room_id: String = load_json(store, StorageKey::ActiveRoomId).await?;
        if room_id.is_empty() {
            return None;
        }
        let profile: UserProfile = load_json(store, StorageKey::ActiveProfile).await?;
        if profile.nickname.is_empty() {
            tracing::debug!(%room_id, "persisted room has no usable profile, not rejoining");
            return None;
        }

        Some(SessionRecord {
            room_id,
            nickname: profile.nickname,
            user_icon: profile.user_icon,
        })
    }
}
