//! Identity persistence with a fixed time-to-live.
//!
//! Mirrors the browser client's cookies: each value is written with a 24 hour
//! expiry and silently disappears afterwards. Records go through the
//! `StorageProvider` port as `{"value": ..., "expires_at": <unix secs>}`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ports::outbound::{storage_keys, StorageProvider, TimeProvider};
use crate::state::Identity;

/// Lifetime of every persisted identity value.
pub const IDENTITY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Serialize, Deserialize)]
struct StoredValue {
    value: String,
    expires_at: u64,
}

/// Durable store for the game and player ids.
#[derive(Clone)]
pub struct IdentityStore {
    storage: Arc<dyn StorageProvider>,
    time: Arc<dyn TimeProvider>,
}

impl IdentityStore {
    pub fn new(storage: Arc<dyn StorageProvider>, time: Arc<dyn TimeProvider>) -> Self {
        Self { storage, time }
    }

    /// Write `value` under `key`, expiring [`IDENTITY_TTL`] from now.
    pub fn save(&self, key: &str, value: &str) {
        let record = StoredValue {
            value: value.to_string(),
            expires_at: self
                .time
                .now_unix_secs()
                .saturating_add(IDENTITY_TTL.as_secs()),
        };

        match serde_json::to_string(&record) {
            Ok(encoded) => self.storage.save(key, &encoded),
            Err(e) => tracing::error!(key, "Failed to encode identity record: {}", e),
        }
    }

    /// The live value under `key`, or `None` if missing, expired or unreadable.
    pub fn load(&self, key: &str) -> Option<String> {
        let raw = self.storage.load(key)?;

        let record = match serde_json::from_str::<StoredValue>(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(key, "Discarding unreadable identity record: {}", e);
                self.storage.remove(key);
                return None;
            }
        };

        if record.expires_at <= self.time.now_unix_secs() {
            tracing::debug!(key, "Identity record expired");
            self.storage.remove(key);
            return None;
        }

        Some(record.value)
    }

    pub fn load_identity(&self) -> Identity {
        Identity {
            game_id: self.load(storage_keys::GAME_ID),
            player_id: self.load(storage_keys::PLAYER_ID),
        }
    }

    pub fn save_game_id(&self, game_id: &str) {
        self.save(storage_keys::GAME_ID, game_id);
    }

    pub fn save_player_id(&self, player_id: &str) {
        self.save(storage_keys::PLAYER_ID, player_id);
    }

    /// Forget both ids, so the next connection starts fresh.
    pub fn clear(&self) {
        self.storage.remove(storage_keys::GAME_ID);
        self.storage.remove(storage_keys::PLAYER_ID);
    }
}

impl std::fmt::Debug for IdentityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityStore").finish_non_exhaustive()
    }
}
