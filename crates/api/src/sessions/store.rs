//! Session persistence over the TTL key-value tier.
//!
//! Each session is one JSON value under `session:{id}`. Two index lists
//! (one global, one per user) allow enumeration without scanning the
//! store. Indexes are only eventually consistent with record existence:
//! a read that encounters a dangling id prunes it (self-healing) rather
//! than relying on transactional agreement.

use std::sync::Arc;

use jobportal_core::session::{SessionRecord, SessionTimeouts};
use jobportal_db::kv::{KvError, TtlStore};

use jobportal_core::types::Timestamp;

/// Key of the global session index.
const GLOBAL_INDEX_KEY: &str = "sessions:index";

/// CRUD over session records and their indexes.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn TtlStore>,
    timeouts: SessionTimeouts,
    /// TTL applied to index lists on every rewrite. Set to the absolute
    /// session timeout: no member can outlive its index.
    index_ttl_secs: i64,
}

impl SessionStore {
    pub fn new(store: Arc<dyn TtlStore>, timeouts: SessionTimeouts) -> Self {
        let index_ttl_secs = std::cmp::max(1, timeouts.absolute.num_seconds());
        Self {
            store,
            timeouts,
            index_ttl_secs,
        }
    }

    pub fn session_key(id: &str) -> String {
        format!("session:{id}")
    }

    pub fn global_index_key() -> String {
        GLOBAL_INDEX_KEY.to_string()
    }

    pub fn user_index_key(user_id: &str) -> String {
        format!("sessions:user:{user_id}")
    }

    /// Write a record with a freshly computed TTL. Returns `false` when
    /// the record's deadline has already passed, in which case it is
    /// deleted instead of written and the caller must drop its index
    /// entries.
    pub async fn put(&self, record: &SessionRecord, now: Timestamp) -> Result<bool, KvError> {
        let key = Self::session_key(&record.id);
        match record.ttl_seconds(&self.timeouts, now) {
            Some(ttl) => {
                let value = match serde_json::to_string(record) {
                    Ok(value) => value,
                    Err(err) => {
                        tracing::error!(error = %err, session_id = %record.id, "Failed to serialize session");
                        return Ok(false);
                    }
                };
                self.store.put(&key, &value, ttl).await?;
                Ok(true)
            }
            None => {
                self.store.delete(&key).await?;
                Ok(false)
            }
        }
    }

    /// Fetch a record. Missing and malformed values are both absence;
    /// malformed values are deleted so they cannot wedge the registry.
    pub async fn get(&self, id: &str) -> Result<Option<SessionRecord>, KvError> {
        let key = Self::session_key(id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                tracing::warn!(error = %err, session_id = id, "Dropping malformed session record");
                self.store.delete(&key).await?;
                Ok(None)
            }
        }
    }

    /// Remove a record without touching indexes.
    pub async fn delete(&self, id: &str) -> Result<(), KvError> {
        self.store.delete(&Self::session_key(id)).await
    }

    /// Add an id to an index list, deduplicating on write.
    pub async fn add_to_index(&self, index_key: &str, id: &str) -> Result<(), KvError> {
        let mut ids = self.read_index(index_key).await?;
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
        self.write_index(index_key, &ids).await
    }

    /// Remove an id from an index list. Idempotent; deletes the index
    /// key outright when the list empties.
    pub async fn remove_from_index(&self, index_key: &str, id: &str) -> Result<(), KvError> {
        let mut ids = self.read_index(index_key).await?;
        let before = ids.len();
        ids.retain(|existing| existing != id);
        if ids.len() != before || ids.is_empty() {
            self.write_index(index_key, &ids).await?;
        }
        Ok(())
    }

    /// Enumerate the live records behind an index: dangling ids are
    /// pruned from the index, survivors are sorted by `last_seen`
    /// descending.
    pub async fn list_from_index(&self, index_key: &str) -> Result<Vec<SessionRecord>, KvError> {
        let ids = self.read_index(index_key).await?;
        let mut records = Vec::with_capacity(ids.len());
        let mut live_ids = Vec::with_capacity(ids.len());

        for id in &ids {
            match self.get(id).await? {
                Some(record) => {
                    live_ids.push(id.clone());
                    records.push(record);
                }
                None => {
                    tracing::debug!(session_id = %id, index_key, "Pruning dangling session id from index");
                }
            }
        }

        if live_ids.len() != ids.len() {
            self.write_index(index_key, &live_ids).await?;
        }

        records.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        Ok(records)
    }

    async fn read_index(&self, index_key: &str) -> Result<Vec<String>, KvError> {
        let Some(raw) = self.store.get(index_key).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => Ok(ids),
            Err(err) => {
                tracing::warn!(error = %err, index_key, "Resetting malformed session index");
                Ok(Vec::new())
            }
        }
    }

    async fn write_index(&self, index_key: &str, ids: &[String]) -> Result<(), KvError> {
        if ids.is_empty() {
            // No empty-list artifacts.
            return self.store.delete(index_key).await;
        }
        let value = match serde_json::to_string(ids) {
            Ok(value) => value,
            Err(_) => return Ok(()),
        };
        self.store.put(index_key, &value, self.index_ttl_secs).await
    }
}
