//! TTL-capable key-value storage for the session registry.
//!
//! [`TtlStore`] is the single seam: the shared tier is Postgres
//! ([`PgTtlStore`], rows past `expires_at` are invisible to readers),
//! the optional local tier is a bounded in-memory map
//! ([`MemoryTtlStore`]), and [`TieredStore`] composes the two. Callers
//! on trust-critical paths treat a store error as "absent" (fail
//! closed); the fallback tier only ever widens availability for reads.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;

use jobportal_core::types::Timestamp;

/// Infrastructure failure of a key-value tier.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("Key-value store error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A key-value store whose entries expire after a per-write TTL.
#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Fetch a live value. Expired entries are absent.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Write a value with a TTL in seconds (TTL must be positive; the
    /// caller computes it and deletes instead when it would be zero).
    async fn put(&self, key: &str, value: &str, ttl_secs: i64) -> Result<(), KvError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), KvError>;
}

// ---------------------------------------------------------------------------
// Shared tier: Postgres
// ---------------------------------------------------------------------------

/// Shared TTL tier backed by the `kv_entries` table.
#[derive(Clone)]
pub struct PgTtlStore {
    pool: PgPool,
}

impl PgTtlStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Physically remove expired rows. Readers never see them either
    /// way; this just reclaims space. Returns the count deleted.
    pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE expires_at < NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TtlStore for PgTtlStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let value: Option<(String,)> =
            sqlx::query_as("SELECT value FROM kv_entries WHERE key = $1 AND expires_at > NOW()")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.map(|(v,)| v))
    }

    async fn put(&self, key: &str, value: &str, ttl_secs: i64) -> Result<(), KvError> {
        let expires_at = Utc::now() + Duration::seconds(ttl_secs);
        sqlx::query(
            "INSERT INTO kv_entries (key, value, expires_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (key)
             DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at,
                           updated_at = NOW()",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        sqlx::query("DELETE FROM kv_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Local tier: bounded in-memory map
// ---------------------------------------------------------------------------

/// Bounded, TTL-aware in-memory tier. Also used directly in tests.
pub struct MemoryTtlStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    max_entries: usize,
}

struct MemoryEntry {
    value: String,
    expires_at: Timestamp,
}

impl MemoryTtlStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
        }
    }

    /// Current number of live entries (expired ones may still be counted
    /// until the next access touches them).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl TtlStore for MemoryTtlStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Utc::now() => {
                    return Ok(Some(entry.value.clone()))
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired: drop it under the write lock.
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn put(&self, key: &str, value: &str, ttl_secs: i64) -> Result<(), KvError> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;

        // Bounded: drop expired entries first, then evict the entry
        // closest to expiry if still at capacity.
        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            entries.retain(|_, e| e.expires_at > now);
            if entries.len() >= self.max_entries {
                if let Some(evict) = entries
                    .iter()
                    .min_by_key(|(_, e)| e.expires_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&evict);
                }
            }
        }

        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: now + Duration::seconds(ttl_secs),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// A primary shared tier with an optional local read fallback.
///
/// Writes go to both tiers (the local write is best-effort); reads hit
/// the primary and fall back only when the primary errors, so a local
/// stale value can never shadow a shared deletion.
pub struct TieredStore {
    primary: Arc<dyn TtlStore>,
    fallback: Option<Arc<dyn TtlStore>>,
}

impl TieredStore {
    pub fn new(primary: Arc<dyn TtlStore>, fallback: Option<Arc<dyn TtlStore>>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl TtlStore for TieredStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        match self.primary.get(key).await {
            Ok(value) => Ok(value),
            Err(err) => match &self.fallback {
                Some(fallback) => {
                    tracing::warn!(error = %err, key, "Primary KV tier unavailable, serving from local tier");
                    fallback.get(key).await
                }
                None => Err(err),
            },
        }
    }

    async fn put(&self, key: &str, value: &str, ttl_secs: i64) -> Result<(), KvError> {
        if let Some(fallback) = &self.fallback {
            if let Err(err) = fallback.put(key, value, ttl_secs).await {
                tracing::warn!(error = %err, key, "Local KV tier write failed");
            }
        }
        self.primary.put(key, value, ttl_secs).await
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        if let Some(fallback) = &self.fallback {
            if let Err(err) = fallback.delete(key).await {
                tracing::warn!(error = %err, key, "Local KV tier delete failed");
            }
        }
        self.primary.delete(key).await
    }
}
