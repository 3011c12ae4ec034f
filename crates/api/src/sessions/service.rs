//! Session lifecycle: creation, touch, validation, termination, and
//! new-device detection.
//!
//! The service is invoked by concurrent stateless workers sharing one
//! external store; touches may interleave (last write wins on
//! `last_seen` and the action history, which are advisory fields), while
//! expiry itself is enforced by the store TTL and re-checked on every
//! validation. Trust-critical reads fail closed: if the store cannot be
//! reached the session is treated as invalid.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;

use jobportal_core::session::{SessionInvalidReason, SessionRecord, SessionTimeouts};
use jobportal_core::user_agent;
use jobportal_db::kv::{KvError, TtlStore};

use super::store::SessionStore;

/// Caller-supplied context for session creation and implicit
/// re-creation on touch.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user_id: String,
    pub email: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    /// Optional hard ceiling (e.g. from a step-up grant).
    pub expires_at: Option<jobportal_core::types::Timestamp>,
}

/// Session lifecycle service.
#[derive(Clone)]
pub struct SessionService {
    store: SessionStore,
    timeouts: SessionTimeouts,
}

impl SessionService {
    pub fn new(store: Arc<dyn TtlStore>, timeouts: SessionTimeouts) -> Self {
        Self {
            store: SessionStore::new(store, timeouts),
            timeouts,
        }
    }

    /// Create a session on successful login or step-up. Derives the
    /// device labels, writes the record, and indexes it globally and
    /// per user. Returns `None` when the supplied expiry ceiling has
    /// already elapsed (a stale step-up grant): nothing is written and
    /// nothing is indexed.
    pub async fn create_session(
        &self,
        ctx: SessionContext,
    ) -> Result<Option<SessionRecord>, KvError> {
        let id = generate_session_id();
        let record = self.build_record(id, &ctx);

        if !self.persist_new(&record).await? {
            tracing::warn!(
                user_id = %ctx.user_id,
                "Refused to create a session whose expiry ceiling has already passed"
            );
            return Ok(None);
        }

        tracing::info!(
            session_id = %record.id,
            user_id = %record.user_id,
            device = %record.device,
            browser = %record.browser,
            "Session created"
        );
        Ok(Some(record))
    }

    /// Update a session on an authenticated request.
    ///
    /// Refreshes `last_seen`, optionally absorbs a changed client
    /// context, and records the action path. A missing record with a
    /// supplied context is re-created under the same id (defensive
    /// recovery after a store hiccup); without context the touch reports
    /// `None`. A record whose clock has already elapsed is removed and
    /// also reported as `None`.
    pub async fn touch_session(
        &self,
        id: &str,
        context: Option<&SessionContext>,
        action: Option<&str>,
    ) -> Result<Option<SessionRecord>, KvError> {
        let now = Utc::now();

        let mut record = match self.store.get(id).await? {
            Some(record) => record,
            None => match context {
                Some(ctx) => {
                    let record = self.build_record(id.to_string(), ctx);
                    if !self.persist_new(&record).await? {
                        return Ok(None);
                    }
                    tracing::info!(session_id = %id, user_id = %ctx.user_id, "Session re-created on touch");
                    return Ok(Some(record));
                }
                None => return Ok(None),
            },
        };

        record.last_seen = now;
        if let Some(ctx) = context {
            if ctx.ip.is_some() {
                record.ip = ctx.ip.clone();
            }
            if let Some(ua) = &ctx.user_agent {
                let info = user_agent::classify(ua);
                record.user_agent = Some(ua.clone());
                record.device = info.device;
                record.browser = info.browser;
                record.os = info.os;
            }
            if ctx.expires_at.is_some() {
                record.expires_at = ctx.expires_at;
            }
        }
        if let Some(path) = action {
            record.record_action(path);
        }

        if self.store.put(&record, now).await? {
            Ok(Some(record))
        } else {
            // The deadline passed between load and write: same as absent.
            self.remove_everywhere(&record.id, Some(&record.user_id))
                .await?;
            Ok(None)
        }
    }

    /// Validate a session against all three expiry clocks.
    ///
    /// Invalid sessions are garbage-collected (record and index entries)
    /// before the reason is returned. A store failure is reported as
    /// `session_not_found`: when the registry cannot be read, the
    /// session cannot be trusted.
    pub async fn validate_session(
        &self,
        id: &str,
    ) -> Result<SessionRecord, SessionInvalidReason> {
        let record = match self.store.get(id).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(SessionInvalidReason::NotFound),
            Err(err) => {
                tracing::error!(error = %err, session_id = id, "Session store unreachable, failing closed");
                return Err(SessionInvalidReason::NotFound);
            }
        };

        match record.validity(&self.timeouts, Utc::now()) {
            Ok(()) => Ok(record),
            Err(reason) => {
                tracing::info!(session_id = id, reason = %reason, "Session invalidated");
                if let Err(err) = self
                    .remove_everywhere(&record.id, Some(&record.user_id))
                    .await
                {
                    tracing::warn!(error = %err, session_id = id, "Failed to garbage-collect invalid session");
                }
                Err(reason)
            }
        }
    }

    /// Whether no live session of this user matches the exact client
    /// tuple (ip, device, browser, os). Used to flag step-up or alerting
    /// on unfamiliar logins; a store failure counts as a new device.
    pub async fn is_new_device(
        &self,
        user_id: &str,
        ip: Option<&str>,
        user_agent_str: Option<&str>,
    ) -> bool {
        let info = user_agent_str
            .map(user_agent::classify)
            .unwrap_or_default();

        match self
            .store
            .list_from_index(&SessionStore::user_index_key(user_id))
            .await
        {
            Ok(sessions) => !sessions
                .iter()
                .any(|session| session.matches_client(ip, &info)),
            Err(err) => {
                tracing::warn!(error = %err, user_id, "Device lookup failed, treating login as new device");
                true
            }
        }
    }

    /// Remove a session and its index entries. Returns whether a record
    /// actually existed.
    pub async fn terminate_session(&self, id: &str) -> Result<bool, KvError> {
        match self.store.get(id).await? {
            Some(record) => {
                self.remove_everywhere(id, Some(&record.user_id)).await?;
                tracing::info!(session_id = id, user_id = %record.user_id, "Session terminated");
                Ok(true)
            }
            None => {
                // The record may have expired while its index entries
                // lingered; clean those up anyway.
                self.remove_everywhere(id, None).await?;
                Ok(false)
            }
        }
    }

    /// Terminate every session of the user except `current_id`. The
    /// caller's own session is skipped defensively even though the route
    /// layer already rejects self-termination. Returns the count removed.
    pub async fn terminate_other_sessions(
        &self,
        user_id: &str,
        current_id: &str,
    ) -> Result<usize, KvError> {
        let sessions = self
            .store
            .list_from_index(&SessionStore::user_index_key(user_id))
            .await?;

        let mut removed = 0;
        for session in sessions {
            if session.id == current_id {
                continue;
            }
            if self.terminate_session(&session.id).await? {
                removed += 1;
            }
        }

        tracing::info!(user_id, removed, "Terminated other sessions");
        Ok(removed)
    }

    /// List the user's live sessions, newest activity first.
    pub async fn list_user_sessions(
        &self,
        user_id: &str,
    ) -> Result<Vec<SessionRecord>, KvError> {
        self.store
            .list_from_index(&SessionStore::user_index_key(user_id))
            .await
    }

    fn build_record(&self, id: String, ctx: &SessionContext) -> SessionRecord {
        let now = Utc::now();
        let info = ctx
            .user_agent
            .as_deref()
            .map(user_agent::classify)
            .unwrap_or_default();
        SessionRecord {
            id,
            user_id: ctx.user_id.clone(),
            email: ctx.email.clone(),
            ip: ctx.ip.clone(),
            user_agent: ctx.user_agent.clone(),
            device: info.device,
            browser: info.browser,
            os: info.os,
            created_at: now,
            last_seen: now,
            expires_at: ctx.expires_at,
            actions: Vec::new(),
        }
    }

    /// Write a fresh record and its index entries. A record already past
    /// its deadline is never written and never indexed; the caller must
    /// report the session as not created.
    async fn persist_new(&self, record: &SessionRecord) -> Result<bool, KvError> {
        if !self.store.put(record, Utc::now()).await? {
            return Ok(false);
        }
        self.store
            .add_to_index(&SessionStore::global_index_key(), &record.id)
            .await?;
        self.store
            .add_to_index(&SessionStore::user_index_key(&record.user_id), &record.id)
            .await?;
        Ok(true)
    }

    async fn remove_everywhere(
        &self,
        id: &str,
        user_id: Option<&str>,
    ) -> Result<(), KvError> {
        self.store.delete(id).await?;
        self.store
            .remove_from_index(&SessionStore::global_index_key(), id)
            .await?;
        if let Some(user_id) = user_id {
            self.store
                .remove_from_index(&SessionStore::user_index_key(user_id), id)
                .await?;
        }
        Ok(())
    }
}

/// Generate an opaque session id: 32 random bytes, hex-encoded.
fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes[..]);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
