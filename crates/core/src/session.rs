//! Session record and the expiry clocks that govern it.
//!
//! A session is valid only while all of its clocks agree: the idle clock
//! (reset by activity), the absolute clock (fixed at creation), and an
//! optional hard ceiling (e.g. from a step-up grant). Everything here is
//! a pure function of a supplied `now` so the rules are testable without
//! sleeping.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;
use crate::user_agent::DeviceInfo;

/// Maximum number of distinct recent actions kept per session.
pub const MAX_ACTION_HISTORY: usize = 5;

/// An ephemeral admin session, stored as JSON in the TTL key-value tier.
///
/// Field names are camelCase on the wire for compatibility with records
/// written by earlier deployments of the portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub device: String,
    pub browser: String,
    pub os: String,
    pub created_at: Timestamp,
    pub last_seen: Timestamp,
    /// Optional hard ceiling, independent of activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    /// Most-recent distinct action paths, newest first.
    #[serde(default)]
    pub actions: Vec<String>,
}

/// The two configurable expiry clocks.
#[derive(Debug, Clone, Copy)]
pub struct SessionTimeouts {
    /// Invalidates the session after this much inactivity.
    pub idle: Duration,
    /// Invalidates the session this long after creation, regardless of activity.
    pub absolute: Duration,
}

/// Why a session failed validation. The wire codes are part of the
/// route-layer contract (401 bodies carry them verbatim).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInvalidReason {
    NotFound,
    Expired,
    IdleTimeout,
    AbsoluteTimeout,
}

impl SessionInvalidReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "session_not_found",
            Self::Expired => "session_expired",
            Self::IdleTimeout => "session_idle_timeout",
            Self::AbsoluteTimeout => "session_absolute_timeout",
        }
    }
}

impl std::fmt::Display for SessionInvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SessionRecord {
    /// The instant at which this record stops being valid: the earliest
    /// of the idle deadline, the absolute deadline, and the hard ceiling.
    pub fn deadline(&self, timeouts: &SessionTimeouts) -> Timestamp {
        let mut deadline = (self.last_seen + timeouts.idle).min(self.created_at + timeouts.absolute);
        if let Some(ceiling) = self.expires_at {
            deadline = deadline.min(ceiling);
        }
        deadline
    }

    /// Check all three clocks against `now`.
    pub fn validity(
        &self,
        timeouts: &SessionTimeouts,
        now: Timestamp,
    ) -> Result<(), SessionInvalidReason> {
        if let Some(ceiling) = self.expires_at {
            if now >= ceiling {
                return Err(SessionInvalidReason::Expired);
            }
        }
        if now >= self.created_at + timeouts.absolute {
            return Err(SessionInvalidReason::AbsoluteTimeout);
        }
        if now >= self.last_seen + timeouts.idle {
            return Err(SessionInvalidReason::IdleTimeout);
        }
        Ok(())
    }

    /// Remaining store TTL in whole seconds: `max(1, ceil(deadline − now))`,
    /// or `None` once the deadline has passed (the caller must delete the
    /// record instead of writing it).
    pub fn ttl_seconds(&self, timeouts: &SessionTimeouts, now: Timestamp) -> Option<i64> {
        let remaining = self.deadline(timeouts) - now;
        let millis = remaining.num_milliseconds();
        if millis <= 0 {
            return None;
        }
        Some(std::cmp::max(1, (millis as u64).div_ceil(1000) as i64))
    }

    /// Record an action in the bounded history: the path is normalized
    /// (query string stripped), any prior occurrence removed, and the
    /// result prepended, keeping at most [`MAX_ACTION_HISTORY`] entries.
    pub fn record_action(&mut self, path: &str) {
        let normalized = normalize_action(path);
        if normalized.is_empty() {
            return;
        }
        self.actions.retain(|a| a != &normalized);
        self.actions.insert(0, normalized);
        self.actions.truncate(MAX_ACTION_HISTORY);
    }

    /// Whether this session was established from the same client tuple.
    /// Used for new-device detection on login.
    pub fn matches_client(&self, ip: Option<&str>, info: &DeviceInfo) -> bool {
        self.ip.as_deref() == ip
            && self.device == info.device
            && self.browser == info.browser
            && self.os == info.os
    }
}

fn normalize_action(path: &str) -> String {
    let path = path.split('?').next().unwrap_or(path);
    path.trim().to_string()
}
