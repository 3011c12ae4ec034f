//! Approval request state machine and typed action payloads.
//!
//! High-risk admin actions (bulk publish, bulk delete, mass status
//! changes) are gated behind dual control: one admin requests, a second
//! distinct admin approves, and execution is bound to the exact approved
//! action by a content hash.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::hashing::compute_request_hash;

/// Approval request lifecycle.
///
/// ```text
/// pending -> approved -> executed
/// pending | approved -> rejected
/// pending | approved -> expired      (TTL elapsed)
/// ```
///
/// `executed`, `rejected`, and `expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
    Expired,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Executed => "executed",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "executed" => Ok(Self::Executed),
            "expired" => Ok(Self::Expired),
            other => Err(CoreError::Validation(format!(
                "Unknown approval status '{other}'"
            ))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Executed | Self::Expired)
    }

    /// Whether the state machine defines `from -> to`.
    pub fn can_transition(from: Self, to: Self) -> bool {
        matches!(
            (from, to),
            (Self::Pending, Self::Approved)
                | (Self::Approved, Self::Executed)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Rejected)
                | (Self::Pending, Self::Expired)
                | (Self::Approved, Self::Expired)
        )
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The admin identity attached to a request, approval, or execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminActor {
    pub user_id: String,
    pub email: String,
    pub role: String,
}

/// A high-risk admin action with its typed payload, tagged by action type.
///
/// Keeping payloads as closed variants (rather than an open map) means a
/// payload can never acquire stray keys whose ordering would perturb the
/// request hash, and unknown action types are rejected before anything
/// is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "actionType", rename_all = "snake_case")]
pub enum ApprovalAction {
    /// Publish a batch of announcements at once.
    AnnouncementBulkPublish {
        #[serde(default)]
        notify_subscribers: bool,
    },
    /// Soft- or hard-delete a batch of announcements.
    AnnouncementBulkDelete {
        #[serde(default)]
        hard_delete: bool,
    },
    /// Move a batch of announcements to a new status.
    AnnouncementBulkStatusChange { new_status: String },
    /// Delete a single announcement (still dual-controlled: deletions
    /// are irreversible for published government notices).
    AnnouncementDelete {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl ApprovalAction {
    /// The stored `action_type` discriminant.
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::AnnouncementBulkPublish { .. } => "announcement_bulk_publish",
            Self::AnnouncementBulkDelete { .. } => "announcement_bulk_delete",
            Self::AnnouncementBulkStatusChange { .. } => "announcement_bulk_status_change",
            Self::AnnouncementDelete { .. } => "announcement_delete",
        }
    }

    /// The payload object as stored (the tagged representation minus the
    /// `actionType` discriminant).
    pub fn payload(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.remove("actionType");
                Value::Object(map)
            }
            // Tagged struct variants always serialize to objects.
            _ => Value::Object(serde_json::Map::new()),
        }
    }

    /// Reassemble a typed action from its stored parts, rejecting
    /// unknown action types and malformed payloads.
    pub fn from_parts(action_type: &str, payload: &Value) -> Result<Self, CoreError> {
        let mut map = match payload {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            _ => {
                return Err(CoreError::Validation(
                    "Approval payload must be an object".to_string(),
                ))
            }
        };
        map.insert(
            "actionType".to_string(),
            Value::String(action_type.to_string()),
        );
        serde_json::from_value(Value::Object(map)).map_err(|e| {
            CoreError::Validation(format!("Invalid payload for action '{action_type}': {e}"))
        })
    }

    /// Content hash binding this action (with its endpoint, method, and
    /// target set) to an approval request.
    pub fn request_hash(&self, endpoint: &str, method: &str, target_ids: &[String]) -> String {
        compute_request_hash(
            self.action_type(),
            endpoint,
            method,
            target_ids,
            &self.payload(),
        )
    }
}
