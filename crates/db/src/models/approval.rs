//! Approval request model and DTOs.

use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use jobportal_core::approval::{AdminActor, ApprovalStatus};
use jobportal_core::error::CoreError;
use jobportal_core::types::Timestamp;

/// A row from the `approval_requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub action_type: String,
    pub endpoint: String,
    pub method: String,
    pub target_ids: Vec<String>,
    pub payload: Value,
    pub request_hash: String,
    pub status: String,
    pub requested_by_user_id: String,
    pub requested_by_email: String,
    pub requested_by_role: String,
    pub requested_at: Timestamp,
    pub expires_at: Timestamp,
    pub note: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<Timestamp>,
    pub rejected_by: Option<String>,
    pub rejected_at: Option<Timestamp>,
    pub rejection_reason: Option<String>,
    pub executed_by: Option<String>,
    pub executed_at: Option<Timestamp>,
}

impl ApprovalRequest {
    /// Parse the stored status. The check constraint makes a parse
    /// failure a data corruption event, surfaced as a validation error.
    pub fn parsed_status(&self) -> Result<ApprovalStatus, CoreError> {
        ApprovalStatus::parse(&self.status)
    }

    /// The requesting admin as a typed actor.
    pub fn requested_by(&self) -> AdminActor {
        AdminActor {
            user_id: self.requested_by_user_id.clone(),
            email: self.requested_by_email.clone(),
            role: self.requested_by_role.clone(),
        }
    }
}

/// DTO for inserting a new approval request.
#[derive(Debug, Clone)]
pub struct CreateApprovalRequest {
    pub action_type: String,
    pub endpoint: String,
    pub method: String,
    pub target_ids: Vec<String>,
    pub payload: Value,
    pub request_hash: String,
    pub requested_by: AdminActor,
    pub expires_at: Timestamp,
    pub note: Option<String>,
}
