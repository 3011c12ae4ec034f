//! Approval workflow: request creation, approve/reject, execution-time
//! validation, and the expiry/retention sweeps.
//!
//! All mutual exclusion is expressed as conditional updates in the
//! repository; the service adds the dual-control rules on top
//! (separation of duties, hash binding) and turns lost races into
//! `invalid_status` outcomes rather than errors.

use chrono::{Duration, Utc};

use jobportal_core::approval::{AdminActor, ApprovalAction, ApprovalStatus};
use jobportal_core::error::CoreError;
use jobportal_db::models::approval::{ApprovalRequest, CreateApprovalRequest};
use jobportal_db::repositories::ApprovalRepo;
use jobportal_db::DbPool;

/// Default rejection reason when none is supplied.
const DEFAULT_REJECTION_REASON: &str = "Rejected by approver";

/// Outcome of an approval workflow call.
///
/// Everything except `Database` is an expected business outcome that the
/// route layer maps to a 4xx response; only infrastructure failures
/// surface as 5xx. A database error on an execution-time check must be
/// treated by the caller exactly like a refusal (fail closed).
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("Approval request not found")]
    NotFound,

    #[error("Approval request is {0}")]
    InvalidStatus(String),

    #[error("The requester of an action may not approve it")]
    SelfApprovalForbidden,

    #[error("Action does not match the approved request")]
    RequestMismatch,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<CoreError> for ApprovalError {
    fn from(err: CoreError) -> Self {
        ApprovalError::Validation(err.to_string())
    }
}

/// Input for [`ApprovalService::create_request`].
#[derive(Debug, Clone)]
pub struct CreateRequestInput {
    pub action: ApprovalAction,
    pub endpoint: String,
    pub method: String,
    pub target_ids: Vec<String>,
    pub note: Option<String>,
}

/// Approval workflow service.
#[derive(Clone)]
pub struct ApprovalService {
    pool: DbPool,
    expiry: Duration,
}

impl ApprovalService {
    pub fn new(pool: DbPool, expiry_minutes: i64) -> Self {
        Self {
            pool,
            expiry: Duration::minutes(expiry_minutes),
        }
    }

    /// Create a pending request bound to the exact action by its
    /// content hash.
    pub async fn create_request(
        &self,
        input: CreateRequestInput,
        requested_by: AdminActor,
    ) -> Result<ApprovalRequest, ApprovalError> {
        if input.endpoint.is_empty() {
            return Err(ApprovalError::Validation("endpoint is required".into()));
        }
        if input.method.is_empty() {
            return Err(ApprovalError::Validation("method is required".into()));
        }
        if input.target_ids.is_empty() {
            return Err(ApprovalError::Validation(
                "at least one target id is required".into(),
            ));
        }
        if input.target_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(ApprovalError::Validation(
                "target ids must be non-empty".into(),
            ));
        }

        let request_hash =
            input
                .action
                .request_hash(&input.endpoint, &input.method, &input.target_ids);

        let created = ApprovalRepo::create(
            &self.pool,
            &CreateApprovalRequest {
                action_type: input.action.action_type().to_string(),
                endpoint: input.endpoint,
                method: input.method.to_uppercase(),
                target_ids: input.target_ids,
                payload: input.action.payload(),
                request_hash,
                requested_by,
                expires_at: Utc::now() + self.expiry,
                note: input.note,
            },
        )
        .await?;

        tracing::info!(
            approval_id = %created.id,
            action_type = %created.action_type,
            targets = created.target_ids.len(),
            requested_by = %created.requested_by_user_id,
            "Approval request created"
        );
        Ok(created)
    }

    /// Fetch a request (lazily expiring it).
    pub async fn get_request(&self, id: uuid::Uuid) -> Result<ApprovalRequest, ApprovalError> {
        ApprovalRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or(ApprovalError::NotFound)
    }

    /// List requests, optionally filtered by status.
    pub async fn list_requests(
        &self,
        status: Option<ApprovalStatus>,
        limit: i64,
    ) -> Result<Vec<ApprovalRequest>, ApprovalError> {
        Ok(ApprovalRepo::list(&self.pool, status.map(ApprovalStatus::as_str), limit).await?)
    }

    /// Approve a pending request. The requester can never be the
    /// approver, and a lost transition race surfaces as
    /// `invalid_status` with the status the winner left behind.
    pub async fn approve(
        &self,
        id: uuid::Uuid,
        approved_by: &AdminActor,
        note: Option<String>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let request = self.get_request(id).await?;

        // Separation of duties, checked regardless of status.
        if request.requested_by_user_id == approved_by.user_id {
            return Err(ApprovalError::SelfApprovalForbidden);
        }

        let status = request.parsed_status()?;
        if status != ApprovalStatus::Pending {
            return Err(ApprovalError::InvalidStatus(status.as_str().to_string()));
        }

        if !ApprovalRepo::approve(&self.pool, id, &approved_by.user_id, note.as_deref()).await? {
            // Lost the race; report whatever state the winner produced.
            return Err(self.current_status_conflict(id).await);
        }

        tracing::info!(approval_id = %id, approved_by = %approved_by.user_id, "Approval request approved");
        self.get_request(id).await
    }

    /// Reject a pending or approved request (an approved-but-unexecuted
    /// action can still be cancelled).
    pub async fn reject(
        &self,
        id: uuid::Uuid,
        rejected_by: &AdminActor,
        reason: Option<String>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let request = self.get_request(id).await?;

        let status = request.parsed_status()?;
        if !matches!(status, ApprovalStatus::Pending | ApprovalStatus::Approved) {
            return Err(ApprovalError::InvalidStatus(status.as_str().to_string()));
        }

        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string());

        if !ApprovalRepo::reject(&self.pool, id, &rejected_by.user_id, &reason).await? {
            return Err(self.current_status_conflict(id).await);
        }

        tracing::info!(approval_id = %id, rejected_by = %rejected_by.user_id, "Approval request rejected");
        self.get_request(id).await
    }

    /// Validate that an action about to execute matches a live approval.
    ///
    /// Recomputes the content hash from the actual action and compares
    /// it to the stored one; any divergence (different targets, payload,
    /// method, or endpoint) is `request_mismatch`. This is the core
    /// anti-tampering check: an approved "publish these three" can never
    /// authorize anything else.
    pub async fn validate_for_execution(
        &self,
        id: uuid::Uuid,
        action: &ApprovalAction,
        endpoint: &str,
        method: &str,
        target_ids: &[String],
    ) -> Result<ApprovalRequest, ApprovalError> {
        let request = self.get_request(id).await?;

        let status = request.parsed_status()?;
        if status != ApprovalStatus::Approved {
            return Err(ApprovalError::InvalidStatus(status.as_str().to_string()));
        }

        let recomputed = action.request_hash(endpoint, method, target_ids);
        if recomputed != request.request_hash {
            tracing::warn!(
                approval_id = %id,
                "Execution attempted with an action that does not match its approval"
            );
            return Err(ApprovalError::RequestMismatch);
        }

        Ok(request)
    }

    /// Mark an approved request executed. Idempotent: the second call
    /// matches zero rows and reports `false`.
    pub async fn mark_executed(
        &self,
        id: uuid::Uuid,
        executed_by: &AdminActor,
    ) -> Result<bool, ApprovalError> {
        let transitioned =
            ApprovalRepo::mark_executed(&self.pool, id, &executed_by.user_id).await?;
        if transitioned {
            tracing::info!(approval_id = %id, executed_by = %executed_by.user_id, "Approval request executed");
        }
        Ok(transitioned)
    }

    /// Expire every live request whose deadline has elapsed.
    pub async fn expire_overdue(&self) -> Result<u64, ApprovalError> {
        Ok(ApprovalRepo::expire_overdue(&self.pool).await?)
    }

    /// Run the expiry sweep, then delete terminal rows older than the
    /// retention window. Safe to run concurrently with itself: both
    /// statements are conditional/idempotent.
    pub async fn cleanup_old(&self, retention_days: i64) -> Result<u64, ApprovalError> {
        let expired = self.expire_overdue().await?;
        if expired > 0 {
            tracing::info!(expired, "Expired overdue approval requests");
        }

        let cutoff = Utc::now() - Duration::days(retention_days);
        Ok(ApprovalRepo::delete_terminal_before(&self.pool, cutoff).await?)
    }

    async fn current_status_conflict(&self, id: uuid::Uuid) -> ApprovalError {
        match ApprovalRepo::find_by_id(&self.pool, id).await {
            Ok(Some(request)) => ApprovalError::InvalidStatus(request.status),
            Ok(None) => ApprovalError::NotFound,
            Err(err) => ApprovalError::Database(err),
        }
    }
}
