//! Handlers for the `/approvals` resource.
//!
//! Every endpoint requires a live session. The workflow rules
//! (separation of duties, status transitions, hash binding) live in
//! [`crate::approvals::ApprovalService`]; handlers only shape requests
//! and responses.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobportal_core::approval::{ApprovalAction, ApprovalStatus};
use jobportal_db::models::approval::ApprovalRequest;

use crate::approvals::service::CreateRequestInput;
use crate::error::{AppError, AppResult};
use crate::middleware::session::SessionAuth;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /approvals`. The action payload is flattened
/// alongside the `actionType` discriminant.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApprovalBody {
    #[serde(flatten)]
    pub action: ApprovalAction,
    pub endpoint: String,
    pub method: String,
    pub target_ids: Vec<String>,
    pub note: Option<String>,
}

/// Query parameters for `GET /approvals`.
#[derive(Debug, Deserialize)]
pub struct ListApprovalsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

/// Request body for `POST /approvals/{id}/approve`.
#[derive(Debug, Default, Deserialize)]
pub struct ApproveBody {
    pub note: Option<String>,
}

/// Request body for `POST /approvals/{id}/reject`.
#[derive(Debug, Default, Deserialize)]
pub struct RejectBody {
    pub reason: Option<String>,
}

/// Request body for `POST /approvals/{id}/validate-execution`: the
/// action as it is about to run, re-described by the executing worker.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateExecutionBody {
    #[serde(flatten)]
    pub action: ApprovalAction,
    pub endpoint: String,
    pub method: String,
    pub target_ids: Vec<String>,
}

/// Response for `POST /approvals/{id}/execute`.
#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    /// False when the request had already been marked executed.
    pub executed: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/approvals
///
/// Create a pending approval request for a high-risk action.
pub async fn create_approval(
    State(state): State<AppState>,
    auth: SessionAuth,
    Json(body): Json<CreateApprovalBody>,
) -> AppResult<(StatusCode, Json<DataResponse<ApprovalRequest>>)> {
    let created = state
        .approvals
        .create_request(
            CreateRequestInput {
                action: body.action,
                endpoint: body.endpoint,
                method: body.method,
                target_ids: body.target_ids,
                note: body.note,
            },
            auth.actor(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: created })))
}

/// GET /api/v1/approvals
///
/// List approval requests, newest first, optionally filtered by status.
pub async fn list_approvals(
    State(state): State<AppState>,
    _auth: SessionAuth,
    Query(query): Query<ListApprovalsQuery>,
) -> AppResult<Json<DataResponse<Vec<ApprovalRequest>>>> {
    let status = query
        .status
        .as_deref()
        .map(ApprovalStatus::parse)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let limit = query.limit.unwrap_or(100).clamp(1, 500);

    let requests = state.approvals.list_requests(status, limit).await?;
    Ok(Json(DataResponse { data: requests }))
}

/// GET /api/v1/approvals/{id}
pub async fn get_approval(
    State(state): State<AppState>,
    _auth: SessionAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<ApprovalRequest>>> {
    let request = state.approvals.get_request(id).await?;
    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/approvals/{id}/approve
///
/// Approve a pending request. The approver must be a different admin
/// than the requester.
pub async fn approve_approval(
    State(state): State<AppState>,
    auth: SessionAuth,
    Path(id): Path<Uuid>,
    body: Option<Json<ApproveBody>>,
) -> AppResult<Json<DataResponse<ApprovalRequest>>> {
    let note = body.and_then(|Json(b)| b.note);
    let request = state.approvals.approve(id, &auth.actor(), note).await?;
    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/approvals/{id}/reject
///
/// Reject a pending or approved request.
pub async fn reject_approval(
    State(state): State<AppState>,
    auth: SessionAuth,
    Path(id): Path<Uuid>,
    body: Option<Json<RejectBody>>,
) -> AppResult<Json<DataResponse<ApprovalRequest>>> {
    let reason = body.and_then(|Json(b)| b.reason);
    let request = state.approvals.reject(id, &auth.actor(), reason).await?;
    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/approvals/{id}/validate-execution
///
/// Execution-time gate: confirms the request is approved and that the
/// action about to run hashes to exactly what was approved.
pub async fn validate_execution(
    State(state): State<AppState>,
    _auth: SessionAuth,
    Path(id): Path<Uuid>,
    Json(body): Json<ValidateExecutionBody>,
) -> AppResult<Json<DataResponse<ApprovalRequest>>> {
    let request = state
        .approvals
        .validate_for_execution(id, &body.action, &body.endpoint, &body.method, &body.target_ids)
        .await?;
    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/approvals/{id}/execute
///
/// Record that the approved action ran. Safe to retry; a repeat call
/// reports `executed: false`.
pub async fn mark_executed(
    State(state): State<AppState>,
    auth: SessionAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<ExecuteResponse>>> {
    let executed = state.approvals.mark_executed(id, &auth.actor()).await?;
    Ok(Json(DataResponse {
        data: ExecuteResponse { executed },
    }))
}
