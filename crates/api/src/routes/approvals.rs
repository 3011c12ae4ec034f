//! Route definitions for the dual-control approval workflow.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::approvals;
use crate::state::AppState;

/// Approval routes, mounted at `/approvals`.
///
/// ```text
/// POST   /                            create_approval
/// GET    /                            list_approvals
/// GET    /{id}                        get_approval
/// POST   /{id}/approve                approve_approval
/// POST   /{id}/reject                 reject_approval
/// POST   /{id}/validate-execution     validate_execution
/// POST   /{id}/execute                mark_executed
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(approvals::create_approval).get(approvals::list_approvals),
        )
        .route("/{id}", get(approvals::get_approval))
        .route("/{id}/approve", post(approvals::approve_approval))
        .route("/{id}/reject", post(approvals::reject_approval))
        .route(
            "/{id}/validate-execution",
            post(approvals::validate_execution),
        )
        .route("/{id}/execute", post(approvals::mark_executed))
}
