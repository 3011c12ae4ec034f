//! Integration tests for the dual-control approval workflow endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, get_authed, login, post_json_authed};
use serde_json::json;
use sqlx::PgPool;

/// Create a pending bulk-publish request for two announcements and
/// return its id.
async fn create_publish_request(app: axum::Router, session: &str) -> String {
    let response = post_json_authed(
        app,
        "/api/v1/approvals",
        session,
        json!({
            "actionType": "announcement_bulk_publish",
            "notify_subscribers": true,
            "endpoint": "/admin/announcements/bulk-publish",
            "method": "post",
            "targetIds": ["ann-1", "ann-2"],
            "note": "publishing this week's vacancies"
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    body["data"]["id"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Test: creation stores a pending request bound by a content hash
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_approval_returns_pending_request(pool: PgPool) {
    let app = common::build_test_app(pool);
    let session = login(app.clone(), "admin-1", "alice@example.gov").await;

    let response = post_json_authed(
        app,
        "/api/v1/approvals",
        &session,
        json!({
            "actionType": "announcement_bulk_delete",
            "hard_delete": false,
            "endpoint": "/admin/announcements/bulk-delete",
            "method": "POST",
            "targetIds": ["ann-9"]
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let request = &body["data"];

    assert_eq!(request["status"], "pending");
    assert_eq!(request["action_type"], "announcement_bulk_delete");
    assert_eq!(request["method"], "POST");
    assert_eq!(request["requested_by_user_id"], "admin-1");
    assert_eq!(request["payload"]["hard_delete"], false);

    let hash = request["request_hash"].as_str().unwrap();
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_approval_requires_targets(pool: PgPool) {
    let app = common::build_test_app(pool);
    let session = login(app.clone(), "admin-1", "alice@example.gov").await;

    let response = post_json_authed(
        app,
        "/api/v1/approvals",
        &session,
        json!({
            "actionType": "announcement_bulk_publish",
            "endpoint": "/admin/announcements/bulk-publish",
            "method": "POST",
            "targetIds": []
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_approval_rejects_unknown_action_type(pool: PgPool) {
    let app = common::build_test_app(pool);
    let session = login(app.clone(), "admin-1", "alice@example.gov").await;

    let response = post_json_authed(
        app,
        "/api/v1/approvals",
        &session,
        json!({
            "actionType": "drop_all_tables",
            "endpoint": "/admin/announcements",
            "method": "POST",
            "targetIds": ["ann-1"]
        }),
    )
    .await;

    // The typed action payload refuses unknown discriminants at the
    // deserialization boundary.
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ---------------------------------------------------------------------------
// Test: separation of duties
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn requester_cannot_approve_own_request(pool: PgPool) {
    let app = common::build_test_app(pool);
    let alice = login(app.clone(), "admin-1", "alice@example.gov").await;

    let id = create_publish_request(app.clone(), &alice).await;

    let response = post_json_authed(
        app,
        &format!("/api/v1/approvals/{id}/approve"),
        &alice,
        json!({}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["code"], "self_approval_forbidden");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn second_admin_can_approve(pool: PgPool) {
    let app = common::build_test_app(pool);
    let alice = login(app.clone(), "admin-1", "alice@example.gov").await;
    let bob = login(app.clone(), "admin-2", "bob@example.gov").await;

    let id = create_publish_request(app.clone(), &alice).await;

    let response = post_json_authed(
        app.clone(),
        &format!("/api/v1/approvals/{id}/approve"),
        &bob,
        json!({ "note": "looks good" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "approved");
    assert_eq!(body["data"]["approved_by"], "admin-2");

    // A second approval attempt conflicts with the current status.
    let response = post_json_authed(
        app,
        &format!("/api/v1/approvals/{id}/approve"),
        &bob,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "invalid_status:approved");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn self_approval_is_refused_regardless_of_status(pool: PgPool) {
    let app = common::build_test_app(pool);
    let alice = login(app.clone(), "admin-1", "alice@example.gov").await;
    let bob = login(app.clone(), "admin-2", "bob@example.gov").await;

    let id = create_publish_request(app.clone(), &alice).await;

    let response = post_json_authed(
        app.clone(),
        &format!("/api/v1/approvals/{id}/approve"),
        &bob,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The requester is still refused on an already-approved request:
    // separation of duties outranks the status conflict.
    let response = post_json_authed(
        app,
        &format!("/api/v1/approvals/{id}/approve"),
        &alice,
        json!({}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["code"], "self_approval_forbidden");
}

// ---------------------------------------------------------------------------
// Test: rejection from pending and approved, with a default reason
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn approved_request_can_still_be_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let alice = login(app.clone(), "admin-1", "alice@example.gov").await;
    let bob = login(app.clone(), "admin-2", "bob@example.gov").await;

    let id = create_publish_request(app.clone(), &alice).await;

    let response = post_json_authed(
        app.clone(),
        &format!("/api/v1/approvals/{id}/approve"),
        &bob,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json_authed(
        app,
        &format!("/api/v1/approvals/{id}/reject"),
        &bob,
        json!({}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "rejected");
    assert_eq!(body["data"]["rejection_reason"], "Rejected by approver");
}

// ---------------------------------------------------------------------------
// Test: execution-time validation recomputes the content hash
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn validate_execution_accepts_reordered_targets(pool: PgPool) {
    let app = common::build_test_app(pool);
    let alice = login(app.clone(), "admin-1", "alice@example.gov").await;
    let bob = login(app.clone(), "admin-2", "bob@example.gov").await;

    let id = create_publish_request(app.clone(), &alice).await;
    post_json_authed(
        app.clone(),
        &format!("/api/v1/approvals/{id}/approve"),
        &bob,
        json!({}),
    )
    .await;

    // Same action with the targets in a different order: the hash is
    // order-insensitive, so this is the approved action.
    let response = post_json_authed(
        app,
        &format!("/api/v1/approvals/{id}/validate-execution"),
        &alice,
        json!({
            "actionType": "announcement_bulk_publish",
            "notify_subscribers": true,
            "endpoint": "/admin/announcements/bulk-publish",
            "method": "POST",
            "targetIds": ["ann-2", "ann-1"]
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn validate_execution_rejects_widened_target_set(pool: PgPool) {
    let app = common::build_test_app(pool);
    let alice = login(app.clone(), "admin-1", "alice@example.gov").await;
    let bob = login(app.clone(), "admin-2", "bob@example.gov").await;

    let id = create_publish_request(app.clone(), &alice).await;
    post_json_authed(
        app.clone(),
        &format!("/api/v1/approvals/{id}/approve"),
        &bob,
        json!({}),
    )
    .await;

    // One extra target: approval for two announcements must never
    // authorize publishing three.
    let response = post_json_authed(
        app,
        &format!("/api/v1/approvals/{id}/validate-execution"),
        &alice,
        json!({
            "actionType": "announcement_bulk_publish",
            "notify_subscribers": true,
            "endpoint": "/admin/announcements/bulk-publish",
            "method": "POST",
            "targetIds": ["ann-1", "ann-2", "ann-3"]
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "request_mismatch");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn validate_execution_requires_approved_status(pool: PgPool) {
    let app = common::build_test_app(pool);
    let alice = login(app.clone(), "admin-1", "alice@example.gov").await;

    let id = create_publish_request(app.clone(), &alice).await;

    let response = post_json_authed(
        app,
        &format!("/api/v1/approvals/{id}/validate-execution"),
        &alice,
        json!({
            "actionType": "announcement_bulk_publish",
            "notify_subscribers": true,
            "endpoint": "/admin/announcements/bulk-publish",
            "method": "POST",
            "targetIds": ["ann-1", "ann-2"]
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "invalid_status:pending");
}

// ---------------------------------------------------------------------------
// Test: recording execution is idempotent
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn marking_executed_twice_reports_false(pool: PgPool) {
    let app = common::build_test_app(pool);
    let alice = login(app.clone(), "admin-1", "alice@example.gov").await;
    let bob = login(app.clone(), "admin-2", "bob@example.gov").await;

    let id = create_publish_request(app.clone(), &alice).await;
    post_json_authed(
        app.clone(),
        &format!("/api/v1/approvals/{id}/approve"),
        &bob,
        json!({}),
    )
    .await;

    let response = post_json_authed(
        app.clone(),
        &format!("/api/v1/approvals/{id}/execute"),
        &alice,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["executed"], true);

    // A retried execution report is harmless.
    let response = post_json_authed(
        app,
        &format!("/api/v1/approvals/{id}/execute"),
        &alice,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["executed"], false);
}

// ---------------------------------------------------------------------------
// Test: listing and filtering
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_filters_by_status(pool: PgPool) {
    let app = common::build_test_app(pool);
    let alice = login(app.clone(), "admin-1", "alice@example.gov").await;
    let bob = login(app.clone(), "admin-2", "bob@example.gov").await;

    let first = create_publish_request(app.clone(), &alice).await;
    let _second = create_publish_request(app.clone(), &alice).await;

    post_json_authed(
        app.clone(),
        &format!("/api/v1/approvals/{first}/approve"),
        &bob,
        json!({}),
    )
    .await;

    let response = get_authed(app.clone(), "/api/v1/approvals?status=pending", &alice).await;
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let response = get_authed(app.clone(), "/api/v1/approvals?status=approved", &alice).await;
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["id"], first.as_str());

    let response = get_authed(app, "/api/v1/approvals?status=sideways", &alice).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_approval_id_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let alice = login(app.clone(), "admin-1", "alice@example.gov").await;

    let response = get_authed(
        app,
        "/api/v1/approvals/018f0000-0000-7000-8000-000000000000",
        &alice,
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["code"], "not_found");
}
