//! Integration tests for the session registry endpoints.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, get_authed, login, post_json, post_json_authed};
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;

const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// ---------------------------------------------------------------------------
// Test: session creation returns a record with derived device labels
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_session_returns_record(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/sessions")
                .header("content-type", "application/json")
                .header("user-agent", CHROME_UA)
                .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
                .body(Body::from(
                    json!({ "user_id": "admin-1", "email": "alice@example.gov" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let session = &body["data"]["session"];

    let id = session["id"].as_str().unwrap();
    assert_eq!(id.len(), 64);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));

    assert_eq!(session["userId"], "admin-1");
    assert_eq!(session["ip"], "203.0.113.7");
    assert_eq!(session["device"], "desktop");
    assert_eq!(session["browser"], "Chrome");
    assert_eq!(session["os"], "Windows");

    // First session for this user and client tuple.
    assert_eq!(body["data"]["new_device"], true);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_session_rejects_elapsed_ceiling(pool: PgPool) {
    let app = common::build_test_app(pool);

    let stale = (chrono::Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
    let response = post_json(
        app,
        "/api/v1/sessions",
        json!({
            "user_id": "admin-1",
            "email": "alice@example.gov",
            "expires_at": stale,
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_session_requires_identity(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = post_json(
        app,
        "/api/v1/sessions",
        json!({ "user_id": "", "email": "alice@example.gov" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: authentication is required and reasons are reported
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_credential_returns_401(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = common::get(app, "/api/v1/sessions").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_session_returns_401_with_reason(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = get_authed(app, "/api/v1/sessions", &"f".repeat(64)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "session_not_found");
}

// ---------------------------------------------------------------------------
// Test: listing marks the current session and orders by activity
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_sessions_marks_current(pool: PgPool) {
    let app = common::build_test_app(pool);

    let first = login(app.clone(), "admin-1", "alice@example.gov").await;
    let second = login(app.clone(), "admin-1", "alice@example.gov").await;

    let response = get_authed(app, "/api/v1/sessions", &first).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let sessions = body["data"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);

    for session in sessions {
        let id = session["id"].as_str().unwrap();
        assert_eq!(session["is_current_session"], id == first);
        assert!(id == first || id == second);
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sessions_are_scoped_per_user(pool: PgPool) {
    let app = common::build_test_app(pool);

    let alice = login(app.clone(), "admin-1", "alice@example.gov").await;
    let _bob = login(app.clone(), "admin-2", "bob@example.gov").await;

    let response = get_authed(app, "/api/v1/sessions", &alice).await;
    let body = body_json(response).await;

    let sessions = body["data"].as_array().unwrap();
    assert_eq!(sessions.len(), 1, "alice must not see bob's sessions");
}

// ---------------------------------------------------------------------------
// Test: terminating sessions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn terminating_current_session_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let session = login(app.clone(), "admin-1", "alice@example.gov").await;

    let response = post_json_authed(
        app,
        "/api/v1/sessions/terminate",
        &session,
        json!({ "session_id": session }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn terminated_session_stops_working(pool: PgPool) {
    let app = common::build_test_app(pool);

    let keeper = login(app.clone(), "admin-1", "alice@example.gov").await;
    let victim = login(app.clone(), "admin-1", "alice@example.gov").await;

    let response = post_json_authed(
        app.clone(),
        "/api/v1/sessions/terminate",
        &keeper,
        json!({ "session_id": victim }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["removed"], 1);

    // The terminated session is gone everywhere.
    let response = get_authed(app, "/api/v1/sessions", &victim).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "session_not_found");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn cannot_terminate_another_users_session(pool: PgPool) {
    let app = common::build_test_app(pool);

    let alice = login(app.clone(), "admin-1", "alice@example.gov").await;
    let bob = login(app.clone(), "admin-2", "bob@example.gov").await;

    let response = post_json_authed(
        app.clone(),
        "/api/v1/sessions/terminate",
        &alice,
        json!({ "session_id": bob }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Bob's session is untouched.
    let response = get_authed(app, "/api/v1/sessions", &bob).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn terminate_others_keeps_only_current(pool: PgPool) {
    let app = common::build_test_app(pool);

    let current = login(app.clone(), "admin-1", "alice@example.gov").await;
    let _old1 = login(app.clone(), "admin-1", "alice@example.gov").await;
    let _old2 = login(app.clone(), "admin-1", "alice@example.gov").await;

    let response = post_json_authed(
        app.clone(),
        "/api/v1/sessions/terminate-others",
        &current,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["removed"], 2);

    let response = get_authed(app, "/api/v1/sessions", &current).await;
    let body = body_json(response).await;
    let sessions = body["data"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["id"], current.as_str());
}
