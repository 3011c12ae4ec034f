use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use sqlx::PgPool;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use jobportal_api::approvals::ApprovalService;
use jobportal_api::config::{SecurityConfig, ServerConfig};
use jobportal_api::routes;
use jobportal_api::sessions::SessionService;
use jobportal_api::state::AppState;
use jobportal_db::kv::PgTtlStore;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        security: SecurityConfig {
            idle_timeout_minutes: 30,
            absolute_timeout_hours: 12,
            approval_expiry_minutes: 60,
            approval_retention_days: 90,
            cleanup_interval_secs: 1800,
            memory_store_max_entries: 10_000,
        },
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses. The session registry runs on the
/// Postgres tier only, so every test observes exactly what is stored.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();

    let sessions = SessionService::new(
        Arc::new(PgTtlStore::new(pool.clone())),
        config.security.session_timeouts(),
    );
    let approvals = ApprovalService::new(pool.clone(), config.security.approval_expiry_minutes);

    let state = AppState {
        pool,
        config: Arc::new(config),
        sessions,
        approvals,
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// Send a GET request without a session.
#[allow(dead_code)]
pub async fn get(app: Router, path: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a GET request authenticated with a session id.
#[allow(dead_code)]
pub async fn get_authed(app: Router, path: &str, session_id: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .header("authorization", format!("Bearer {session_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a POST request with a JSON body, without a session.
#[allow(dead_code)]
pub async fn post_json(app: Router, path: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a POST request with a JSON body, authenticated with a session id.
#[allow(dead_code)]
pub async fn post_json_authed(
    app: Router,
    path: &str,
    session_id: &str,
    body: serde_json::Value,
) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {session_id}"))
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Collect a response body and parse it as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Create a session through the API and return its id.
#[allow(dead_code)]
pub async fn login(app: Router, user_id: &str, email: &str) -> String {
    let response = post_json(
        app,
        "/api/v1/sessions",
        serde_json::json!({ "user_id": user_id, "email": email }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK, "login should succeed");

    let json = body_json(response).await;
    json["data"]["session"]["id"].as_str().unwrap().to_string()
}
