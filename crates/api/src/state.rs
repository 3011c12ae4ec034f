use std::sync::Arc;

use crate::approvals::ApprovalService;
use crate::config::ServerConfig;
use crate::sessions::SessionService;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: jobportal_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Session lifecycle service (registry over the TTL KV tiers).
    pub sessions: SessionService,
    /// Dual-control approval workflow service.
    pub approvals: ApprovalService,
}
