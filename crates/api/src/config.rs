use chrono::Duration;

use jobportal_core::session::SessionTimeouts;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Session and approval policy knobs.
    pub security: SecurityConfig,
}

/// Policy configuration for the session registry and approval workflow.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Session idle timeout in minutes (default: `30`).
    pub idle_timeout_minutes: i64,
    /// Session absolute timeout in hours (default: `12`).
    pub absolute_timeout_hours: i64,
    /// How long a pending approval stays actionable, in minutes (default: `60`).
    pub approval_expiry_minutes: i64,
    /// Retention window for terminal approval rows, in days (default: `90`).
    pub approval_retention_days: i64,
    /// Interval between retention sweeps, in seconds (default: `1800`).
    pub cleanup_interval_secs: u64,
    /// Capacity of the local fallback KV tier (default: `10000`).
    pub memory_store_max_entries: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `HOST`                     | `0.0.0.0`               |
    /// | `PORT`                     | `3000`                  |
    /// | `CORS_ORIGINS`             | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                    |
    /// | `IDLE_TIMEOUT_MINUTES`     | `30`                    |
    /// | `ABSOLUTE_TIMEOUT_HOURS`   | `12`                    |
    /// | `APPROVAL_EXPIRY_MINUTES`  | `60`                    |
    /// | `APPROVAL_RETENTION_DAYS`  | `90`                    |
    /// | `CLEANUP_INTERVAL_SECS`    | `1800`                  |
    /// | `MEMORY_STORE_MAX_ENTRIES` | `10000`                 |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = env_parsed("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: env_parsed("REQUEST_TIMEOUT_SECS", 30),
            security: SecurityConfig::from_env(),
        }
    }
}

impl SecurityConfig {
    pub fn from_env() -> Self {
        Self {
            idle_timeout_minutes: env_parsed("IDLE_TIMEOUT_MINUTES", 30),
            absolute_timeout_hours: env_parsed("ABSOLUTE_TIMEOUT_HOURS", 12),
            approval_expiry_minutes: env_parsed("APPROVAL_EXPIRY_MINUTES", 60),
            approval_retention_days: env_parsed("APPROVAL_RETENTION_DAYS", 90),
            cleanup_interval_secs: env_parsed("CLEANUP_INTERVAL_SECS", 1800),
            memory_store_max_entries: env_parsed("MEMORY_STORE_MAX_ENTRIES", 10_000),
        }
    }

    /// The two session expiry clocks as durations.
    pub fn session_timeouts(&self) -> SessionTimeouts {
        SessionTimeouts {
            idle: Duration::minutes(self.idle_timeout_minutes),
            absolute: Duration::hours(self.absolute_timeout_hours),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(var: &str, default: T) -> T {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|_| panic!("{var} must be a valid value")),
        Err(_) => default,
    }
}
