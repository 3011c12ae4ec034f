//! Periodic expiry and retention sweep.
//!
//! One loop handles both stores: overdue approval requests are flipped
//! to `expired` and terminal rows past the retention window are deleted,
//! then dead `kv_entries` rows (expired sessions and indexes in the
//! shared tier) are purged. Expiry is already enforced lazily on every
//! read, so this sweep only reclaims space and keeps listings tidy;
//! nothing depends on it for correctness.

use std::time::Duration;

use sqlx::PgPool;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use jobportal_db::kv::PgTtlStore;

use crate::approvals::ApprovalService;
use crate::config::SecurityConfig;

/// Run the retention sweep loop until `cancel` is triggered.
pub async fn run(
    pool: PgPool,
    approvals: ApprovalService,
    config: SecurityConfig,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = config.cleanup_interval_secs,
        retention_days = config.approval_retention_days,
        "Retention sweep started"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.cleanup_interval_secs));
    // A slow sweep must not cause a burst of catch-up ticks.
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Retention sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match approvals.cleanup_old(config.approval_retention_days).await {
                    Ok(deleted) => {
                        if deleted > 0 {
                            tracing::info!(deleted, "Retention sweep: purged old approval requests");
                        } else {
                            tracing::debug!("Retention sweep: no approval rows to purge");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Retention sweep: approval cleanup failed");
                    }
                }

                match PgTtlStore::purge_expired(&pool).await {
                    Ok(purged) => {
                        if purged > 0 {
                            tracing::info!(purged, "Retention sweep: purged expired kv entries");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Retention sweep: kv purge failed");
                    }
                }
            }
        }
    }
}
