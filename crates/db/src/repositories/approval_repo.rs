//! Repository for the `approval_requests` table.
//!
//! Every status transition is a conditional update (`WHERE id = $1 AND
//! status = <expected>`), so two racing transitions on the same row
//! resolve to exactly one winner; the loser matches zero rows and
//! observes a no-op.

use sqlx::PgPool;
use uuid::Uuid;

use jobportal_core::types::Timestamp;

use crate::models::approval::{ApprovalRequest, CreateApprovalRequest};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, action_type, endpoint, method, target_ids, payload, request_hash, \
                       status, requested_by_user_id, requested_by_email, requested_by_role, \
                       requested_at, expires_at, note, approved_by, approved_at, rejected_by, \
                       rejected_at, rejection_reason, executed_by, executed_at";

/// Provides CRUD and guarded status transitions for approval requests.
pub struct ApprovalRepo;

impl ApprovalRepo {
    /// Insert a new pending request, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateApprovalRequest,
    ) -> Result<ApprovalRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO approval_requests
                 (id, action_type, endpoint, method, target_ids, payload, request_hash,
                  status, requested_by_user_id, requested_by_email, requested_by_role,
                  expires_at, note)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9, $10, $11, $12)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ApprovalRequest>(&query)
            .bind(Uuid::now_v7())
            .bind(&input.action_type)
            .bind(&input.endpoint)
            .bind(&input.method)
            .bind(&input.target_ids)
            .bind(&input.payload)
            .bind(&input.request_hash)
            .bind(&input.requested_by.user_id)
            .bind(&input.requested_by.email)
            .bind(&input.requested_by.role)
            .bind(input.expires_at)
            .bind(&input.note)
            .fetch_one(pool)
            .await
    }

    /// Fetch a request by id, lazily expiring it first.
    ///
    /// A live (`pending`/`approved`) row whose `expires_at` has passed is
    /// conditionally flipped to `expired` in the same call, so expiry is
    /// visible immediately without waiting for the background sweep.
    pub async fn find_by_id(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<ApprovalRequest>, sqlx::Error> {
        sqlx::query(
            "UPDATE approval_requests SET status = 'expired'
             WHERE id = $1 AND status IN ('pending', 'approved') AND expires_at < NOW()",
        )
        .bind(id)
        .execute(pool)
        .await?;

        let query = format!("SELECT {COLUMNS} FROM approval_requests WHERE id = $1");
        sqlx::query_as::<_, ApprovalRequest>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List requests, optionally filtered by status, newest first.
    ///
    /// Runs the lazy-expiry sweep first so an overdue row can never be
    /// listed as `pending` or `approved`.
    pub async fn list(
        pool: &PgPool,
        status: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ApprovalRequest>, sqlx::Error> {
        Self::expire_overdue(pool).await?;

        match status {
            Some(status) => {
                let query = format!(
                    "SELECT {COLUMNS} FROM approval_requests
                     WHERE status = $1 ORDER BY requested_at DESC LIMIT $2"
                );
                sqlx::query_as::<_, ApprovalRequest>(&query)
                    .bind(status)
                    .bind(limit)
                    .fetch_all(pool)
                    .await
            }
            None => {
                let query = format!(
                    "SELECT {COLUMNS} FROM approval_requests
                     ORDER BY requested_at DESC LIMIT $1"
                );
                sqlx::query_as::<_, ApprovalRequest>(&query)
                    .bind(limit)
                    .fetch_all(pool)
                    .await
            }
        }
    }

    /// Conditional transition `pending -> approved`. Returns `true` if
    /// this caller won the transition.
    pub async fn approve(
        pool: &PgPool,
        id: Uuid,
        approved_by: &str,
        note: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE approval_requests
             SET status = 'approved', approved_by = $2, approved_at = NOW(),
                 note = COALESCE($3, note)
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(approved_by)
        .bind(note)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Conditional transition `pending | approved -> rejected`. An
    /// approved-but-not-yet-executed request can still be cancelled.
    pub async fn reject(
        pool: &PgPool,
        id: Uuid,
        rejected_by: &str,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE approval_requests
             SET status = 'rejected', rejected_by = $2, rejected_at = NOW(),
                 rejection_reason = $3
             WHERE id = $1 AND status IN ('pending', 'approved')",
        )
        .bind(id)
        .bind(rejected_by)
        .bind(reason)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Conditional transition `approved -> executed`. A second call
    /// matches zero rows, making execution marking idempotent.
    ///
    /// An overdue row is lazily flipped to `expired` first, so an
    /// approval whose deadline has passed can never be executed even if
    /// the caller skipped the execution-time validation.
    pub async fn mark_executed(
        pool: &PgPool,
        id: Uuid,
        executed_by: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query(
            "UPDATE approval_requests SET status = 'expired'
             WHERE id = $1 AND status IN ('pending', 'approved') AND expires_at < NOW()",
        )
        .bind(id)
        .execute(pool)
        .await?;

        let result = sqlx::query(
            "UPDATE approval_requests
             SET status = 'executed', executed_by = $2, executed_at = NOW()
             WHERE id = $1 AND status = 'approved'",
        )
        .bind(id)
        .bind(executed_by)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bulk-expire all live requests whose deadline has elapsed.
    /// Returns the count of rows flipped.
    pub async fn expire_overdue(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE approval_requests SET status = 'expired'
             WHERE status IN ('pending', 'approved') AND expires_at < NOW()",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete terminal rows older than the cutoff. Returns the count deleted.
    pub async fn delete_terminal_before(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM approval_requests
             WHERE status IN ('rejected', 'executed', 'expired') AND requested_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
