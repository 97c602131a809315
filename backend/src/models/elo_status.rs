use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

/// State of an activity's ELO processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "elo_status", rename_all = "snake_case")]
pub enum EloStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ActivityEloStatus {
    pub activity_id: Uuid,
    pub status: EloStatus,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub attempt_count: i32,
}

impl ActivityEloStatus {
    #[instrument(level = "debug", skip(pool))]
    pub async fn find(pool: &PgPool, activity_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT activity_id, status, locked_by, locked_at, error_message, completed_at, attempt_count
             FROM activity_elo_status WHERE activity_id = $1",
        )
        .bind(activity_id)
        .fetch_optional(pool)
        .await
    }

    /// Tries to move a row from `pending`/`failed` to `processing`, stamping
    /// the owning server id. Also takes over a `processing` row whose
    /// `locked_at` is older than `stale_after`, so a lock abandoned by a
    /// crashed server is reclaimed on the very next completion attempt
    /// instead of waiting on a separate sweep. Returns `false` if another
    /// server already holds a lock that isn't stale yet.
    #[instrument(level = "debug", skip(tx))]
    pub async fn try_acquire(
        tx: &mut Transaction<'_, Postgres>,
        activity_id: Uuid,
        server_id: &str,
        now: DateTime<Utc>,
        stale_after: chrono::Duration,
    ) -> Result<bool, sqlx::Error> {
        let stale_before = now - stale_after;
        let result = sqlx::query(
            "INSERT INTO activity_elo_status (activity_id, status, locked_by, locked_at, attempt_count)
             VALUES ($1, 'processing', $2, $3, 1)
             ON CONFLICT (activity_id) DO UPDATE
             SET status = 'processing', locked_by = $2, locked_at = $3,
                 attempt_count = activity_elo_status.attempt_count + 1
             WHERE activity_elo_status.status IN ('pending', 'failed')
                OR (activity_elo_status.status = 'processing' AND activity_elo_status.locked_at < $4)",
        )
        .bind(activity_id)
        .bind(server_id)
        .bind(now)
        .bind(stale_before)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(level = "debug", skip(tx))]
    pub async fn mark_completed(
        tx: &mut Transaction<'_, Postgres>,
        activity_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE activity_elo_status
             SET status = 'completed', completed_at = $2, locked_by = NULL, locked_at = NULL, error_message = NULL
             WHERE activity_id = $1",
        )
        .bind(activity_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Releases the lock and records the failure reason without propagating
    /// the error to the caller, so an ELO failure never fails the request
    /// that triggered it.
    #[instrument(level = "debug", skip(pool))]
    pub async fn mark_failed(
        pool: &PgPool,
        activity_id: Uuid,
        error_message: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE activity_elo_status
             SET status = 'failed', locked_by = NULL, locked_at = NULL, error_message = $2
             WHERE activity_id = $1",
        )
        .bind(activity_id)
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(())
    }
}
