use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

/// Lifecycle of an activity's ELO processing, not of the activity itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "completion_status", rename_all = "snake_case")]
pub enum CompletionStatus {
    Scheduled,
    Completed,
    Cancelled,
}

const ACTIVITY_COLUMNS: &str = "id, activity_type_id, created_by, description, scheduled_at, \
     max_participants, elo_level, is_elo_rated, completed_at, completion_status, created_at, updated_at";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub activity_type_id: Uuid,
    pub created_by: Uuid,
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub max_participants: Option<i32>,
    pub elo_level: Option<i32>,
    pub is_elo_rated: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub completion_status: CompletionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct NewActivity {
    pub description: Option<String>,
    pub max_participants: Option<i32>,
    pub elo_level: Option<i32>,
    pub is_elo_rated: bool,
}

impl Activity {
    #[instrument(level = "debug", skip(pool))]
    pub async fn insert(
        pool: &PgPool,
        activity_type_id: Uuid,
        scheduled_at: DateTime<Utc>,
        created_by: Uuid,
        details: NewActivity,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO activities (activity_type_id, scheduled_at, completion_status, created_by,
                                      description, max_participants, elo_level, is_elo_rated)
             VALUES ($1, $2, 'scheduled', $3, $4, $5, $6, $7)
             RETURNING {ACTIVITY_COLUMNS}"
        ))
        .bind(activity_type_id)
        .bind(scheduled_at)
        .bind(created_by)
        .bind(details.description)
        .bind(details.max_participants)
        .bind(details.elo_level)
        .bind(details.is_elo_rated)
        .fetch_one(pool)
        .await
    }

    #[instrument(level = "debug", skip(pool))]
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Locks the row `FOR UPDATE` within an existing transaction so the
    /// completion orchestrator can check-and-flip status atomically.
    #[instrument(level = "debug", skip(tx))]
    pub async fn find_by_id_for_update(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    #[instrument(level = "debug", skip(tx))]
    pub async fn mark_completed(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE activities SET completion_status = 'completed', completed_at = $2, updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(completed_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
