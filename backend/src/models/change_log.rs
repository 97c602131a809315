use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

use crate::models::delta_cursor::EntityClass;

/// Which domain entity a change-log row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "entity_type", rename_all = "snake_case")]
pub enum EntityType {
    Activity,
    ActivityParticipant,
    UserActivityTypeElo,
    UserActivitySkillRating,
    UserActivityTypeSkillSummary,
    UserGeneralSkillSummary,
}

impl EntityType {
    /// Which of the delta cursor's independently-tracked sync positions this
    /// entity type rolls up under.
    pub fn entity_class(self) -> EntityClass {
        match self {
            EntityType::UserActivityTypeElo => EntityClass::Elo,
            EntityType::Activity | EntityType::ActivityParticipant => EntityClass::Activity,
            EntityType::UserActivitySkillRating
            | EntityType::UserActivityTypeSkillSummary
            | EntityType::UserGeneralSkillSummary => EntityClass::SkillRating,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "change_type", rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
}

/// Whether a change originated from a human action or a background process
/// (the ELO pipeline, the skill aggregator). Clients use this to decide
/// whether to show a toast or silently refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "change_source", rename_all = "snake_case")]
pub enum ChangeSource {
    User,
    System,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EntityChangeLog {
    pub sequence: i64,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub change_type: ChangeType,
    pub source: ChangeSource,
    pub affected_user_id: Uuid,
    pub payload: Json<Value>,
    pub occurred_at: DateTime<Utc>,
}

/// What the change-log writer needs to append a row. `sequence` and
/// `occurred_at` are assigned by the database. `affected_user_id` is the
/// single user whose view of the world this row affects - a change that
/// affects several users (e.g. completing an activity with five accepted
/// participants) is written as one row per affected user.
pub struct NewChange {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub change_type: ChangeType,
    pub source: ChangeSource,
    pub affected_user_id: Uuid,
    pub payload: Value,
}

impl EntityChangeLog {
    #[instrument(level = "debug", skip(tx, change))]
    pub async fn append(
        tx: &mut Transaction<'_, Postgres>,
        change: NewChange,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO entity_change_log (entity_type, entity_id, change_type, source, affected_user_id, payload)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING sequence",
        )
        .bind(change.entity_type)
        .bind(change.entity_id)
        .bind(change.change_type)
        .bind(change.source)
        .bind(change.affected_user_id)
        .bind(Json(change.payload))
        .fetch_one(&mut **tx)
        .await?;
        Ok(row.0)
    }

    /// Fetches up to `limit` rows for `affected_user_id` whose entity type is
    /// one of `entity_types` and whose sequence is strictly after
    /// `after_sequence`, newest first. `after_sequence` is the oldest of the
    /// caller's per-class effective bounds; the caller drops rows whose
    /// class-specific bound hasn't actually been passed yet.
    #[instrument(level = "debug", skip(pool, entity_types))]
    pub async fn find_after(
        pool: &PgPool,
        affected_user_id: Uuid,
        entity_types: &[EntityType],
        after_sequence: i64,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT sequence, entity_type, entity_id, change_type, source, affected_user_id, payload, occurred_at
             FROM entity_change_log
             WHERE affected_user_id = $1 AND entity_type = ANY($2) AND sequence > $3
             ORDER BY sequence DESC
             LIMIT $4",
        )
        .bind(affected_user_id)
        .bind(entity_types)
        .bind(after_sequence)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    #[instrument(level = "debug", skip(pool))]
    pub async fn latest_sequence(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let row: (Option<i64>,) =
            sqlx::query_as("SELECT MAX(sequence) FROM entity_change_log").fetch_one(pool).await?;
        Ok(row.0.unwrap_or(0))
    }

    /// Latest sequence among a set of entity types, for resetting a cursor to
    /// a specific class's current position rather than the global latest.
    #[instrument(level = "debug", skip(pool, entity_types))]
    pub async fn latest_sequence_for(pool: &PgPool, entity_types: &[EntityType]) -> Result<i64, sqlx::Error> {
        let row: (Option<i64>,) =
            sqlx::query_as("SELECT MAX(sequence) FROM entity_change_log WHERE entity_type = ANY($1)")
                .bind(entity_types)
                .fetch_one(pool)
                .await?;
        Ok(row.0.unwrap_or(0))
    }

    /// Deletes rows older than `retention_days`, for the retention sweep
    /// binary. Rows referenced by a cursor still behind the cutoff are kept
    /// implicitly safe because cursors advance monotonically and clients
    /// resync from zero if they fall off the retention window.
    #[instrument(level = "debug", skip(pool))]
    pub async fn delete_older_than(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM entity_change_log WHERE occurred_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
