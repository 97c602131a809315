use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

const RATING_COLUMNS: &str = "id, activity_id, rated_user_id, rater_user_id, skill_definition_id, \
     rating_value, confidence, comment, is_anonymous, created_at";

/// A single peer rating of one skill for one participant in one activity.
/// Ingest validates `rating_value`/`confidence`/`comment` via
/// `crate::validation` before this row is written.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserActivitySkillRating {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub rated_user_id: Uuid,
    pub rater_user_id: Uuid,
    pub skill_definition_id: Uuid,
    pub rating_value: i32,
    pub confidence: i32,
    pub comment: Option<String>,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl UserActivitySkillRating {
    #[instrument(level = "debug", skip(tx))]
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        activity_id: Uuid,
        rated_user_id: Uuid,
        rater_user_id: Uuid,
        skill_definition_id: Uuid,
        rating_value: i32,
        confidence: i32,
        comment: Option<&str>,
        is_anonymous: bool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO user_activity_skill_ratings
                (activity_id, rated_user_id, rater_user_id, skill_definition_id,
                 rating_value, confidence, comment, is_anonymous)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (activity_id, rated_user_id, rater_user_id, skill_definition_id)
             DO UPDATE SET rating_value = EXCLUDED.rating_value,
                           confidence = EXCLUDED.confidence,
                           comment = EXCLUDED.comment,
                           is_anonymous = EXCLUDED.is_anonymous
             RETURNING {RATING_COLUMNS}"
        ))
        .bind(activity_id)
        .bind(rated_user_id)
        .bind(rater_user_id)
        .bind(skill_definition_id)
        .bind(rating_value)
        .bind(confidence)
        .bind(comment)
        .bind(is_anonymous)
        .fetch_one(&mut **tx)
        .await
    }

    #[instrument(level = "debug", skip(pool))]
    pub async fn find_for_user_activity_type(
        pool: &PgPool,
        rated_user_id: Uuid,
        activity_type_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT r.id, r.activity_id, r.rated_user_id, r.rater_user_id, r.skill_definition_id,
                    r.rating_value, r.confidence, r.comment, r.is_anonymous, r.created_at
             FROM user_activity_skill_ratings r
             JOIN activities a ON a.id = r.activity_id
             WHERE r.rated_user_id = $1 AND a.activity_type_id = $2
             ORDER BY r.created_at ASC"
        ))
        .bind(rated_user_id)
        .bind(activity_type_id)
        .fetch_all(pool)
        .await
    }

    #[instrument(level = "debug", skip(pool))]
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!("SELECT {RATING_COLUMNS} FROM user_activity_skill_ratings WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    #[instrument(level = "debug", skip(pool))]
    pub async fn find_for_activity(pool: &PgPool, activity_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {RATING_COLUMNS} FROM user_activity_skill_ratings WHERE activity_id = $1 ORDER BY created_at ASC"
        ))
        .bind(activity_id)
        .fetch_all(pool)
        .await
    }

    /// Updates rating value/confidence/comment in place. Callers enforce the
    /// author-only, within-one-hour window before calling this.
    #[instrument(level = "debug", skip(tx))]
    pub async fn update(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        rating_value: i32,
        confidence: i32,
        comment: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "UPDATE user_activity_skill_ratings
             SET rating_value = $2, confidence = $3, comment = $4
             WHERE id = $1
             RETURNING {RATING_COLUMNS}"
        ))
        .bind(id)
        .bind(rating_value)
        .bind(confidence)
        .bind(comment)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Deletes a rating. Every deletion must emit a change-log row so clients that cached the rating learn it is gone -
    /// callers are responsible for calling the change-log writer afterwards
    /// in the same transaction.
    #[instrument(level = "debug", skip(tx))]
    pub async fn delete(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!("DELETE FROM user_activity_skill_ratings WHERE id = $1 RETURNING {RATING_COLUMNS}"))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }
}
