use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

/// `average_rating`/`overall_average` are stored as `round(average * 100)`
/// so every summary field is an integer column; this is the inverse for
/// callers that need the original 0..10 scale.
pub const RATING_SCALE: f64 = 100.0;

/// Direction of a user's rolling skill average versus its previous value,
/// surfaced directly rather than making clients diff two polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "trend", rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

/// Rolling per-skill average for one user within one activity type.
/// `average_rating` is `round(rawAverage * 100)`, an integer.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserActivityTypeSkillSummary {
    pub user_id: Uuid,
    pub activity_type_id: Uuid,
    pub skill_definition_id: Uuid,
    pub average_rating: i32,
    pub rating_count: i32,
    pub trend: Trend,
    pub updated_at: DateTime<Utc>,
}

impl UserActivityTypeSkillSummary {
    pub fn average_rating_decimal(&self) -> f64 {
        self.average_rating as f64 / RATING_SCALE
    }

    #[instrument(level = "debug", skip(pool))]
    pub async fn find_for_user_activity_type(
        pool: &PgPool,
        user_id: Uuid,
        activity_type_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT user_id, activity_type_id, skill_definition_id, average_rating,
                    rating_count, trend, updated_at
             FROM user_activity_type_skill_summaries
             WHERE user_id = $1 AND activity_type_id = $2",
        )
        .bind(user_id)
        .bind(activity_type_id)
        .fetch_all(pool)
        .await
    }

    /// Upserts the rolling average and trend for one (user, activity type,
    /// skill) triple within an existing transaction.
    #[instrument(level = "debug", skip(tx))]
    pub async fn upsert(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        activity_type_id: Uuid,
        skill_definition_id: Uuid,
        average_rating: i32,
        rating_count: i32,
        trend: Trend,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO user_activity_type_skill_summaries
                (user_id, activity_type_id, skill_definition_id, average_rating, rating_count, trend, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (user_id, activity_type_id, skill_definition_id)
             DO UPDATE SET average_rating = EXCLUDED.average_rating,
                           rating_count = EXCLUDED.rating_count,
                           trend = EXCLUDED.trend,
                           updated_at = EXCLUDED.updated_at
             RETURNING user_id, activity_type_id, skill_definition_id, average_rating,
                       rating_count, trend, updated_at",
        )
        .bind(user_id)
        .bind(activity_type_id)
        .bind(skill_definition_id)
        .bind(average_rating)
        .bind(rating_count)
        .bind(trend)
        .bind(now)
        .fetch_one(&mut **tx)
        .await
    }

    #[instrument(level = "debug", skip(pool))]
    pub async fn find_all_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT user_id, activity_type_id, skill_definition_id, average_rating,
                    rating_count, trend, updated_at
             FROM user_activity_type_skill_summaries WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

/// Roll-up of a user's skill summaries across all activity types into a
/// single general score. `overall_average` is `round(rawAverage * 100)`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserGeneralSkillSummary {
    pub user_id: Uuid,
    pub skill_definition_id: Uuid,
    pub overall_average: i32,
    pub updated_at: DateTime<Utc>,
}

impl UserGeneralSkillSummary {
    #[instrument(level = "debug", skip(tx))]
    pub async fn upsert(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        skill_definition_id: Uuid,
        overall_average: i32,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO user_general_skill_summaries (user_id, skill_definition_id, overall_average, updated_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, skill_definition_id)
             DO UPDATE SET overall_average = EXCLUDED.overall_average, updated_at = EXCLUDED.updated_at
             RETURNING user_id, skill_definition_id, overall_average, updated_at",
        )
        .bind(user_id)
        .bind(skill_definition_id)
        .bind(overall_average)
        .bind(now)
        .fetch_one(&mut **tx)
        .await
    }

    #[instrument(level = "debug", skip(pool))]
    pub async fn find_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT user_id, skill_definition_id, overall_average, updated_at
             FROM user_general_skill_summaries WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
