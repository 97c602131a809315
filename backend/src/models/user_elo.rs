use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

const ELO_COLUMNS: &str = "user_id, activity_type_id, rating, peak_elo, games_played, volatility, version, updated_at";

/// A user's ELO rating within a single activity type. `games_played`
/// drives the new/established/expert K-factor tier; `volatility` drives the
/// provisional K-factor boost; `version` backs optimistic-concurrency
/// retries in [`crate::services::elo_persister`].
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserActivityTypeElo {
    pub user_id: Uuid,
    pub activity_type_id: Uuid,
    pub rating: i32,
    pub peak_elo: i32,
    pub games_played: i32,
    pub volatility: i32,
    pub version: i32,
    pub updated_at: DateTime<Utc>,
}

impl UserActivityTypeElo {
    /// Fetches existing rows for a batch of users, locking them `FOR UPDATE`
    /// so concurrent activity completions for overlapping rosters serialize.
    /// Users with no row yet are simply absent from the result; the caller
    /// seeds them at `EloSettings::starting_elo`.
    #[instrument(level = "debug", skip(tx, user_ids))]
    pub async fn find_batch_for_update(
        tx: &mut Transaction<'_, Postgres>,
        activity_type_id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {ELO_COLUMNS}
             FROM user_activity_type_elo
             WHERE activity_type_id = $1 AND user_id = ANY($2)
             ORDER BY user_id
             FOR UPDATE"
        ))
        .bind(activity_type_id)
        .bind(user_ids)
        .fetch_all(&mut **tx)
        .await
    }

    /// Inserts rows for users with no prior rating at this activity type.
    /// Seeded at `version = 1`; a conflict (someone else inserted the same
    /// user concurrently) simply drops that user from the returned set so
    /// the caller's conflict check below catches it like any other race.
    #[instrument(level = "debug", skip(tx, user_ids, ratings, peak_elos, games_played, volatilities))]
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_new_batch(
        tx: &mut Transaction<'_, Postgres>,
        activity_type_id: Uuid,
        user_ids: &[Uuid],
        ratings: &[i32],
        peak_elos: &[i32],
        games_played: &[i32],
        volatilities: &[i32],
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO user_activity_type_elo (user_id, activity_type_id, rating, peak_elo, games_played, volatility, version, updated_at)
             SELECT u.user_id, $1, u.rating, u.peak_elo, u.games_played, u.volatility, 1, $7
             FROM UNNEST($2::uuid[], $3::int[], $4::int[], $5::int[], $6::int[])
                  AS u(user_id, rating, peak_elo, games_played, volatility)
             ON CONFLICT (user_id, activity_type_id) DO NOTHING
             RETURNING {ELO_COLUMNS}"
        ))
        .bind(activity_type_id)
        .bind(user_ids)
        .bind(ratings)
        .bind(peak_elos)
        .bind(games_played)
        .bind(volatilities)
        .bind(now)
        .fetch_all(&mut **tx)
        .await
    }

    /// Updates rows for users with a prior rating, requiring each row's
    /// current `version` to match `expected_versions`. A row whose version
    /// has moved on is silently excluded from the returned set rather than
    /// erroring — the caller detects the gap by comparing counts and retries
    /// the whole batch.
    #[instrument(level = "debug", skip(tx, user_ids, ratings, peak_elos, games_played, volatilities, expected_versions))]
    #[allow(clippy::too_many_arguments)]
    pub async fn update_existing_batch(
        tx: &mut Transaction<'_, Postgres>,
        activity_type_id: Uuid,
        user_ids: &[Uuid],
        ratings: &[i32],
        peak_elos: &[i32],
        games_played: &[i32],
        volatilities: &[i32],
        expected_versions: &[i32],
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Self>(
            "UPDATE user_activity_type_elo AS e
             SET rating = u.rating, peak_elo = u.peak_elo, games_played = u.games_played,
                 volatility = u.volatility, version = e.version + 1, updated_at = $8
             FROM UNNEST($2::uuid[], $3::int[], $4::int[], $5::int[], $6::int[], $7::int[])
                  AS u(user_id, rating, peak_elo, games_played, volatility, expected_version)
             WHERE e.activity_type_id = $1 AND e.user_id = u.user_id AND e.version = u.expected_version
             RETURNING e.user_id, e.activity_type_id, e.rating, e.peak_elo, e.games_played, e.volatility, e.version, e.updated_at",
        )
        .bind(activity_type_id)
        .bind(user_ids)
        .bind(ratings)
        .bind(peak_elos)
        .bind(games_played)
        .bind(volatilities)
        .bind(expected_versions)
        .bind(now)
        .fetch_all(&mut **tx)
        .await
    }
}
