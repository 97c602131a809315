use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "participant_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Pending,
    Accepted,
    Declined,
}

/// Outcome of a participant/team within a completed activity.
/// `Win`/`Loss`/`Draw` feed the ELO engine directly; `position` is used for
/// activity types with more than two ranked outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "final_result", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FinalResult {
    Win,
    Loss,
    Draw,
}

const PARTICIPANT_COLUMNS: &str =
    "id, activity_id, user_id, team_id, status, final_result, position, performance_notes";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ActivityParticipant {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub user_id: Uuid,
    pub team_id: Option<Uuid>,
    pub status: ParticipantStatus,
    pub final_result: Option<FinalResult>,
    pub position: Option<i32>,
    pub performance_notes: Option<String>,
}

impl ActivityParticipant {
    /// Registers the initial roster for a newly created activity. The
    /// creator is seeded as `accepted`; everyone else invited up front
    /// starts `pending` the same as a self-service join would.
    #[instrument(level = "debug", skip(pool, user_ids))]
    pub async fn insert_batch(
        pool: &PgPool,
        activity_id: Uuid,
        creator_id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO activity_participants (activity_id, user_id, status)
             SELECT $1, u.user_id, CASE WHEN u.user_id = $3 THEN 'accepted' ELSE 'pending' END
             FROM UNNEST($2::uuid[]) AS u(user_id)
             ON CONFLICT (activity_id, user_id) DO NOTHING
             RETURNING {PARTICIPANT_COLUMNS}"
        ))
        .bind(activity_id)
        .bind(user_ids)
        .bind(creator_id)
        .fetch_all(pool)
        .await
    }

    /// Records a self-service join request as a `pending` row.
    #[instrument(level = "debug", skip(pool))]
    pub async fn join(pool: &PgPool, activity_id: Uuid, user_id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO activity_participants (activity_id, user_id, status)
             VALUES ($1, $2, 'pending')
             RETURNING {PARTICIPANT_COLUMNS}"
        ))
        .bind(activity_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Removes a participant's own row, e.g. leaving before completion.
    #[instrument(level = "debug", skip(pool))]
    pub async fn remove(pool: &PgPool, activity_id: Uuid, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM activity_participants WHERE activity_id = $1 AND user_id = $2")
            .bind(activity_id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Creator response to a join request: accept, decline, or remove an
    /// already-accepted participant. Runs inside the caller's transaction so
    /// it can be paired with a change-log write.
    #[instrument(level = "debug", skip(tx))]
    pub async fn set_status(
        tx: &mut Transaction<'_, Postgres>,
        activity_id: Uuid,
        participant_id: Uuid,
        status: ParticipantStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "UPDATE activity_participants SET status = $3
             WHERE activity_id = $1 AND id = $2
             RETURNING {PARTICIPANT_COLUMNS}"
        ))
        .bind(activity_id)
        .bind(participant_id)
        .bind(status)
        .fetch_optional(&mut **tx)
        .await
    }

    #[instrument(level = "debug", skip(pool))]
    pub async fn find_one(pool: &PgPool, activity_id: Uuid, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM activity_participants WHERE activity_id = $1 AND user_id = $2"
        ))
        .bind(activity_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    #[instrument(level = "debug", skip(pool))]
    pub async fn find_for_activity(
        pool: &PgPool,
        activity_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM activity_participants WHERE activity_id = $1 ORDER BY position NULLS LAST"
        ))
        .bind(activity_id)
        .fetch_all(pool)
        .await
    }

    #[instrument(level = "debug", skip(tx))]
    pub async fn find_for_activity_tx(
        tx: &mut Transaction<'_, Postgres>,
        activity_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM activity_participants WHERE activity_id = $1 ORDER BY position NULLS LAST"
        ))
        .bind(activity_id)
        .fetch_all(&mut **tx)
        .await
    }

    /// Records final results/positions/notes ahead of completion.
    #[instrument(level = "debug", skip(pool, user_ids, final_results, positions, performance_notes))]
    pub async fn set_results_batch(
        pool: &PgPool,
        activity_id: Uuid,
        user_ids: &[Uuid],
        final_results: &[Option<FinalResult>],
        positions: &[Option<i32>],
        performance_notes: &[Option<String>],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE activity_participants AS p
             SET final_result = u.final_result, position = u.position, performance_notes = u.performance_notes
             FROM UNNEST($2::uuid[], $3::final_result[], $4::int[], $5::text[])
                  AS u(user_id, final_result, position, performance_notes)
             WHERE p.activity_id = $1 AND p.user_id = u.user_id",
        )
        .bind(activity_id)
        .bind(user_ids)
        .bind(final_results)
        .bind(positions)
        .bind(performance_notes)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Same as [`Self::set_results_batch`] but runs inside the caller's
    /// transaction, so completion can validate and persist results as part
    /// of the same commit that flips the activity to `completed`.
    #[instrument(level = "debug", skip(tx, user_ids, final_results, positions, performance_notes))]
    pub async fn set_results_batch_tx(
        tx: &mut Transaction<'_, Postgres>,
        activity_id: Uuid,
        user_ids: &[Uuid],
        final_results: &[Option<FinalResult>],
        positions: &[Option<i32>],
        performance_notes: &[Option<String>],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE activity_participants AS p
             SET final_result = u.final_result, position = u.position, performance_notes = u.performance_notes
             FROM UNNEST($2::uuid[], $3::final_result[], $4::int[], $5::text[])
                  AS u(user_id, final_result, position, performance_notes)
             WHERE p.activity_id = $1 AND p.user_id = u.user_id",
        )
        .bind(activity_id)
        .bind(user_ids)
        .bind(final_results)
        .bind(positions)
        .bind(performance_notes)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Batch-assigns teams for the balance-teams endpoint.
    #[instrument(level = "debug", skip(pool, user_ids, team_ids))]
    pub async fn assign_teams_batch(
        pool: &PgPool,
        activity_id: Uuid,
        user_ids: &[Uuid],
        team_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE activity_participants AS p
             SET team_id = u.team_id
             FROM UNNEST($2::uuid[], $3::uuid[]) AS u(user_id, team_id)
             WHERE p.activity_id = $1 AND p.user_id = u.user_id",
        )
        .bind(activity_id)
        .bind(user_ids)
        .bind(team_ids)
        .execute(pool)
        .await?;
        Ok(())
    }
}
