//! Turns [`EloChange`]s into database writes inside a single
//! transaction, seeding unseen users at the activity type's starting rating
//! and emitting one change-log row per updated user.
//!
//! Rows are locked `FOR UPDATE` while the engine runs, so in practice a
//! version conflict can only come from a row this process itself raced with
//! across two `persist_elo_changes` calls that both lost the lock race; the
//! optimistic check below is the backstop for that case, not the primary
//! concurrency control.

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::activity_type::EloSettings;
use crate::models::change_log::{ChangeSource, ChangeType, EntityType};
use crate::models::user_elo::UserActivityTypeElo;
use crate::services::change_log;
use crate::services::elo_engine::{ParticipantInput, calculate_elo_changes};

/// Volatility seeded for a user with no existing rating row.
const DEFAULT_VOLATILITY: i32 = 300;

/// How many times a version conflict is retried before giving up with
/// [`AppError::ConcurrentRatingUpdate`].
const MAX_ATTEMPTS: u32 = 3;

pub async fn persist_elo_changes(
    pool: &PgPool,
    activity_type_id: Uuid,
    participant_user_ids: &[Uuid],
    settings: &EloSettings,
    mut build_participant: impl FnMut(Uuid, i32, i32, i32) -> ParticipantInput,
) -> Result<Vec<UserActivityTypeElo>> {
    for _attempt in 0..MAX_ATTEMPTS {
        let mut tx = pool.begin().await?;

        let existing =
            UserActivityTypeElo::find_batch_for_update(&mut tx, activity_type_id, participant_user_ids).await?;

        let participants: Vec<ParticipantInput> = participant_user_ids
            .iter()
            .map(|&user_id| {
                let (rating, games_played, volatility) = existing
                    .iter()
                    .find(|e| e.user_id == user_id)
                    .map(|e| (e.rating, e.games_played, e.volatility))
                    .unwrap_or((settings.starting_elo, 0, DEFAULT_VOLATILITY));
                build_participant(user_id, rating, games_played, volatility)
            })
            .collect();

        let changes = calculate_elo_changes(&participants, settings)?;
        let now = Utc::now();

        let mut new_user_ids = Vec::new();
        let mut new_ratings = Vec::new();
        let mut new_peak_elos = Vec::new();
        let mut new_games_played = Vec::new();
        let mut new_volatilities = Vec::new();

        let mut upd_user_ids = Vec::new();
        let mut upd_ratings = Vec::new();
        let mut upd_peak_elos = Vec::new();
        let mut upd_games_played = Vec::new();
        let mut upd_volatilities = Vec::new();
        let mut upd_expected_versions = Vec::new();

        for change in &changes {
            let participant = participants.iter().find(|p| p.user_id == change.user_id).expect("participant built for every change");
            match existing.iter().find(|e| e.user_id == change.user_id) {
                Some(row) => {
                    upd_user_ids.push(change.user_id);
                    upd_ratings.push(change.new_rating);
                    upd_peak_elos.push(row.peak_elo.max(change.new_rating));
                    upd_games_played.push(change.new_games_played);
                    upd_volatilities.push(participant.volatility);
                    upd_expected_versions.push(row.version);
                }
                None => {
                    new_user_ids.push(change.user_id);
                    new_ratings.push(change.new_rating);
                    new_peak_elos.push(change.new_rating);
                    new_games_played.push(change.new_games_played);
                    new_volatilities.push(participant.volatility);
                }
            }
        }

        let inserted = UserActivityTypeElo::insert_new_batch(
            &mut tx,
            activity_type_id,
            &new_user_ids,
            &new_ratings,
            &new_peak_elos,
            &new_games_played,
            &new_volatilities,
            now,
        )
        .await?;

        let updated = UserActivityTypeElo::update_existing_batch(
            &mut tx,
            activity_type_id,
            &upd_user_ids,
            &upd_ratings,
            &upd_peak_elos,
            &upd_games_played,
            &upd_volatilities,
            &upd_expected_versions,
            now,
        )
        .await?;

        if updated.len() != upd_user_ids.len() {
            // Another writer updated one of these rows between our read and
            // our write; drop the transaction (releasing the `FOR UPDATE`
            // lock) and retry with fresh versions.
            continue;
        }

        let mut rows = inserted;
        rows.extend(updated);

        for row in &rows {
            write_change_log_entry(&mut tx, row).await?;
        }

        tx.commit().await?;
        return Ok(rows);
    }

    Err(AppError::ConcurrentRatingUpdate)
}

async fn write_change_log_entry(
    tx: &mut Transaction<'_, Postgres>,
    row: &UserActivityTypeElo,
) -> Result<()> {
    change_log::record(
        tx,
        EntityType::UserActivityTypeElo,
        row.user_id,
        ChangeType::Updated,
        ChangeSource::System,
        row.user_id,
        row,
    )
    .await?;
    Ok(())
}
