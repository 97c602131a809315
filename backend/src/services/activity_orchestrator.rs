//! The only place that flips an activity to `completed` and triggers ELO
//! processing for it. Owns the sequencing across the lock, engine and
//! persister so a failed calculation never leaves the activity stuck
//! mid-transition.

use std::collections::HashMap;
use std::collections::HashSet;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::activity::{Activity, CompletionStatus};
use crate::models::activity_participant::{ActivityParticipant, FinalResult, ParticipantStatus};
use crate::models::activity_type::ActivityType;
use crate::models::change_log::{ChangeSource, ChangeType, EntityType};
use crate::models::elo_status::ActivityEloStatus;
use crate::models::skill_rating::UserActivitySkillRating;
use crate::models::skill_summary::UserActivityTypeSkillSummary;
use crate::services::change_log;
use crate::services::elo_engine::{self, ParticipantInput};
use crate::services::elo_lock::EloLockManager;
use crate::services::elo_persister::persist_elo_changes;

/// Rating assumed for a participant who received no skill ratings in this
/// activity and has no prior summary to compare against; the scale's
/// midpoint, so a complete unknown nudges neither up nor down.
const NEUTRAL_HISTORICAL_RATING: f64 = 5.0;

/// One participant's final outcome, submitted alongside the completion
/// request rather than via a separate results-entry call.
pub struct ParticipantResultInput {
    pub user_id: Uuid,
    pub final_result: Option<FinalResult>,
    pub position: Option<i32>,
    pub performance_notes: Option<String>,
}

/// Marks `activity_id` completed and, if it's ELO-rated, runs the ELO
/// pipeline for it. `invoker_id`/`invoker_is_admin` gate who may complete an
/// activity; only its creator or an admin can. `participant_results`, when
/// non-empty, must cover exactly the activity's accepted participants — no
/// fewer, no more — and is persisted in the same transaction as the
/// completion. An empty `participant_results` is treated as "results were
/// already recorded earlier", e.g. via a dedicated results-entry call.
#[instrument(level = "info", skip(pool, lock_manager, participant_results))]
pub async fn complete_activity(
    pool: &PgPool,
    lock_manager: &dyn EloLockManager,
    server_id: &str,
    activity_id: Uuid,
    invoker_id: Uuid,
    invoker_is_admin: bool,
    participant_results: Vec<ParticipantResultInput>,
) -> Result<()> {
    let activity = {
        let mut tx = pool.begin().await?;
        let activity = Activity::find_by_id_for_update(&mut tx, activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("activity {activity_id} not found")))?;

        if activity.created_by != invoker_id && !invoker_is_admin {
            return Err(AppError::Unauthorized("only the creator or an admin can complete this activity".into()));
        }
        if activity.completion_status != CompletionStatus::Scheduled {
            return Err(AppError::Conflict(format!(
                "activity {activity_id} is already {:?}",
                activity.completion_status
            )));
        }

        let roster = ActivityParticipant::find_for_activity_tx(&mut tx, activity_id).await?;
        let accepted_ids: HashSet<Uuid> =
            roster.iter().filter(|p| p.status == ParticipantStatus::Accepted).map(|p| p.user_id).collect();

        if !participant_results.is_empty() {
            let submitted_ids: HashSet<Uuid> = participant_results.iter().map(|r| r.user_id).collect();
            if submitted_ids != accepted_ids {
                let missing: Vec<Uuid> = accepted_ids.difference(&submitted_ids).copied().collect();
                let extra: Vec<Uuid> = submitted_ids.difference(&accepted_ids).copied().collect();
                return Err(AppError::Validation(format!(
                    "participant_results must cover exactly the accepted participants (missing {missing:?}, extra {extra:?})"
                )));
            }

            let user_ids: Vec<Uuid> = participant_results.iter().map(|r| r.user_id).collect();
            let final_results: Vec<Option<FinalResult>> = participant_results.iter().map(|r| r.final_result).collect();
            let positions: Vec<Option<i32>> = participant_results.iter().map(|r| r.position).collect();
            let notes: Vec<Option<String>> = participant_results.iter().map(|r| r.performance_notes.clone()).collect();
            ActivityParticipant::set_results_batch_tx(&mut tx, activity_id, &user_ids, &final_results, &positions, &notes)
                .await?;
        }

        let completed_at = Utc::now();
        Activity::mark_completed(&mut tx, activity_id, completed_at).await?;

        for &user_id in &accepted_ids {
            change_log::record(&mut tx, EntityType::Activity, activity_id, ChangeType::Updated, ChangeSource::User, user_id, &activity)
                .await?;
        }

        tx.commit().await?;
        activity
    };

    if !activity.is_elo_rated {
        return Ok(());
    }

    lock_manager.acquire(activity_id, server_id).await?;

    match run_elo_pipeline(pool, &activity).await {
        Ok(()) => {
            lock_manager.release_completed(activity_id).await?;
            Ok(())
        }
        Err(err) => {
            error!(activity_id = %activity_id, error = %err, "ELO pipeline failed, activity stays completed");
            lock_manager.release_failed(activity_id, &err.to_string()).await?;
            Err(AppError::EloProcessingError(err.to_string()))
        }
    }
}

/// Re-runs ELO processing for an activity that already completed but whose
/// ELO status is `failed` — the admin/creator-triggered retry path. Does not
/// touch the activity's own completion state, only the ELO lock and engine.
#[instrument(level = "info", skip(pool, lock_manager))]
pub async fn reprocess_elo(pool: &PgPool, lock_manager: &dyn EloLockManager, server_id: &str, activity_id: Uuid) -> Result<()> {
    let activity = Activity::find_by_id(pool, activity_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("activity {activity_id} not found")))?;

    if activity.completion_status != CompletionStatus::Completed {
        return Err(AppError::Conflict(format!("activity {activity_id} is not completed yet")));
    }
    if !activity.is_elo_rated {
        return Err(AppError::Conflict(format!("activity {activity_id} is not ELO-rated")));
    }

    let status = ActivityEloStatus::find(pool, activity_id).await?;
    if let Some(status) = &status {
        if status.status == crate::models::elo_status::EloStatus::Completed {
            return Err(AppError::Conflict(format!("activity {activity_id} already has a completed ELO result")));
        }
    }

    lock_manager.acquire(activity_id, server_id).await?;

    match run_elo_pipeline(pool, &activity).await {
        Ok(()) => {
            lock_manager.release_completed(activity_id).await?;
            Ok(())
        }
        Err(err) => {
            error!(activity_id = %activity_id, error = %err, "ELO reprocessing failed");
            lock_manager.release_failed(activity_id, &err.to_string()).await?;
            Err(AppError::EloProcessingError(err.to_string()))
        }
    }
}

async fn run_elo_pipeline(pool: &PgPool, activity: &Activity) -> Result<()> {
    let activity_type = ActivityType::find_by_id(pool, activity.activity_type_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("activity type {} not found", activity.activity_type_id)))?;
    let settings = activity_type.elo_settings.0.clone();

    let participants = ActivityParticipant::find_for_activity(pool, activity.id).await?;
    let active: Vec<&ActivityParticipant> = participants
        .iter()
        .filter(|p| p.status == ParticipantStatus::Accepted)
        .collect();

    if active.len() < settings.minimum_participants as usize {
        return Err(AppError::InsufficientParticipants(format!(
            "activity {} has {} accepted participants, need {}",
            activity.id,
            active.len(),
            settings.minimum_participants
        )));
    }

    let user_ids: Vec<Uuid> = active.iter().map(|p| p.user_id).collect();
    let inputs: HashMap<Uuid, &ActivityParticipant> = active.iter().map(|p| (p.user_id, *p)).collect();
    let skill_bonuses = compute_skill_bonuses(pool, activity, &user_ids, settings.skill_influence).await?;

    persist_elo_changes(pool, activity.activity_type_id, &user_ids, &settings, move |user_id, rating, games_played, volatility| {
        let participant = inputs[&user_id];
        ParticipantInput {
            user_id,
            rating,
            games_played,
            volatility,
            team_id: participant.team_id,
            final_result: participant.final_result,
            position: participant.position,
            skill_bonus: skill_bonuses.get(&user_id).copied().unwrap_or(0),
        }
    })
    .await?;

    Ok(())
}

/// The ELO nudge each participant earns from the skill ratings they received
/// in this specific activity, versus their historical per-activity-type
/// average for the same skills. Participants who received no ratings this
/// activity get no nudge.
async fn compute_skill_bonuses(
    pool: &PgPool,
    activity: &Activity,
    user_ids: &[Uuid],
    skill_influence: f64,
) -> Result<HashMap<Uuid, i32>> {
    let ratings = UserActivitySkillRating::find_for_activity(pool, activity.id).await?;
    let mut bonuses = HashMap::new();

    for &user_id in user_ids {
        let received: Vec<i32> = ratings.iter().filter(|r| r.rated_user_id == user_id).map(|r| r.rating_value).collect();
        if received.is_empty() {
            continue;
        }
        let activity_average = received.iter().sum::<i32>() as f64 / received.len() as f64;

        let summaries =
            UserActivityTypeSkillSummary::find_for_user_activity_type(pool, user_id, activity.activity_type_id).await?;
        let historical_average = if summaries.is_empty() {
            NEUTRAL_HISTORICAL_RATING
        } else {
            let total_weight: i32 = summaries.iter().map(|s| s.rating_count).sum();
            if total_weight == 0 {
                NEUTRAL_HISTORICAL_RATING
            } else {
                summaries.iter().map(|s| s.average_rating_decimal() * s.rating_count as f64).sum::<f64>()
                    / total_weight as f64
            }
        };

        let bonus = elo_engine::skill_bonus(activity_average, historical_average, skill_influence);
        bonuses.insert(user_id, bonus);
    }

    Ok(bonuses)
}
