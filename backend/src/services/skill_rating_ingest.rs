//! Validates and records a single peer skill rating, then
//! triggers the summary aggregator for the rated user.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::activity_participant::ActivityParticipant;
use crate::models::activity_type_skill::ActivityTypeSkill;
use crate::models::change_log::{ChangeSource, ChangeType, EntityType};
use crate::models::skill_rating::UserActivitySkillRating;
use crate::services::{change_log, skill_summary};
use crate::validation;

/// Window during which a rating's author may still edit it.
pub fn rating_edit_window() -> Duration {
    Duration::hours(1)
}

pub struct RatingSubmission {
    pub activity_id: Uuid,
    pub rated_user_id: Uuid,
    pub rater_user_id: Uuid,
    pub skill_definition_id: Uuid,
    pub activity_type_id: Uuid,
    pub rating_value: i32,
    pub confidence: i32,
    pub comment: Option<String>,
    pub is_anonymous: bool,
}

pub async fn submit_rating(pool: &PgPool, submission: RatingSubmission) -> Result<UserActivitySkillRating> {
    validation::validate_rating_value(submission.rating_value)?;
    validation::validate_confidence(submission.confidence)?;
    validation::validate_comment(submission.comment.as_deref())?;

    if submission.rater_user_id == submission.rated_user_id {
        return Err(AppError::Validation("cannot rate your own performance".into()));
    }

    let applicable_skills = ActivityTypeSkill::find_for_activity_type(pool, submission.activity_type_id).await?;
    if !applicable_skills.iter().any(|s| s.skill_definition_id == submission.skill_definition_id) {
        return Err(AppError::Validation(
            "skill is not tracked for this activity type".into(),
        ));
    }

    let mut tx = pool.begin().await?;

    let rating = UserActivitySkillRating::insert(
        &mut tx,
        submission.activity_id,
        submission.rated_user_id,
        submission.rater_user_id,
        submission.skill_definition_id,
        submission.rating_value,
        submission.confidence,
        submission.comment.as_deref(),
        submission.is_anonymous,
    )
    .await?;

    change_log::record(
        &mut tx,
        EntityType::UserActivitySkillRating,
        rating.id,
        ChangeType::Created,
        ChangeSource::User,
        rating.rated_user_id,
        &rating,
    )
    .await?;

    tx.commit().await?;

    skill_summary::recompute_for_user(
        pool,
        submission.rated_user_id,
        submission.activity_type_id,
        submission.skill_definition_id,
    )
    .await?;

    Ok(rating)
}

pub struct RatingUpdate {
    pub rating_value: i32,
    pub confidence: i32,
    pub comment: Option<String>,
}

/// Updates a rating in place. Only the original author may edit it, and only
/// within [`rating_edit_window`] of its creation.
pub async fn update_rating(
    pool: &PgPool,
    id: Uuid,
    requester_id: Uuid,
    update: RatingUpdate,
) -> Result<UserActivitySkillRating> {
    validation::validate_rating_value(update.rating_value)?;
    validation::validate_confidence(update.confidence)?;
    validation::validate_comment(update.comment.as_deref())?;

    let existing = UserActivitySkillRating::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("skill rating {id} not found")))?;

    if existing.rater_user_id != requester_id {
        return Err(AppError::Unauthorized("only the rating's author may edit it".into()));
    }
    if Utc::now() - existing.created_at > rating_edit_window() {
        return Err(AppError::Conflict("rating can no longer be edited".into()));
    }

    let mut tx = pool.begin().await?;
    let updated = UserActivitySkillRating::update(
        &mut tx,
        id,
        update.rating_value,
        update.confidence,
        update.comment.as_deref(),
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("skill rating {id} not found")))?;

    change_log::record(
        &mut tx,
        EntityType::UserActivitySkillRating,
        updated.id,
        ChangeType::Updated,
        ChangeSource::User,
        updated.rated_user_id,
        &updated,
    )
    .await?;
    tx.commit().await?;

    let activity = crate::models::activity::Activity::find_by_id(pool, updated.activity_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("activity {} not found", updated.activity_id)))?;
    skill_summary::recompute_for_user(pool, updated.rated_user_id, activity.activity_type_id, updated.skill_definition_id)
        .await?;

    Ok(updated)
}

/// Confirms the rated user actually participated in the activity, used by
/// the HTTP layer before calling [`submit_rating`].
pub async fn assert_participated(pool: &PgPool, activity_id: Uuid, user_id: Uuid) -> Result<()> {
    let participants = ActivityParticipant::find_for_activity(pool, activity_id).await?;
    if !participants.iter().any(|p| p.user_id == user_id) {
        return Err(AppError::Validation("user did not participate in this activity".into()));
    }
    Ok(())
}
