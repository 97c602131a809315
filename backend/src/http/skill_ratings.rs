use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{AppError, Result};
use crate::http::state::AppState;
use crate::models::skill_rating::UserActivitySkillRating;
use crate::models::skill_summary::{UserActivityTypeSkillSummary, UserGeneralSkillSummary};
use crate::services::skill_rating_ingest::{self, RatingSubmission, RatingUpdate};
use crate::services::suspicious_pattern::{self, SuspicionFinding};

#[derive(Debug, Deserialize)]
pub struct SubmitRatingRequest {
    pub activity_id: Uuid,
    pub rated_user_id: Uuid,
    pub skill_definition_id: Uuid,
    pub activity_type_id: Uuid,
    pub rating_value: i32,
    pub confidence: i32,
    pub comment: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

pub async fn submit_rating(
    State(state): State<AppState>,
    Extension(auth): Extension<Option<AuthContext>>,
    Json(body): Json<SubmitRatingRequest>,
) -> Result<Response> {
    let auth = auth.ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    skill_rating_ingest::assert_participated(&state.pool, body.activity_id, body.rated_user_id).await?;
    skill_rating_ingest::assert_participated(&state.pool, body.activity_id, auth.user_id).await?;

    let rating = skill_rating_ingest::submit_rating(
        &state.pool,
        RatingSubmission {
            activity_id: body.activity_id,
            rated_user_id: body.rated_user_id,
            rater_user_id: auth.user_id,
            skill_definition_id: body.skill_definition_id,
            activity_type_id: body.activity_type_id,
            rating_value: body.rating_value,
            confidence: body.confidence,
            comment: body.comment,
            is_anonymous: body.is_anonymous,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(rating)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct UpdateRatingRequest {
    pub rating_value: i32,
    pub confidence: i32,
    pub comment: Option<String>,
}

pub async fn update_rating(
    State(state): State<AppState>,
    Extension(auth): Extension<Option<AuthContext>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRatingRequest>,
) -> Result<Response> {
    let auth = auth.ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    let rating = skill_rating_ingest::update_rating(
        &state.pool,
        id,
        auth.user_id,
        RatingUpdate { rating_value: body.rating_value, confidence: body.confidence, comment: body.comment },
    )
    .await?;

    Ok(Json(rating).into_response())
}

#[derive(Debug, Serialize)]
pub struct ActivityRatingsResponse {
    pub ratings: Vec<UserActivitySkillRating>,
}

pub async fn get_ratings_for_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<Option<AuthContext>>,
    Path(activity_id): Path<Uuid>,
) -> Result<Response> {
    let auth = auth.ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    let activity = crate::models::activity::Activity::find_by_id(&state.pool, activity_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("activity {activity_id} not found")))?;

    let is_participant = crate::models::activity_participant::ActivityParticipant::find_for_activity(&state.pool, activity_id)
        .await?
        .iter()
        .any(|p| p.user_id == auth.user_id);
    if activity.created_by != auth.user_id && !is_participant && !auth.is_admin() {
        return Err(AppError::Unauthorized("only participants and the creator may view ratings for this activity".into()));
    }

    let ratings = UserActivitySkillRating::find_for_activity(&state.pool, activity_id).await?;
    Ok(Json(ActivityRatingsResponse { ratings }).into_response())
}

pub async fn delete_rating(
    State(state): State<AppState>,
    Extension(auth): Extension<Option<AuthContext>>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let auth = auth.ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    let mut tx = state.pool.begin().await?;
    let deleted = UserActivitySkillRating::delete(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("skill rating {id} not found")))?;

    if deleted.rater_user_id != auth.user_id && !auth.is_admin() {
        return Err(AppError::Unauthorized("cannot delete another user's rating".into()));
    }
    if !auth.is_admin() && chrono::Utc::now() - deleted.created_at > chrono::Duration::hours(24) {
        return Err(AppError::Conflict("rating can only be deleted within 24 hours by its author".into()));
    }

    crate::services::change_log::record(
        &mut tx,
        crate::models::change_log::EntityType::UserActivitySkillRating,
        deleted.id,
        crate::models::change_log::ChangeType::Deleted,
        crate::models::change_log::ChangeSource::User,
        deleted.rated_user_id,
        &deleted,
    )
    .await?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Debug, Serialize)]
pub struct SkillSummaryResponse {
    pub per_activity_type: Vec<UserActivityTypeSkillSummary>,
    pub general: Vec<UserGeneralSkillSummary>,
}

pub async fn get_skill_summaries(State(state): State<AppState>, Path(user_id): Path<Uuid>) -> Result<Response> {
    let per_activity_type = UserActivityTypeSkillSummary::find_all_for_user(&state.pool, user_id).await?;
    let general = UserGeneralSkillSummary::find_for_user(&state.pool, user_id).await?;
    Ok(Json(SkillSummaryResponse { per_activity_type, general }).into_response())
}

#[derive(Debug, Serialize)]
pub struct SuspiciousPatternsResponse {
    pub findings: Vec<SuspicionFindingResponse>,
}

#[derive(Debug, Serialize)]
pub struct SuspicionFindingResponse {
    pub description: String,
    pub severity: f64,
}

impl From<SuspicionFinding> for SuspicionFindingResponse {
    fn from(finding: SuspicionFinding) -> Self {
        Self { description: format!("{:?}", finding.reason), severity: finding.severity }
    }
}

const RATING_SCALE_MAX: i32 = 10;

pub async fn get_suspicious_patterns(
    State(state): State<AppState>,
    Extension(auth): Extension<Option<AuthContext>>,
    Path(activity_type_id): Path<Uuid>,
) -> Result<Response> {
    let auth = auth.ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;
    if !auth.is_admin() {
        return Err(AppError::Unauthorized("only admins may view moderation findings".into()));
    }

    let findings = suspicious_pattern::scan_activity_type(&state.pool, activity_type_id, RATING_SCALE_MAX).await?;
    Ok(Json(SuspiciousPatternsResponse {
        findings: findings.into_iter().map(Into::into).collect(),
    })
    .into_response())
}
