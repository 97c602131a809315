use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{AppError, Result};
use crate::http::state::AppState;
use crate::models::activity::Activity;
use crate::models::activity_participant::{ActivityParticipant, ParticipantStatus};
use crate::models::change_log::{ChangeSource, ChangeType, EntityType};
use crate::models::elo_status::ActivityEloStatus;
use crate::services::activity_orchestrator;
use crate::services::change_log;
use crate::services::team_balance::{self, RatedUser};

#[derive(Debug, Deserialize)]
pub struct CreateActivityRequest {
    pub activity_type_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub participant_user_ids: Vec<Uuid>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub max_participants: Option<i32>,
    #[serde(default)]
    pub elo_level: Option<i32>,
    #[serde(default = "default_is_elo_rated")]
    pub is_elo_rated: bool,
}

fn default_is_elo_rated() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub activity: Activity,
    pub participants: Vec<ActivityParticipant>,
}

pub async fn create_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<Option<AuthContext>>,
    Json(body): Json<CreateActivityRequest>,
) -> Result<Response> {
    let auth = auth.ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    if body.participant_user_ids.is_empty() {
        return Err(AppError::Validation("participant_user_ids must not be empty".into()));
    }

    let activity = Activity::insert(
        &state.pool,
        body.activity_type_id,
        body.scheduled_at,
        auth.user_id,
        crate::models::activity::NewActivity {
            description: body.description,
            max_participants: body.max_participants,
            elo_level: body.elo_level,
            is_elo_rated: body.is_elo_rated,
        },
    )
    .await?;
    let mut invited = body.participant_user_ids.clone();
    if !invited.contains(&auth.user_id) {
        invited.push(auth.user_id);
    }
    let participants = ActivityParticipant::insert_batch(&state.pool, activity.id, auth.user_id, &invited).await?;

    Ok((StatusCode::CREATED, Json(ActivityResponse { activity, participants })).into_response())
}

pub async fn join_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<Option<AuthContext>>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let auth = auth.ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    let activity = Activity::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("activity {id} not found")))?;
    if activity.completion_status != crate::models::activity::CompletionStatus::Scheduled {
        return Err(AppError::Conflict(format!("activity {id} is no longer accepting participants")));
    }
    if ActivityParticipant::find_one(&state.pool, id, auth.user_id).await?.is_some() {
        return Err(AppError::Conflict("already requested or joined this activity".into()));
    }
    if let Some(max) = activity.max_participants {
        let accepted = ActivityParticipant::find_for_activity(&state.pool, id)
            .await?
            .iter()
            .filter(|p| p.status == ParticipantStatus::Accepted)
            .count();
        if accepted >= max as usize {
            return Err(AppError::Conflict(format!("activity {id} is full")));
        }
    }

    let participant = ActivityParticipant::join(&state.pool, id, auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(participant)).into_response())
}

pub async fn leave_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<Option<AuthContext>>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let auth = auth.ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    let activity = Activity::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("activity {id} not found")))?;
    if activity.completion_status == crate::models::activity::CompletionStatus::Completed {
        return Err(AppError::Conflict(format!("activity {id} has already completed")));
    }

    let removed = ActivityParticipant::remove(&state.pool, id, auth.user_id).await?;
    if removed == 0 {
        return Err(AppError::NotFound("you are not a participant of this activity".into()));
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Debug, Deserialize)]
pub struct RespondToParticipantRequest {
    pub status: ParticipantStatus,
}

pub async fn respond_to_participant(
    State(state): State<AppState>,
    Extension(auth): Extension<Option<AuthContext>>,
    Path((id, participant_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<RespondToParticipantRequest>,
) -> Result<Response> {
    let auth = auth.ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    let activity = Activity::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("activity {id} not found")))?;
    if activity.created_by != auth.user_id {
        return Err(AppError::Unauthorized("only the creator can respond to join requests".into()));
    }

    let mut tx = state.pool.begin().await?;
    let participant = ActivityParticipant::set_status(&mut tx, id, participant_id, body.status)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("participant {participant_id} not found on activity {id}")))?;
    change_log::record(
        &mut tx,
        EntityType::ActivityParticipant,
        participant.id,
        ChangeType::Updated,
        ChangeSource::User,
        participant.user_id,
        &participant,
    )
    .await?;
    tx.commit().await?;
    Ok(Json(participant).into_response())
}

#[derive(Debug, Serialize)]
pub struct EloStatusResponse {
    pub status: Option<ActivityEloStatus>,
}

pub async fn get_elo_status(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response> {
    Activity::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("activity {id} not found")))?;
    let status = ActivityEloStatus::find(&state.pool, id).await?;
    Ok(Json(EloStatusResponse { status }).into_response())
}

pub async fn reprocess_elo(
    State(state): State<AppState>,
    Extension(auth): Extension<Option<AuthContext>>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let auth = auth.ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;
    let activity = Activity::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("activity {id} not found")))?;
    if activity.created_by != auth.user_id && !auth.is_admin() {
        return Err(AppError::Unauthorized("only the creator or an admin can reprocess ELO".into()));
    }

    activity_orchestrator::reprocess_elo(&state.pool, state.lock_manager.as_ref(), &state.config.server_id, id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn get_activity(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response> {
    let activity = Activity::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("activity {id} not found")))?;
    let participants = ActivityParticipant::find_for_activity(&state.pool, id).await?;
    Ok(Json(ActivityResponse { activity, participants }).into_response())
}

#[derive(Debug, Deserialize)]
pub struct ParticipantResult {
    pub user_id: Uuid,
    pub final_result: Option<crate::models::activity_participant::FinalResult>,
    pub position: Option<i32>,
    #[serde(default)]
    pub performance_notes: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CompleteActivityRequest {
    #[serde(default)]
    pub participant_results: Vec<ParticipantResult>,
}

pub async fn complete_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<Option<AuthContext>>,
    Path(id): Path<Uuid>,
    body: Option<Json<CompleteActivityRequest>>,
) -> Result<Response> {
    let auth = auth.ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    let results = body.map(|Json(b)| b.participant_results).unwrap_or_default();
    let participant_results = results
        .into_iter()
        .map(|r| crate::services::activity_orchestrator::ParticipantResultInput {
            user_id: r.user_id,
            final_result: r.final_result,
            position: r.position,
            performance_notes: r.performance_notes,
        })
        .collect();

    activity_orchestrator::complete_activity(
        &state.pool,
        state.lock_manager.as_ref(),
        &state.config.server_id,
        id,
        auth.user_id,
        auth.is_admin(),
        participant_results,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Debug, Deserialize)]
pub struct BalanceTeamsRequest {
    pub team_count: usize,
}

#[derive(Debug, Serialize)]
pub struct BalanceTeamsResponse {
    pub assignments: Vec<TeamAssignmentResponse>,
}

#[derive(Debug, Serialize)]
pub struct TeamAssignmentResponse {
    pub user_id: Uuid,
    pub team_index: usize,
}

pub async fn balance_teams(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<BalanceTeamsRequest>,
) -> Result<Response> {
    let activity = Activity::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("activity {id} not found")))?;

    let ratings = sqlx::query_as::<_, (Uuid, i32)>(
        "SELECT p.user_id, COALESCE(e.rating, 1200)
         FROM activity_participants p
         LEFT JOIN user_activity_type_elo e
           ON e.user_id = p.user_id AND e.activity_type_id = $2
         WHERE p.activity_id = $1",
    )
    .bind(id)
    .bind(activity.activity_type_id)
    .fetch_all(&state.pool)
    .await?;

    let users: Vec<RatedUser> = ratings.into_iter().map(|(user_id, rating)| RatedUser { user_id, rating }).collect();
    let assignments = team_balance::balance_teams(&users, body.team_count)?;

    let team_uuids: Vec<Uuid> = (0..body.team_count).map(|_| Uuid::new_v4()).collect();
    let user_ids: Vec<Uuid> = assignments.iter().map(|a| a.user_id).collect();
    let team_ids: Vec<Uuid> = assignments.iter().map(|a| team_uuids[a.team_index]).collect();
    ActivityParticipant::assign_teams_batch(&state.pool, id, &user_ids, &team_ids).await?;

    Ok(Json(BalanceTeamsResponse {
        assignments: assignments
            .into_iter()
            .map(|a| TeamAssignmentResponse { user_id: a.user_id, team_index: a.team_index })
            .collect(),
    })
    .into_response())
}
