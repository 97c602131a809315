pub mod activities;
pub mod delta;
pub mod skill_ratings;
pub mod state;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use crate::middleware::auth::auth_middleware;
use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/activities", post(activities::create_activity))
        .route("/activities/{id}", get(activities::get_activity))
        .route("/activities/{id}/join", post(activities::join_activity))
        .route("/activities/{id}/leave", post(activities::leave_activity))
        .route("/activities/{id}/participants/{participant_id}/respond", axum::routing::put(activities::respond_to_participant))
        .route("/activities/{id}/complete", post(activities::complete_activity))
        .route("/activities/{id}/elo-status", get(activities::get_elo_status))
        .route("/activities/{id}/reprocess-elo", post(activities::reprocess_elo))
        .route("/activities/{id}/balance-teams", post(activities::balance_teams))
        .route("/skill-ratings", post(skill_ratings::submit_rating))
        .route("/skill-ratings/{id}", axum::routing::put(skill_ratings::update_rating))
        .route("/skill-ratings/{id}", axum::routing::delete(skill_ratings::delete_rating))
        .route("/skill-ratings/user/{user_id}", get(skill_ratings::get_skill_summaries))
        .route("/skill-ratings/activity/{activity_id}", get(skill_ratings::get_ratings_for_activity))
        .route("/activity-types/{id}/suspicious-patterns", get(skill_ratings::get_suspicious_patterns))
        .route("/delta", get(delta::poll_delta))
        .route("/delta/status", get(delta::delta_status))
        .route("/delta/reset", post(delta::reset_delta))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
