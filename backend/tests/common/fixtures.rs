use chrono::Utc;
use league_backend::models::activity::Activity;
use league_backend::models::activity_participant::ActivityParticipant;
use league_backend::models::activity_type::{ActivityType, EloSettings, KFactor};
use league_backend::models::skill_definition::{SkillDefinition, SkillType};
use sqlx::PgPool;
use uuid::Uuid;

pub fn default_elo_settings(team_based: bool) -> EloSettings {
    EloSettings {
        starting_elo: 1200,
        k_factor: KFactor { new: 40, established: 20, expert: 10 },
        provisional_games: 10,
        minimum_participants: 2,
        team_based,
        allow_draws: true,
        skill_influence: 0.2,
    }
}

pub async fn create_test_activity_type(pool: &PgPool, name: &str, team_based: bool) -> ActivityType {
    let settings = default_elo_settings(team_based);
    sqlx::query_as::<_, ActivityType>(
        "INSERT INTO activity_types (name, category, is_solo_performable, elo_settings)
         VALUES ($1, 'general', false, $2)
         RETURNING id, name, category, is_solo_performable, elo_settings",
    )
    .bind(name)
    .bind(sqlx::types::Json(settings))
    .fetch_one(pool)
    .await
    .expect("failed to create test activity type")
}

pub async fn create_test_skill(pool: &PgPool, name: &str) -> SkillDefinition {
    create_test_skill_with_generality(pool, name, false).await
}

pub async fn create_test_skill_with_generality(pool: &PgPool, name: &str, is_general: bool) -> SkillDefinition {
    sqlx::query_as::<_, SkillDefinition>(
        "INSERT INTO skill_definitions (name, description, skill_type, is_general)
         VALUES ($1, '', $2, $3)
         RETURNING id, name, description, skill_type, is_general",
    )
    .bind(name)
    .bind(SkillType::PeerRated)
    .bind(is_general)
    .fetch_one(pool)
    .await
    .expect("failed to create test skill")
}

pub async fn create_test_activity(pool: &PgPool, activity_type_id: Uuid, created_by: Uuid) -> Activity {
    Activity::insert(
        pool,
        activity_type_id,
        Utc::now(),
        created_by,
        league_backend::models::activity::NewActivity { is_elo_rated: true, ..Default::default() },
    )
    .await
    .expect("failed to create test activity")
}

/// Adds participants who have already accepted, the state the ELO pipeline
/// and skill-rating ingest expect to operate on.
pub async fn add_participants(pool: &PgPool, activity_id: Uuid, user_ids: &[Uuid]) -> Vec<ActivityParticipant> {
    sqlx::query_as::<_, ActivityParticipant>(
        "INSERT INTO activity_participants (activity_id, user_id, status)
         SELECT $1, u.user_id, 'accepted'
         FROM UNNEST($2::uuid[]) AS u(user_id)
         ON CONFLICT (activity_id, user_id) DO NOTHING
         RETURNING id, activity_id, user_id, team_id, status, final_result, position, performance_notes",
    )
    .bind(activity_id)
    .bind(user_ids)
    .fetch_all(pool)
    .await
    .expect("failed to add test participants")
}
