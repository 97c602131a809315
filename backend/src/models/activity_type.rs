use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

/// K-factor tiers and ELO behaviour for an activity type.
///
/// Stored as `jsonb`; unknown fields round-trip opaquely so future additions
/// don't require a migration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KFactor {
    pub new: i32,
    pub established: i32,
    pub expert: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EloSettings {
    pub starting_elo: i32,
    pub k_factor: KFactor,
    pub provisional_games: i32,
    pub minimum_participants: i32,
    pub team_based: bool,
    pub allow_draws: bool,
    /// 0.0..=1.0 — how much skill-rating feedback nudges the ELO delta.
    pub skill_influence: f64,
}

impl Default for EloSettings {
    /// Fallback used only when an activity type somehow has no settings row;
    /// operators are expected to override these per activity type.
    fn default() -> Self {
        Self {
            starting_elo: 1200,
            k_factor: KFactor {
                new: 40,
                established: 20,
                expert: 10,
            },
            provisional_games: 20,
            minimum_participants: 2,
            team_based: false,
            allow_draws: true,
            skill_influence: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ActivityType {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub is_solo_performable: bool,
    pub elo_settings: Json<EloSettings>,
}

impl ActivityType {
    #[instrument(level = "debug", skip(pool))]
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT id, name, category, is_solo_performable, elo_settings
             FROM activity_types WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    #[instrument(level = "debug", skip(pool))]
    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT id, name, category, is_solo_performable, elo_settings
             FROM activity_types ORDER BY name",
        )
        .fetch_all(pool)
        .await
    }
}
