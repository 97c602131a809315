use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

/// Whether a skill is rated by peers after an activity or self-reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "skill_type", rename_all = "snake_case")]
pub enum SkillType {
    PeerRated,
    SelfReported,
}

#[derive(Debug, Clone, FromRow)]
pub struct SkillDefinition {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub skill_type: SkillType,
    /// Whether this skill rolls up into a user's general skill summary
    /// across all activity types, versus staying scoped to each one.
    pub is_general: bool,
}

impl SkillDefinition {
    #[instrument(level = "debug", skip(pool))]
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT id, name, description, skill_type, is_general FROM skill_definitions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    #[instrument(level = "debug", skip(pool))]
    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT id, name, description, skill_type, is_general FROM skill_definitions ORDER BY name",
        )
        .fetch_all(pool)
        .await
    }
}
