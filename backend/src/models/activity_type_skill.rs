use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

/// Which skills are tracked for an activity type, and whether each is
/// required at ingest time.
#[derive(Debug, Clone, FromRow)]
pub struct ActivityTypeSkill {
    pub activity_type_id: Uuid,
    pub skill_definition_id: Uuid,
    pub is_required: bool,
}

impl ActivityTypeSkill {
    #[instrument(level = "debug", skip(pool))]
    pub async fn find_for_activity_type(
        pool: &PgPool,
        activity_type_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT activity_type_id, skill_definition_id, is_required
             FROM activity_type_skills WHERE activity_type_id = $1",
        )
        .bind(activity_type_id)
        .fetch_all(pool)
        .await
    }
}
