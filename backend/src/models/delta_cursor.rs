use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::models::change_log::EntityType;

/// A client polls under one identity; cursors are kept per (user, client_type)
/// so a phone and a browser tab don't race each other's sync position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "client_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Web,
    Mobile,
}

impl ClientType {
    /// Base poll interval before the adaptive tiers in the delta reader
    /// adjust it: mobile clients poll more slowly by default to save battery.
    pub fn base_poll_interval_ms(self) -> i32 {
        match self {
            ClientType::Web => 5_000,
            ClientType::Mobile => 10_000,
        }
    }
}

/// The independently-tracked entity groups a cursor advances separately.
/// Each maps onto one or more [`EntityType`] variants actually written to the
/// change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
    Elo,
    Activity,
    SkillRating,
}

impl EntityClass {
    pub const ALL: [EntityClass; 3] = [EntityClass::Elo, EntityClass::Activity, EntityClass::SkillRating];

    pub fn entity_types(self) -> &'static [EntityType] {
        match self {
            EntityClass::Elo => &[EntityType::UserActivityTypeElo],
            EntityClass::Activity => &[EntityType::Activity, EntityType::ActivityParticipant],
            EntityClass::SkillRating => &[
                EntityType::UserActivitySkillRating,
                EntityType::UserActivityTypeSkillSummary,
                EntityType::UserGeneralSkillSummary,
            ],
        }
    }
}

/// A user's delta-polling position for one client type. Tracks a separate
/// sequence per [`EntityClass`] so a client that only cares about, say, ELO
/// updates doesn't have its cursor dragged backwards by an unrelated burst of
/// skill-rating changes (and vice versa).
#[derive(Debug, Clone, FromRow)]
pub struct UserDeltaCursor {
    pub user_id: Uuid,
    pub client_type: ClientType,
    pub elo_sequence: i64,
    pub activity_sequence: i64,
    pub skill_rating_sequence: i64,
    pub last_active_at: DateTime<Utc>,
    pub last_polled_at: DateTime<Utc>,
    pub poll_interval_ms: i32,
}

impl UserDeltaCursor {
    pub fn sequence_for(&self, class: EntityClass) -> i64 {
        match class {
            EntityClass::Elo => self.elo_sequence,
            EntityClass::Activity => self.activity_sequence,
            EntityClass::SkillRating => self.skill_rating_sequence,
        }
    }

    pub fn set_sequence_for(&mut self, class: EntityClass, sequence: i64) {
        match class {
            EntityClass::Elo => self.elo_sequence = sequence,
            EntityClass::Activity => self.activity_sequence = sequence,
            EntityClass::SkillRating => self.skill_rating_sequence = sequence,
        }
    }

    /// Reads the cursor for `(user_id, client_type)`, creating it at the zero
    /// position if this is the user's first poll under this client type.
    /// Does not itself touch `last_active_at` - callers read the prior value
    /// to compute "hours since active" before writing the post-poll state
    /// back via [`Self::upsert`].
    #[instrument(level = "debug", skip(pool))]
    pub async fn get_or_create(
        pool: &PgPool,
        user_id: Uuid,
        client_type: ClientType,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO user_delta_cursors
                (user_id, client_type, elo_sequence, activity_sequence, skill_rating_sequence,
                 last_active_at, last_polled_at, poll_interval_ms)
             VALUES ($1, $2, 0, 0, 0, $3, $3, $4)
             ON CONFLICT (user_id, client_type) DO UPDATE SET client_type = EXCLUDED.client_type
             RETURNING user_id, client_type, elo_sequence, activity_sequence, skill_rating_sequence,
                       last_active_at, last_polled_at, poll_interval_ms",
        )
        .bind(user_id)
        .bind(client_type)
        .bind(now)
        .bind(client_type.base_poll_interval_ms())
        .fetch_one(pool)
        .await
    }

    /// Writes the full post-poll cursor state back.
    #[instrument(level = "debug", skip(pool, cursor))]
    pub async fn upsert(pool: &PgPool, cursor: &UserDeltaCursor) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_delta_cursors
                (user_id, client_type, elo_sequence, activity_sequence, skill_rating_sequence,
                 last_active_at, last_polled_at, poll_interval_ms)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (user_id, client_type)
             DO UPDATE SET elo_sequence = EXCLUDED.elo_sequence,
                           activity_sequence = EXCLUDED.activity_sequence,
                           skill_rating_sequence = EXCLUDED.skill_rating_sequence,
                           last_active_at = EXCLUDED.last_active_at,
                           last_polled_at = EXCLUDED.last_polled_at,
                           poll_interval_ms = EXCLUDED.poll_interval_ms",
        )
        .bind(cursor.user_id)
        .bind(cursor.client_type)
        .bind(cursor.elo_sequence)
        .bind(cursor.activity_sequence)
        .bind(cursor.skill_rating_sequence)
        .bind(cursor.last_active_at)
        .bind(cursor.last_polled_at)
        .bind(cursor.poll_interval_ms)
        .execute(pool)
        .await?;
        Ok(())
    }
}
