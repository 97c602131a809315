//! Aggregates raw peer ratings into a rolling per-activity-type summary,
//! then rolls those summaries up into a general skill score for skills
//! flagged as general. Runs synchronously after ingest rather than as a
//! queued job, since a single user's rating history is small enough to
//! recompute on every write.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::change_log::{ChangeSource, ChangeType, EntityType};
use crate::models::skill_definition::SkillDefinition;
use crate::models::skill_rating::UserActivitySkillRating;
use crate::models::skill_summary::{RATING_SCALE, Trend, UserActivityTypeSkillSummary, UserGeneralSkillSummary};
use crate::services::change_log;

/// Below this many ratings a newest-half/oldest-half split isn't meaningful;
/// the trend simply holds `Stable` rather than flipping on one new rating.
const MIN_RATINGS_FOR_TREND: usize = 3;

/// A trend is only reported if the newest-half average moved by more than
/// this many points (on the raw 0..10 rating scale) from the oldest-half
/// average; otherwise sampling noise would flip `rising`/`falling` on every
/// single new rating.
const TREND_THRESHOLD: f64 = 0.5;

/// Splits `ratings` (oldest first) into its newest `floor(n/2)` and oldest
/// `ceil(n/2)` halves and compares their averages.
fn classify_trend(ratings: &[i32]) -> Trend {
    if ratings.len() < MIN_RATINGS_FOR_TREND {
        return Trend::Stable;
    }

    let newest_count = ratings.len() / 2;
    let oldest_count = ratings.len() - newest_count;
    let oldest = &ratings[..oldest_count];
    let newest = &ratings[ratings.len() - newest_count..];

    let mean = |values: &[i32]| values.iter().sum::<i32>() as f64 / values.len() as f64;
    let delta = mean(newest) - mean(oldest);

    if delta > TREND_THRESHOLD {
        Trend::Rising
    } else if delta < -TREND_THRESHOLD {
        Trend::Falling
    } else {
        Trend::Stable
    }
}

pub async fn recompute_for_user(
    pool: &PgPool,
    user_id: Uuid,
    activity_type_id: Uuid,
    skill_definition_id: Uuid,
) -> Result<UserActivityTypeSkillSummary> {
    let ratings = UserActivitySkillRating::find_for_user_activity_type(pool, user_id, activity_type_id).await?;
    let relevant: Vec<i32> =
        ratings.iter().filter(|r| r.skill_definition_id == skill_definition_id).map(|r| r.rating_value).collect();

    let rating_count = relevant.len() as i32;
    let new_average = if relevant.is_empty() {
        0.0
    } else {
        relevant.iter().sum::<i32>() as f64 / relevant.len() as f64
    };
    let average_rating = (new_average * RATING_SCALE).round() as i32;
    let trend = classify_trend(&relevant);

    let mut tx = pool.begin().await?;
    let summary = UserActivityTypeSkillSummary::upsert(
        &mut tx,
        user_id,
        activity_type_id,
        skill_definition_id,
        average_rating,
        rating_count,
        trend,
        Utc::now(),
    )
    .await?;

    change_log::record(
        &mut tx,
        EntityType::UserActivityTypeSkillSummary,
        skill_definition_id,
        ChangeType::Updated,
        ChangeSource::System,
        user_id,
        &summary,
    )
    .await?;
    tx.commit().await?;

    if let Some(definition) = SkillDefinition::find_by_id(pool, skill_definition_id).await? {
        if definition.is_general {
            rollup_general_summary(pool, user_id, skill_definition_id).await?;
        }
    }

    Ok(summary)
}

/// Rolls a user's per-activity-type summaries for one skill up into the
/// single general score surfaced on a profile, weighted by each
/// activity type's `rating_count` so a summary backed by many ratings
/// outweighs one backed by a single peer rating. Only called for skills
/// flagged `is_general`.
async fn rollup_general_summary(
    pool: &PgPool,
    user_id: Uuid,
    skill_definition_id: Uuid,
) -> Result<UserGeneralSkillSummary> {
    let per_type = UserActivityTypeSkillSummary::find_all_for_user(pool, user_id).await?;
    let relevant: Vec<_> = per_type.iter().filter(|s| s.skill_definition_id == skill_definition_id).collect();

    let total_weight: i32 = relevant.iter().map(|s| s.rating_count).sum();
    let overall_average = if total_weight == 0 {
        0.0
    } else {
        relevant.iter().map(|s| s.average_rating_decimal() * s.rating_count as f64).sum::<f64>() / total_weight as f64
    };
    let overall_average_scaled = (overall_average * RATING_SCALE).round() as i32;

    let mut tx = pool.begin().await?;
    let summary =
        UserGeneralSkillSummary::upsert(&mut tx, user_id, skill_definition_id, overall_average_scaled, Utc::now())
            .await?;

    change_log::record(
        &mut tx,
        EntityType::UserGeneralSkillSummary,
        skill_definition_id,
        ChangeType::Updated,
        ChangeSource::System,
        user_id,
        &summary,
    )
    .await?;
    tx.commit().await?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fewer_than_three_ratings_is_always_stable() {
        assert_eq!(classify_trend(&[3, 9]), Trend::Stable);
    }

    #[test]
    fn small_moves_are_stable() {
        assert_eq!(classify_trend(&[7, 7, 7, 7]), Trend::Stable);
    }

    #[test]
    fn newest_half_clearly_higher_is_rising() {
        assert_eq!(classify_trend(&[5, 5, 5, 9, 9, 9]), Trend::Rising);
    }

    #[test]
    fn newest_half_clearly_lower_is_falling() {
        assert_eq!(classify_trend(&[9, 9, 9, 5, 5, 5]), Trend::Falling);
    }

    #[test]
    fn odd_count_gives_the_extra_rating_to_the_oldest_half() {
        // 5 ratings: oldest half = first 3, newest half = last 2.
        assert_eq!(classify_trend(&[8, 8, 8, 3, 3]), Trend::Falling);
    }
}
