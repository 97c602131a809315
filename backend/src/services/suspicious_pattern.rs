//! Suspicious-pattern detector. Surfaces findings about peer-rating abuse
//! for a human moderator to review; it never deletes a rating, blocks a
//! user, or otherwise acts on what it finds - that stays a manual action
//! taken through the regular rating-deletion endpoint.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::skill_rating::UserActivitySkillRating;

#[derive(Debug, Clone, PartialEq)]
pub enum SuspicionReason {
    /// Two users rate each other at the extreme of the scale every time,
    /// consistent with vote-trading rather than honest assessment.
    ReciprocalExtremeRatings { rater_a: Uuid, rater_b: Uuid, occurrences: usize },
    /// One rater accounts for an outsized share of a rated user's ratings.
    SingleRaterDominance { rater_user_id: Uuid, rated_user_id: Uuid, share: f64 },
    /// A rater gives the maximum rating to every person they rate, with
    /// enough volume that genuine variance would be expected.
    UniformMaxRater { rater_user_id: Uuid, rating_count: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuspicionFinding {
    pub reason: SuspicionReason,
    /// 0.0 (worth a glance) to 1.0 (near-certain abuse).
    pub severity: f64,
}

const DOMINANCE_SHARE_THRESHOLD: f64 = 0.5;
const DOMINANCE_MIN_RATING_COUNT: usize = 4;
const RECIPROCAL_MIN_OCCURRENCES: usize = 3;
const UNIFORM_MAX_MIN_RATINGS: usize = 5;

/// Pure scan over a set of ratings, grouped by whatever window the caller
/// already scoped (one activity type, one time range, etc).
pub fn detect_patterns(ratings: &[UserActivitySkillRating], max_rating: i32) -> Vec<SuspicionFinding> {
    let mut findings = Vec::new();
    findings.extend(detect_reciprocal_extremes(ratings, max_rating));
    findings.extend(detect_rater_dominance(ratings));
    findings.extend(detect_uniform_max_raters(ratings, max_rating));
    findings
}

fn detect_reciprocal_extremes(ratings: &[UserActivitySkillRating], max_rating: i32) -> Vec<SuspicionFinding> {
    let mut pair_counts: HashMap<(Uuid, Uuid), usize> = HashMap::new();

    for rating in ratings {
        if rating.rating_value != max_rating {
            continue;
        }
        let forward_rated_back = ratings.iter().any(|other| {
            other.rater_user_id == rating.rated_user_id
                && other.rated_user_id == rating.rater_user_id
                && other.rating_value == max_rating
        });
        if forward_rated_back {
            let key = if rating.rater_user_id < rating.rated_user_id {
                (rating.rater_user_id, rating.rated_user_id)
            } else {
                (rating.rated_user_id, rating.rater_user_id)
            };
            *pair_counts.entry(key).or_insert(0) += 1;
        }
    }

    pair_counts
        .into_iter()
        .filter(|(_, count)| *count >= RECIPROCAL_MIN_OCCURRENCES)
        .map(|((a, b), count)| SuspicionFinding {
            reason: SuspicionReason::ReciprocalExtremeRatings { rater_a: a, rater_b: b, occurrences: count },
            severity: (count as f64 / (RECIPROCAL_MIN_OCCURRENCES as f64 * 3.0)).min(1.0),
        })
        .collect()
}

fn detect_rater_dominance(ratings: &[UserActivitySkillRating]) -> Vec<SuspicionFinding> {
    let mut by_rated: HashMap<Uuid, HashMap<Uuid, usize>> = HashMap::new();
    for rating in ratings {
        *by_rated.entry(rating.rated_user_id).or_default().entry(rating.rater_user_id).or_insert(0) += 1;
    }

    let mut findings = Vec::new();
    for (rated_user_id, raters) in by_rated {
        let total: usize = raters.values().sum();
        if total < DOMINANCE_MIN_RATING_COUNT {
            continue;
        }
        for (rater_user_id, count) in raters {
            let share = count as f64 / total as f64;
            if share >= DOMINANCE_SHARE_THRESHOLD {
                findings.push(SuspicionFinding {
                    reason: SuspicionReason::SingleRaterDominance { rater_user_id, rated_user_id, share },
                    severity: share,
                });
            }
        }
    }
    findings
}

fn detect_uniform_max_raters(ratings: &[UserActivitySkillRating], max_rating: i32) -> Vec<SuspicionFinding> {
    let mut by_rater: HashMap<Uuid, Vec<i32>> = HashMap::new();
    for rating in ratings {
        by_rater.entry(rating.rater_user_id).or_default().push(rating.rating_value);
    }

    by_rater
        .into_iter()
        .filter(|(_, values)| values.len() >= UNIFORM_MAX_MIN_RATINGS && values.iter().all(|v| *v == max_rating))
        .map(|(rater_user_id, values)| SuspicionFinding {
            reason: SuspicionReason::UniformMaxRater { rater_user_id, rating_count: values.len() },
            severity: (values.len() as f64 / (UNIFORM_MAX_MIN_RATINGS as f64 * 2.0)).min(1.0),
        })
        .collect()
}

/// Loads every rating for an activity type and runs the detector over it,
/// for the moderator-facing report endpoint.
pub async fn scan_activity_type(
    pool: &PgPool,
    activity_type_id: Uuid,
    max_rating: i32,
) -> Result<Vec<SuspicionFinding>> {
    let ratings: Vec<UserActivitySkillRating> = sqlx::query_as(
        "SELECT r.id, r.activity_id, r.rated_user_id, r.rater_user_id, r.skill_definition_id,
                r.rating_value, r.confidence, r.comment, r.created_at
         FROM user_activity_skill_ratings r
         JOIN activities a ON a.id = r.activity_id
         WHERE a.activity_type_id = $1",
    )
    .bind(activity_type_id)
    .fetch_all(pool)
    .await?;

    Ok(detect_patterns(&ratings, max_rating))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rating(rater: Uuid, rated: Uuid, value: i32) -> UserActivitySkillRating {
        UserActivitySkillRating {
            id: Uuid::new_v4(),
            activity_id: Uuid::new_v4(),
            rated_user_id: rated,
            rater_user_id: rater,
            skill_definition_id: Uuid::new_v4(),
            rating_value: value,
            confidence: 5,
            comment: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn flags_reciprocal_max_ratings() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ratings: Vec<_> = (0..3).flat_map(|_| vec![rating(a, b, 10), rating(b, a, 10)]).collect();
        let findings = detect_patterns(&ratings, 10);
        assert!(findings.iter().any(|f| matches!(f.reason, SuspicionReason::ReciprocalExtremeRatings { .. })));
    }

    #[test]
    fn flags_single_rater_dominance() {
        let dominant_rater = Uuid::new_v4();
        let rated = Uuid::new_v4();
        let mut ratings: Vec<_> = (0..5).map(|_| rating(dominant_rater, rated, 8)).collect();
        ratings.push(rating(Uuid::new_v4(), rated, 6));
        let findings = detect_patterns(&ratings, 10);
        assert!(findings.iter().any(|f| matches!(f.reason, SuspicionReason::SingleRaterDominance { .. })));
    }

    #[test]
    fn honest_varied_ratings_produce_no_findings() {
        let raters: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let rated = Uuid::new_v4();
        let ratings: Vec<_> = raters.iter().enumerate().map(|(i, r)| rating(*r, rated, 5 + (i as i32 % 3))).collect();
        assert!(detect_patterns(&ratings, 10).is_empty());
    }
}
