mod common;

use common::fixtures::{add_participants, create_test_activity, create_test_activity_type, create_test_skill};
use common::setup::setup_test_db;
use league_backend::error::AppError;
use league_backend::models::skill_summary::{Trend, UserActivityTypeSkillSummary};
use league_backend::services::skill_rating_ingest::{RatingSubmission, RatingUpdate, submit_rating, update_rating};
use uuid::Uuid;

async fn link_skill(pool: &sqlx::PgPool, activity_type_id: Uuid, skill_id: Uuid) {
    sqlx::query(
        "INSERT INTO activity_type_skills (activity_type_id, skill_definition_id, is_required)
         VALUES ($1, $2, false)",
    )
    .bind(activity_type_id)
    .bind(skill_id)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn submitting_a_rating_updates_the_rolling_summary() {
    let ctx = setup_test_db().await;
    let activity_type = create_test_activity_type(&ctx.pool, "Trivia Night", false).await;
    let skill = create_test_skill(&ctx.pool, "Teamwork").await;
    link_skill(&ctx.pool, activity_type.id, skill.id).await;

    let rater = Uuid::new_v4();
    let rated = Uuid::new_v4();
    let activity = create_test_activity(&ctx.pool, activity_type.id, rater).await;
    add_participants(&ctx.pool, activity.id, &[rater, rated]).await;

    submit_rating(
        &ctx.pool,
        RatingSubmission {
            activity_id: activity.id,
            rated_user_id: rated,
            rater_user_id: rater,
            skill_definition_id: skill.id,
            activity_type_id: activity_type.id,
            rating_value: 8,
            confidence: 4,
            comment: Some("solid round".to_string()),
            is_anonymous: false,
        },
    )
    .await
    .unwrap();

    let summaries = UserActivityTypeSkillSummary::find_for_user_activity_type(&ctx.pool, rated, activity_type.id)
        .await
        .unwrap();
    let summary = summaries.iter().find(|s| s.skill_definition_id == skill.id).unwrap();
    assert_eq!(summary.rating_count, 1);
    assert_eq!(summary.average_rating, 800);
    assert_eq!(summary.trend, Trend::Stable);
}

#[tokio::test]
async fn cannot_rate_an_unlinked_skill() {
    let ctx = setup_test_db().await;
    let activity_type = create_test_activity_type(&ctx.pool, "Bowling", false).await;
    let unlinked_skill = create_test_skill(&ctx.pool, "Patience").await;

    let rater = Uuid::new_v4();
    let rated = Uuid::new_v4();
    let activity = create_test_activity(&ctx.pool, activity_type.id, rater).await;
    add_participants(&ctx.pool, activity.id, &[rater, rated]).await;

    let err = submit_rating(
        &ctx.pool,
        RatingSubmission {
            activity_id: activity.id,
            rated_user_id: rated,
            rater_user_id: rater,
            skill_definition_id: unlinked_skill.id,
            activity_type_id: activity_type.id,
            rating_value: 5,
            confidence: 3,
            comment: None,
            is_anonymous: false,
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn author_can_update_a_rating_within_the_edit_window() {
    let ctx = setup_test_db().await;
    let activity_type = create_test_activity_type(&ctx.pool, "Trivia Night", false).await;
    let skill = create_test_skill(&ctx.pool, "Teamwork").await;
    link_skill(&ctx.pool, activity_type.id, skill.id).await;

    let rater = Uuid::new_v4();
    let rated = Uuid::new_v4();
    let activity = create_test_activity(&ctx.pool, activity_type.id, rater).await;
    add_participants(&ctx.pool, activity.id, &[rater, rated]).await;

    let rating = submit_rating(
        &ctx.pool,
        RatingSubmission {
            activity_id: activity.id,
            rated_user_id: rated,
            rater_user_id: rater,
            skill_definition_id: skill.id,
            activity_type_id: activity_type.id,
            rating_value: 6,
            confidence: 3,
            comment: None,
            is_anonymous: false,
        },
    )
    .await
    .unwrap();

    let updated = update_rating(
        &ctx.pool,
        rating.id,
        rater,
        RatingUpdate { rating_value: 9, confidence: 5, comment: Some("revised".to_string()) },
    )
    .await
    .unwrap();

    assert_eq!(updated.rating_value, 9);
    assert_eq!(updated.comment.as_deref(), Some("revised"));
}

#[tokio::test]
async fn non_author_cannot_update_a_rating() {
    let ctx = setup_test_db().await;
    let activity_type = create_test_activity_type(&ctx.pool, "Trivia Night", false).await;
    let skill = create_test_skill(&ctx.pool, "Teamwork").await;
    link_skill(&ctx.pool, activity_type.id, skill.id).await;

    let rater = Uuid::new_v4();
    let rated = Uuid::new_v4();
    let activity = create_test_activity(&ctx.pool, activity_type.id, rater).await;
    add_participants(&ctx.pool, activity.id, &[rater, rated]).await;

    let rating = submit_rating(
        &ctx.pool,
        RatingSubmission {
            activity_id: activity.id,
            rated_user_id: rated,
            rater_user_id: rater,
            skill_definition_id: skill.id,
            activity_type_id: activity_type.id,
            rating_value: 6,
            confidence: 3,
            comment: None,
            is_anonymous: false,
        },
    )
    .await
    .unwrap();

    let someone_else = Uuid::new_v4();
    let err = update_rating(
        &ctx.pool,
        rating.id,
        someone_else,
        RatingUpdate { rating_value: 9, confidence: 5, comment: None },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn rating_past_the_edit_window_cannot_be_updated() {
    let ctx = setup_test_db().await;
    let activity_type = create_test_activity_type(&ctx.pool, "Trivia Night", false).await;
    let skill = create_test_skill(&ctx.pool, "Teamwork").await;
    link_skill(&ctx.pool, activity_type.id, skill.id).await;

    let rater = Uuid::new_v4();
    let rated = Uuid::new_v4();
    let activity = create_test_activity(&ctx.pool, activity_type.id, rater).await;
    add_participants(&ctx.pool, activity.id, &[rater, rated]).await;

    let rating = submit_rating(
        &ctx.pool,
        RatingSubmission {
            activity_id: activity.id,
            rated_user_id: rated,
            rater_user_id: rater,
            skill_definition_id: skill.id,
            activity_type_id: activity_type.id,
            rating_value: 6,
            confidence: 3,
            comment: None,
            is_anonymous: false,
        },
    )
    .await
    .unwrap();

    sqlx::query("UPDATE user_activity_skill_ratings SET created_at = created_at - INTERVAL '2 hours' WHERE id = $1")
        .bind(rating.id)
        .execute(&ctx.pool)
        .await
        .unwrap();

    let err = update_rating(
        &ctx.pool,
        rating.id,
        rater,
        RatingUpdate { rating_value: 9, confidence: 5, comment: None },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
}
