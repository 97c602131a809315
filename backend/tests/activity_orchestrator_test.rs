mod common;

use common::fixtures::{add_participants, create_test_activity, create_test_activity_type};
use common::setup::setup_test_db;
use league_backend::models::activity::CompletionStatus;
use league_backend::models::activity_participant::{ActivityParticipant, FinalResult};
use league_backend::models::user_elo::UserActivityTypeElo;
use league_backend::services::activity_orchestrator::complete_activity;
use league_backend::services::elo_lock::{EloLockManager, PostgresEloLockManager};
use uuid::Uuid;

#[tokio::test]
async fn completing_an_activity_updates_elo_and_marks_it_completed() {
    let ctx = setup_test_db().await;
    let activity_type = create_test_activity_type(&ctx.pool, "1v1 Arm Wrestling", false).await;

    let winner = Uuid::new_v4();
    let loser = Uuid::new_v4();
    let activity = create_test_activity(&ctx.pool, activity_type.id, winner).await;
    add_participants(&ctx.pool, activity.id, &[winner, loser]).await;

    ActivityParticipant::set_results_batch(
        &ctx.pool,
        activity.id,
        &[winner, loser],
        &[Some(FinalResult::Win), Some(FinalResult::Loss)],
        &[Some(1), Some(2)],
        &[None, None],
    )
    .await
    .unwrap();

    let lock_manager = PostgresEloLockManager::new(ctx.pool.clone());
    complete_activity(&ctx.pool, &lock_manager, "test-server", activity.id, winner, false, Vec::new()).await.unwrap();

    let updated = league_backend::models::activity::Activity::find_by_id(&ctx.pool, activity.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.completion_status, CompletionStatus::Completed);

    let mut tx = ctx.pool.begin().await.unwrap();
    let elos = UserActivityTypeElo::find_batch_for_update(&mut tx, activity_type.id, &[winner, loser]).await.unwrap();
    tx.rollback().await.unwrap();

    let winner_elo = elos.iter().find(|e| e.user_id == winner).unwrap();
    let loser_elo = elos.iter().find(|e| e.user_id == loser).unwrap();
    assert!(winner_elo.rating > 1200);
    assert!(loser_elo.rating < 1200);
}

#[tokio::test]
async fn completing_an_already_completed_activity_conflicts() {
    let ctx = setup_test_db().await;
    let activity_type = create_test_activity_type(&ctx.pool, "Chess", false).await;

    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let activity = create_test_activity(&ctx.pool, activity_type.id, a).await;
    add_participants(&ctx.pool, activity.id, &[a, b]).await;
    ActivityParticipant::set_results_batch(
        &ctx.pool,
        activity.id,
        &[a, b],
        &[Some(FinalResult::Win), Some(FinalResult::Loss)],
        &[Some(1), Some(2)],
        &[None, None],
    )
    .await
    .unwrap();

    let lock_manager = PostgresEloLockManager::new(ctx.pool.clone());
    complete_activity(&ctx.pool, &lock_manager, "test-server", activity.id, a, false, Vec::new()).await.unwrap();

    let err =
        complete_activity(&ctx.pool, &lock_manager, "test-server", activity.id, a, false, Vec::new()).await.unwrap_err();
    assert!(matches!(err, league_backend::error::AppError::Conflict(_)));
}

#[tokio::test]
async fn only_the_creator_or_an_admin_can_complete_an_activity() {
    let ctx = setup_test_db().await;
    let activity_type = create_test_activity_type(&ctx.pool, "Darts", false).await;

    let creator = Uuid::new_v4();
    let bystander = Uuid::new_v4();
    let activity = create_test_activity(&ctx.pool, activity_type.id, creator).await;
    add_participants(&ctx.pool, activity.id, &[creator, bystander]).await;

    let lock_manager = PostgresEloLockManager::new(ctx.pool.clone());
    let err = complete_activity(&ctx.pool, &lock_manager, "test-server", activity.id, bystander, false, Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, league_backend::error::AppError::Unauthorized(_)));
}

#[tokio::test]
async fn participant_results_must_cover_exactly_the_accepted_roster() {
    let ctx = setup_test_db().await;
    let activity_type = create_test_activity_type(&ctx.pool, "Bowling", false).await;

    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let activity = create_test_activity(&ctx.pool, activity_type.id, a).await;
    add_participants(&ctx.pool, activity.id, &[a, b]).await;

    let lock_manager = PostgresEloLockManager::new(ctx.pool.clone());
    let incomplete_results = vec![league_backend::services::activity_orchestrator::ParticipantResultInput {
        user_id: a,
        final_result: Some(FinalResult::Win),
        position: Some(1),
        performance_notes: None,
    }];

    let err = complete_activity(&ctx.pool, &lock_manager, "test-server", activity.id, a, false, incomplete_results)
        .await
        .unwrap_err();
    assert!(matches!(err, league_backend::error::AppError::Validation(_)));

    let updated = league_backend::models::activity::Activity::find_by_id(&ctx.pool, activity.id).await.unwrap().unwrap();
    assert_eq!(updated.completion_status, CompletionStatus::Scheduled);
}
