mod common;

use common::setup::setup_test_db;
use league_backend::models::change_log::{ChangeSource, ChangeType, EntityChangeLog, EntityType, NewChange};
use league_backend::models::delta_cursor::{ClientType, EntityClass};
use league_backend::services::cursor_store::{CursorStore, PostgresCursorStore};
use league_backend::services::delta_reader::{read_delta, DEFAULT_LIMIT};
use uuid::Uuid;

async fn append_change(
    pool: &sqlx::PgPool,
    entity_type: EntityType,
    affected_user_id: Uuid,
) -> i64 {
    let mut tx = pool.begin().await.unwrap();
    let sequence = EntityChangeLog::append(
        &mut tx,
        NewChange {
            entity_type,
            entity_id: Uuid::new_v4(),
            change_type: ChangeType::Created,
            source: ChangeSource::User,
            affected_user_id,
            payload: serde_json::json!({"ok": true}),
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    sequence
}

#[tokio::test]
async fn second_poll_only_sees_changes_after_the_first_cursor() {
    let ctx = setup_test_db().await;
    let cursor_store = PostgresCursorStore::new(ctx.pool.clone());
    let user_id = Uuid::new_v4();

    append_change(&ctx.pool, EntityType::Activity, user_id).await;

    let first_page =
        read_delta(&ctx.pool, &cursor_store, user_id, ClientType::Mobile, None, None, DEFAULT_LIMIT).await.unwrap();
    assert_eq!(first_page.changes.len(), 1);

    let second_page =
        read_delta(&ctx.pool, &cursor_store, user_id, ClientType::Mobile, None, None, DEFAULT_LIMIT).await.unwrap();
    assert!(second_page.changes.is_empty());
}

#[tokio::test]
async fn a_change_is_never_delivered_to_a_different_user() {
    let ctx = setup_test_db().await;
    let cursor_store = PostgresCursorStore::new(ctx.pool.clone());
    let owner = Uuid::new_v4();
    let bystander = Uuid::new_v4();

    append_change(&ctx.pool, EntityType::Activity, owner).await;

    let page =
        read_delta(&ctx.pool, &cursor_store, bystander, ClientType::Mobile, None, None, DEFAULT_LIMIT).await.unwrap();
    assert!(page.changes.is_empty());
}

#[tokio::test]
async fn web_and_mobile_cursors_for_the_same_user_are_independent() {
    let ctx = setup_test_db().await;
    let cursor_store = PostgresCursorStore::new(ctx.pool.clone());
    let user_id = Uuid::new_v4();

    append_change(&ctx.pool, EntityType::Activity, user_id).await;

    read_delta(&ctx.pool, &cursor_store, user_id, ClientType::Web, None, None, DEFAULT_LIMIT).await.unwrap();
    let mobile_page =
        read_delta(&ctx.pool, &cursor_store, user_id, ClientType::Mobile, None, None, DEFAULT_LIMIT).await.unwrap();
    assert_eq!(mobile_page.changes.len(), 1);
}

#[tokio::test]
async fn filtering_to_one_entity_class_leaves_the_others_cursor_untouched() {
    let ctx = setup_test_db().await;
    let cursor_store = PostgresCursorStore::new(ctx.pool.clone());
    let user_id = Uuid::new_v4();

    append_change(&ctx.pool, EntityType::UserActivityTypeElo, user_id).await;
    append_change(&ctx.pool, EntityType::Activity, user_id).await;

    let elo_only = read_delta(
        &ctx.pool,
        &cursor_store,
        user_id,
        ClientType::Web,
        None,
        Some(vec![EntityClass::Elo]),
        DEFAULT_LIMIT,
    )
    .await
    .unwrap();
    assert_eq!(elo_only.changes.len(), 1);
    assert_eq!(elo_only.changes[0].entity_type, EntityType::UserActivityTypeElo);

    let activity_only = read_delta(
        &ctx.pool,
        &cursor_store,
        user_id,
        ClientType::Web,
        None,
        Some(vec![EntityClass::Activity]),
        DEFAULT_LIMIT,
    )
    .await
    .unwrap();
    assert_eq!(activity_only.changes.len(), 1);
    assert_eq!(activity_only.changes[0].entity_type, EntityType::Activity);
}

#[tokio::test]
async fn since_raises_the_bound_but_never_moves_it_backward() {
    let ctx = setup_test_db().await;
    let cursor_store = PostgresCursorStore::new(ctx.pool.clone());
    let user_id = Uuid::new_v4();

    let first_sequence = append_change(&ctx.pool, EntityType::Activity, user_id).await;
    append_change(&ctx.pool, EntityType::Activity, user_id).await;

    let page = read_delta(
        &ctx.pool,
        &cursor_store,
        user_id,
        ClientType::Web,
        Some(first_sequence),
        None,
        DEFAULT_LIMIT,
    )
    .await
    .unwrap();
    assert_eq!(page.changes.len(), 1);

    let page_with_stale_since = read_delta(
        &ctx.pool,
        &cursor_store,
        user_id,
        ClientType::Web,
        Some(0),
        None,
        DEFAULT_LIMIT,
    )
    .await
    .unwrap();
    assert!(page_with_stale_since.changes.is_empty());
}

#[tokio::test]
async fn resetting_a_cursor_to_the_latest_sequence_skips_past_changes() {
    let ctx = setup_test_db().await;
    let cursor_store = PostgresCursorStore::new(ctx.pool.clone());
    let user_id = Uuid::new_v4();

    append_change(&ctx.pool, EntityType::Activity, user_id).await;

    let latest =
        EntityChangeLog::latest_sequence_for(&ctx.pool, EntityClass::Activity.entity_types()).await.unwrap();
    let now = chrono::Utc::now();
    let mut cursor = cursor_store.get_or_create(user_id, ClientType::Mobile, now).await.unwrap();
    cursor.set_sequence_for(EntityClass::Activity, latest);
    cursor_store.upsert(cursor).await.unwrap();

    let page =
        read_delta(&ctx.pool, &cursor_store, user_id, ClientType::Mobile, None, None, DEFAULT_LIMIT).await.unwrap();
    assert!(page.changes.is_empty());
}
