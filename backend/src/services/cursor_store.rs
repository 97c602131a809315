//! Per-user delta cursors, behind a trait so the delta reader doesn't
//! depend on Postgres directly. The in-memory implementation backs unit
//! tests; production wiring always uses [`PostgresCursorStore`].

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::delta_cursor::{ClientType, UserDeltaCursor};

#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get_or_create(&self, user_id: Uuid, client_type: ClientType, now: DateTime<Utc>) -> Result<UserDeltaCursor>;

    async fn upsert(&self, cursor: UserDeltaCursor) -> Result<()>;
}

pub struct PostgresCursorStore {
    pool: PgPool,
}

impl PostgresCursorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CursorStore for PostgresCursorStore {
    async fn get_or_create(&self, user_id: Uuid, client_type: ClientType, now: DateTime<Utc>) -> Result<UserDeltaCursor> {
        Ok(UserDeltaCursor::get_or_create(&self.pool, user_id, client_type, now).await?)
    }

    async fn upsert(&self, cursor: UserDeltaCursor) -> Result<()> {
        UserDeltaCursor::upsert(&self.pool, &cursor).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCursorStore {
    cursors: Mutex<HashMap<(Uuid, ClientType), UserDeltaCursor>>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for InMemoryCursorStore {
    async fn get_or_create(&self, user_id: Uuid, client_type: ClientType, now: DateTime<Utc>) -> Result<UserDeltaCursor> {
        let mut cursors = self.cursors.lock().unwrap();
        Ok(cursors
            .entry((user_id, client_type))
            .or_insert_with(|| UserDeltaCursor {
                user_id,
                client_type,
                elo_sequence: 0,
                activity_sequence: 0,
                skill_rating_sequence: 0,
                last_active_at: now,
                last_polled_at: now,
                poll_interval_ms: client_type.base_poll_interval_ms(),
            })
            .clone())
    }

    async fn upsert(&self, cursor: UserDeltaCursor) -> Result<()> {
        self.cursors.lock().unwrap().insert((cursor.user_id, cursor.client_type), cursor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = InMemoryCursorStore::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let created = store.get_or_create(user_id, ClientType::Mobile, now).await.unwrap();
        assert_eq!(created.elo_sequence, 0);

        let mut updated = created;
        updated.elo_sequence = 42;
        updated.poll_interval_ms = 5_000;
        store.upsert(updated).await.unwrap();

        let cursor = store.get_or_create(user_id, ClientType::Mobile, now).await.unwrap();
        assert_eq!(cursor.elo_sequence, 42);
        assert_eq!(cursor.poll_interval_ms, 5_000);
    }

    #[tokio::test]
    async fn unknown_cursor_is_created_at_zero() {
        let store = InMemoryCursorStore::new();
        let cursor = store.get_or_create(Uuid::new_v4(), ClientType::Web, Utc::now()).await.unwrap();
        assert_eq!(cursor.activity_sequence, 0);
    }
}
