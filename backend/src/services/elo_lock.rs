//! The distributed lock that serializes ELO processing for a
//! single activity across server instances. The
//! Postgres implementation is row-based (`activity_elo_status.locked_by`);
//! the in-memory implementation exists for unit tests of the orchestrator
//! and never runs in production.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::elo_status::ActivityEloStatus;

/// How long a `processing` lock may be held before it's considered
/// abandoned by a crashed server and eligible for another server to take
/// over.
fn stale_lock_after() -> Duration {
    Duration::minutes(5)
}

#[async_trait]
pub trait EloLockManager: Send + Sync {
    /// Attempts to take the lock for `activity_id`. Returns
    /// [`AppError::ConcurrentCalculation`] if another server already holds it.
    async fn acquire(&self, activity_id: Uuid, server_id: &str) -> Result<()>;

    async fn release_completed(&self, activity_id: Uuid) -> Result<()>;

    async fn release_failed(&self, activity_id: Uuid, error_message: &str) -> Result<()>;
}

pub struct PostgresEloLockManager {
    pool: PgPool,
}

impl PostgresEloLockManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EloLockManager for PostgresEloLockManager {
    async fn acquire(&self, activity_id: Uuid, server_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let acquired =
            ActivityEloStatus::try_acquire(&mut tx, activity_id, server_id, Utc::now(), stale_lock_after()).await?;
        if !acquired {
            return Err(AppError::ConcurrentCalculation);
        }
        tx.commit().await?;
        Ok(())
    }

    async fn release_completed(&self, activity_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        ActivityEloStatus::mark_completed(&mut tx, activity_id, Utc::now()).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn release_failed(&self, activity_id: Uuid, error_message: &str) -> Result<()> {
        ActivityEloStatus::mark_failed(&self.pool, activity_id, error_message).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryEloLockManager {
    locked: Mutex<HashSet<Uuid>>,
}

impl InMemoryEloLockManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EloLockManager for InMemoryEloLockManager {
    async fn acquire(&self, activity_id: Uuid, _server_id: &str) -> Result<()> {
        let mut locked = self.locked.lock().unwrap();
        if !locked.insert(activity_id) {
            return Err(AppError::ConcurrentCalculation);
        }
        Ok(())
    }

    async fn release_completed(&self, activity_id: Uuid) -> Result<()> {
        self.locked.lock().unwrap().remove(&activity_id);
        Ok(())
    }

    async fn release_failed(&self, activity_id: Uuid, _error_message: &str) -> Result<()> {
        self.locked.lock().unwrap().remove(&activity_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_is_rejected_until_released() {
        let locks = InMemoryEloLockManager::new();
        let activity_id = Uuid::new_v4();
        locks.acquire(activity_id, "server-a").await.unwrap();

        let err = locks.acquire(activity_id, "server-b").await.unwrap_err();
        assert!(matches!(err, AppError::ConcurrentCalculation));

        locks.release_completed(activity_id).await.unwrap();
        locks.acquire(activity_id, "server-b").await.unwrap();
    }
}
