//! Writes change-log rows alongside the write that caused them,
//! always inside the same transaction so a crash can never produce a write
//! with no corresponding delta entry.

use serde::Serialize;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::Result;
use crate::models::change_log::{ChangeSource, ChangeType, EntityChangeLog, EntityType, NewChange};

pub async fn record<T: Serialize>(
    tx: &mut Transaction<'_, Postgres>,
    entity_type: EntityType,
    entity_id: Uuid,
    change_type: ChangeType,
    source: ChangeSource,
    affected_user_id: Uuid,
    payload: &T,
) -> Result<i64> {
    let payload = serde_json::to_value(payload).map_err(|e| {
        crate::error::AppError::Internal(format!("failed to serialize change-log payload: {e}"))
    })?;
    let sequence = EntityChangeLog::append(
        tx,
        NewChange { entity_type, entity_id, change_type, source, affected_user_id, payload },
    )
    .await?;
    Ok(sequence)
}
