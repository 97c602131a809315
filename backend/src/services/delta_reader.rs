//! Serves a page of changes after a client's cursor and picks
//! the next poll interval adaptively, so idle clients back off and active
//! ones get polled tighter.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::change_log::EntityChangeLog;
use crate::models::delta_cursor::{ClientType, EntityClass};
use crate::services::cursor_store::CursorStore;

/// Hard ceiling on a single page, independent of whatever the caller asked
/// for.
pub const MAX_LIMIT: i64 = 100;
pub const DEFAULT_LIMIT: i64 = 50;
const MIN_POLL_INTERVAL_MS: i32 = 2_000;

pub struct DeltaPage {
    pub changes: Vec<EntityChangeLog>,
    pub next_poll_interval_ms: i32,
}

/// Busy clients (more than 5 changes this page) poll again quickly; clients
/// with a handful of changes poll at the base rate; idle clients back off in
/// proportion to how long they've been away, then return to base once active
/// again.
pub fn adaptive_poll_interval(base_ms: i32, change_count: usize, hours_since_active: f64) -> i32 {
    let interval = if change_count > 5 {
        (base_ms / 2).max(MIN_POLL_INTERVAL_MS)
    } else if change_count > 2 {
        base_ms
    } else if hours_since_active > 4.0 {
        base_ms * 4
    } else if hours_since_active > 1.0 {
        base_ms * 2
    } else {
        base_ms
    };
    interval.max(MIN_POLL_INTERVAL_MS)
}

/// Reads one delta page for `user_id`/`client_type`.
///
/// `since`, when given, raises the effective lower bound for every requested
/// class beyond whatever the stored cursor already has (it can only move a
/// class forward, never back). `entity_classes` narrows which classes are
/// polled at all; `None` means all of them. `limit` is clamped to
/// [`MAX_LIMIT`].
pub async fn read_delta(
    pool: &PgPool,
    cursor_store: &dyn CursorStore,
    user_id: Uuid,
    client_type: ClientType,
    since: Option<i64>,
    entity_classes: Option<Vec<EntityClass>>,
    limit: i64,
) -> Result<DeltaPage> {
    let now = Utc::now();
    let cursor = cursor_store.get_or_create(user_id, client_type, now).await?;
    let classes: Vec<EntityClass> = entity_classes.unwrap_or_else(|| EntityClass::ALL.to_vec());
    let limit = limit.clamp(1, MAX_LIMIT);

    let effective_bounds: Vec<(EntityClass, i64)> = classes
        .iter()
        .map(|&class| {
            let cursor_bound = cursor.sequence_for(class);
            let bound = match since {
                Some(s) => s.max(cursor_bound),
                None => cursor_bound,
            };
            (class, bound)
        })
        .collect();

    let oldest_bound = effective_bounds.iter().map(|(_, bound)| *bound).min().unwrap_or(0);
    let entity_types: Vec<_> = classes.iter().flat_map(|c| c.entity_types().iter().copied()).collect();

    let rows = EntityChangeLog::find_after(pool, user_id, &entity_types, oldest_bound, limit).await?;

    let changes: Vec<EntityChangeLog> = rows
        .into_iter()
        .filter(|row| {
            let class = row.entity_type.entity_class();
            let bound = effective_bounds.iter().find(|(c, _)| *c == class).map(|(_, b)| *b).unwrap_or(0);
            row.sequence > bound
        })
        .collect();

    let mut new_cursor = cursor.clone();
    for &(class, _) in &effective_bounds {
        if let Some(max_seq) =
            changes.iter().filter(|c| c.entity_type.entity_class() == class).map(|c| c.sequence).max()
        {
            new_cursor.set_sequence_for(class, max_seq);
        }
    }

    let hours_since_active = (now - cursor.last_active_at).num_seconds().max(0) as f64 / 3600.0;
    let base = client_type.base_poll_interval_ms();
    let next_interval = adaptive_poll_interval(base, changes.len(), hours_since_active);

    new_cursor.last_active_at = now;
    new_cursor.last_polled_at = now;
    new_cursor.poll_interval_ms = next_interval;
    cursor_store.upsert(new_cursor).await?;

    Ok(DeltaPage { changes, next_poll_interval_ms: next_interval })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_client_polls_at_half_the_base_interval() {
        assert_eq!(adaptive_poll_interval(5_000, 6, 0.0), 2_500);
        assert_eq!(adaptive_poll_interval(2_000, 6, 0.0), MIN_POLL_INTERVAL_MS);
    }

    #[test]
    fn moderate_activity_polls_at_the_base_interval() {
        assert_eq!(adaptive_poll_interval(5_000, 3, 0.0), 5_000);
    }

    #[test]
    fn long_idle_client_backs_off_by_four() {
        assert_eq!(adaptive_poll_interval(5_000, 0, 5.0), 20_000);
    }

    #[test]
    fn short_idle_client_backs_off_by_two() {
        assert_eq!(adaptive_poll_interval(5_000, 0, 2.0), 10_000);
    }

    #[test]
    fn freshly_active_client_polls_at_the_base_interval() {
        assert_eq!(adaptive_poll_interval(5_000, 0, 0.2), 5_000);
        assert_eq!(adaptive_poll_interval(10_000, 1, 0.5), 10_000);
    }
}
