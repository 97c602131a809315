use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::services::cursor_store::CursorStore;
use crate::services::elo_lock::EloLockManager;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub cursor_store: Arc<dyn CursorStore>,
    pub lock_manager: Arc<dyn EloLockManager>,
}
