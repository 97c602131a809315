//! One-shot change-log retention sweep, for running out-of-process (a cron
//! job or a Kubernetes CronJob) instead of the in-process background task
//! `main.rs` spawns. Both call the same model method so the retention
//! policy can't drift between the two.

use league_backend::config::Config;
use league_backend::db::create_pool;
use league_backend::error::AppError;
use league_backend::models::change_log::EntityChangeLog;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    league_backend::observability::init_logging();

    let config = Config::from_env()?;
    let pool = create_pool(&config.database_url, config.database_max_connections).await?;

    let cutoff = chrono::Utc::now() - chrono::Duration::days(config.log_retention_days);
    let deleted = EntityChangeLog::delete_older_than(&pool, cutoff).await?;

    tracing::info!(deleted, cutoff = %cutoff, "change-log retention sweep complete");

    Ok(())
}
