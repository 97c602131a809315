use std::sync::Arc;
use std::time::Duration;

use league_backend::config::Config;
use league_backend::db::create_pool;
use league_backend::error::AppError;
use league_backend::http;
use league_backend::http::state::AppState;
use league_backend::models::change_log::EntityChangeLog;
use league_backend::observability::init_logging;
use league_backend::services::cursor_store::PostgresCursorStore;
use league_backend::services::elo_lock::{EloLockManager, PostgresEloLockManager};
use tower_http::LatencyUnit;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_logging();

    tracing::info_span!("app_startup").in_scope(|| {
        tracing::info!("application starting up");
    });

    let config = Config::from_env()?;
    let pool = create_pool(&config.database_url, config.database_max_connections).await?;

    let lock_manager: Arc<dyn EloLockManager> = Arc::new(PostgresEloLockManager::new(pool.clone()));
    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        cursor_store: Arc::new(PostgresCursorStore::new(pool.clone())),
        lock_manager,
    };

    spawn_retention_sweep(pool.clone(), config.log_retention_days);

    let allowed_origins: Vec<_> = config.cors_origins.iter().filter_map(|origin| origin.parse().ok()).collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST, axum::http::Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION]);

    let app = http::router(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
            .on_response(DefaultOnResponse::new().level(tracing::Level::INFO).latency_unit(LatencyUnit::Millis)),
    )
    .layer(cors);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Prunes change-log rows past the configured retention window.
fn spawn_retention_sweep(pool: sqlx::PgPool, retention_days: i64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RETENTION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days);
            match EntityChangeLog::delete_older_than(&pool, cutoff).await {
                Ok(deleted) => {
                    if deleted > 0 {
                        tracing::info!(deleted, "swept expired change-log rows");
                    }
                }
                Err(err) => tracing::error!(error = %err, "change-log retention sweep failed"),
            }
        }
    });
}
