use league_backend::config::Config;
use league_backend::error::AppError;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    league_backend::observability::init_logging();

    let config = Config::from_env()?;
    let pool = PgPoolOptions::new().max_connections(1).connect(&config.database_url).await?;

    tracing::info!("running migrations");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("migrations complete");

    Ok(())
}
