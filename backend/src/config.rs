use crate::error::{AppError, Result};

/// Process configuration, read once at startup from the environment.
///
/// `jwt_secret`/`refresh_secret` are carried here purely for the benefit of
/// the external auth component that issues tokens; everything this crate
/// itself does with a token is verify an already-issued bearer JWT (see
/// `auth.rs`).
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub server_id: String,
    pub jwt_secret: String,
    pub refresh_secret: String,
    pub server_host: String,
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub log_retention_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| AppError::EnvVar(std::env::VarError::NotPresent))?;

        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| AppError::EnvVar(std::env::VarError::NotPresent))?;

        if jwt_secret.len() < 32 {
            return Err(AppError::Validation(
                "JWT_SECRET must be at least 32 characters long".to_string(),
            ));
        }

        let refresh_secret = std::env::var("REFRESH_SECRET").unwrap_or_else(|_| jwt_secret.clone());

        let server_id = std::env::var("SERVER_ID")
            .unwrap_or_else(|_| format!("server-{}", uuid::Uuid::new_v4()));

        let server_port = std::env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| AppError::Validation("SERVER_PORT must be a valid u16".to_string()))?;

        let database_max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| {
                AppError::Validation("DATABASE_MAX_CONNECTIONS must be a valid u32".to_string())
            })?;

        let log_retention_days = std::env::var("LOG_RETENTION_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse()
            .map_err(|_| {
                AppError::Validation("LOG_RETENTION_DAYS must be a valid integer".to_string())
            })?;

        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            database_url,
            database_max_connections,
            server_id,
            jwt_secret,
            refresh_secret,
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port,
            cors_origins,
            log_retention_days,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
