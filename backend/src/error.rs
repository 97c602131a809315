use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Error kinds the core produces.
///
/// Each variant maps to exactly one HTTP status via [`AppError::status_code`];
/// `Validation`/`NotFound` are surfaced verbatim, while ELO processing errors
/// are additionally captured on the activity's ELO status row (see
/// `services::elo_persister`) rather than failing the whole request.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("ELO calculation is already in progress on another server")]
    ConcurrentCalculation,

    #[error("Rating update conflicted after 3 retries")]
    ConcurrentRatingUpdate,

    #[error("Insufficient participants for ELO processing: {0}")]
    InsufficientParticipants(String),

    #[error("Insufficient teams for ELO processing: {0}")]
    InsufficientTeams(String),

    #[error("ELO processing failed: {0}")]
    EloProcessingError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_)
            | AppError::ConcurrentCalculation
            | AppError::ConcurrentRatingUpdate => StatusCode::CONFLICT,
            AppError::InsufficientParticipants(_) | AppError::InsufficientTeams(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::JwtError(_) => StatusCode::UNAUTHORIZED,
            AppError::EloProcessingError(_)
            | AppError::Database(_)
            | AppError::Io(_)
            | AppError::Migration(_)
            | AppError::EnvVar(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
