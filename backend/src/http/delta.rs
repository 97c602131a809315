use axum::extract::{Extension, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;
use crate::error::{AppError, Result};
use crate::http::state::AppState;
use crate::models::change_log::EntityChangeLog;
use crate::models::delta_cursor::{ClientType, EntityClass};
use crate::services::delta_reader::{self, DEFAULT_LIMIT};

#[derive(Debug, Deserialize)]
pub struct DeltaQuery {
    pub client_type: ClientType,
    #[serde(default)]
    pub since: Option<i64>,
    #[serde(default)]
    pub entity_type: Option<EntityClass>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DeltaResponse {
    pub changes: Vec<EntityChangeLog>,
    pub next_poll_interval_ms: i32,
}

pub async fn poll_delta(
    State(state): State<AppState>,
    Extension(auth): Extension<Option<AuthContext>>,
    Query(query): Query<DeltaQuery>,
) -> Result<Response> {
    let auth = auth.ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    let page = delta_reader::read_delta(
        &state.pool,
        state.cursor_store.as_ref(),
        auth.user_id,
        query.client_type,
        query.since,
        query.entity_type.map(|c| vec![c]),
        query.limit.unwrap_or(DEFAULT_LIMIT),
    )
    .await?;

    let mut response =
        Json(DeltaResponse { changes: page.changes, next_poll_interval_ms: page.next_poll_interval_ms })
            .into_response();
    response.headers_mut().insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if let Ok(value) = HeaderValue::from_str(&page.next_poll_interval_ms.to_string()) {
        response.headers_mut().insert("x-poll-interval", value);
    }
    Ok(response)
}

#[derive(Debug, Serialize)]
pub struct DeltaStatusResponse {
    pub elo_sequence: i64,
    pub activity_sequence: i64,
    pub skill_rating_sequence: i64,
    pub poll_interval_ms: i32,
}

pub async fn delta_status(
    State(state): State<AppState>,
    Extension(auth): Extension<Option<AuthContext>>,
    Query(query): Query<DeltaQuery>,
) -> Result<Response> {
    let auth = auth.ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    let cursor = state.cursor_store.get_or_create(auth.user_id, query.client_type, Utc::now()).await?;
    Ok(Json(DeltaStatusResponse {
        elo_sequence: cursor.elo_sequence,
        activity_sequence: cursor.activity_sequence,
        skill_rating_sequence: cursor.skill_rating_sequence,
        poll_interval_ms: cursor.poll_interval_ms,
    })
    .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ResetDeltaRequest {
    /// `None` resets every entity class; `Some(class)` resets only that one.
    #[serde(default)]
    pub entity_type: Option<EntityClass>,
    pub client_type: ClientType,
}

pub async fn reset_delta(
    State(state): State<AppState>,
    Extension(auth): Extension<Option<AuthContext>>,
    Json(body): Json<ResetDeltaRequest>,
) -> Result<Response> {
    let auth = auth.ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    let now = Utc::now();
    let mut cursor = state.cursor_store.get_or_create(auth.user_id, body.client_type, now).await?;

    let classes: Vec<EntityClass> = match body.entity_type {
        Some(class) => vec![class],
        None => EntityClass::ALL.to_vec(),
    };
    for class in classes {
        let latest = EntityChangeLog::latest_sequence_for(&state.pool, class.entity_types()).await?;
        cursor.set_sequence_for(class, latest);
    }
    cursor.last_active_at = now;
    cursor.last_polled_at = now;
    state.cursor_store.upsert(cursor).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
