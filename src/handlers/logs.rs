//! Admin endpoint for the request audit trail.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::{AppState, error::AppError, models::api_log::ApiLogEntry};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<i64>,
}

/// Most recent log entries, newest first.
///
/// `GET /pagebuilder/v1/admin/logs?limit=20` (default 50, capped at 500)
pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<ApiLogEntry>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    Ok(Json(state.audit.recent(limit).await?))
}
