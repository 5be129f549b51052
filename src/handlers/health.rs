//! Health check endpoint for service monitoring.

use crate::{AppState, error::AppError};
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
///
/// Returns service status and storage connectivity.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: String,

    /// `connected`, or `memory` when no database is used
    pub storage: String,

    /// `persistent` or `fixed_test`
    pub credential_mode: String,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "storage": "connected",
///   "credential_mode": "persistent",
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
///
/// # Response (503 Service Unavailable)
///
/// If the database is unreachable, returns the standard error response.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let storage = match &state.db {
        Some(pool) => {
            // Verify database connectivity with simple query
            sqlx::query("SELECT 1").execute(pool).await?;
            "connected"
        }
        None => "memory",
    };

    let credential_mode = match state.credentials.mode() {
        crate::config::CredentialStoreMode::Persistent => "persistent",
        crate::config::CredentialStoreMode::FixedTest => "fixed_test",
    };

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        storage: storage.to_string(),
        credential_mode: credential_mode.to_string(),
        timestamp: Utc::now(),
    }))
}
