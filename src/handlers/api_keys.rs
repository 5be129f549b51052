//! Admin endpoints for API key management.
//!
//! Consumed by an external admin UI. All routes require the admin token.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::AppError,
    models::api_key::{ApiKey, CreateApiKeyRequest},
};

/// Generate a new API key.
///
/// # Request Body
///
/// ```json
/// { "name": "CMS importer", "expires_in_days": 90 }
/// ```
///
/// # Response (201 Created)
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "name": "CMS importer",
///   "api_key": "Zq3...32 chars",
///   "secret": "p9X...64 chars",
///   "message": "API key generated. Save it securely; you cannot view it again."
/// }
/// ```
///
/// The plaintext key and secret appear in this response only.
pub async fn create_key(
    State(state): State<AppState>,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let generated = state.credentials.create(request).await?;

    Ok((StatusCode::CREATED, Json(generated)))
}

/// List all keys, newest first. Hashes are never included.
pub async fn list_keys(State(state): State<AppState>) -> Result<Json<Vec<ApiKey>>, AppError> {
    Ok(Json(state.credentials.list().await?))
}

/// Revoke a key.
///
/// # Response
///
/// - **204 No Content**: key is revoked (also when it already was)
/// - **404**: no key with this id
/// - **409**: running in fixed test mode
pub async fn revoke_key(
    State(state): State<AppState>,
    Path(key_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.credentials.revoke(key_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
