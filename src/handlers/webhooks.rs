//! HTTP handlers for webhook settings and test delivery.

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::AppState;
use crate::error::AppError;
use crate::models::webhook::{WebhookSettings, WebhookSettingsResponse};

/// Current webhook settings.
///
/// # Response
///
/// ```json
/// {
///   "webhook_url": "https://example.com/webhook",
///   "secret_configured": true
/// }
/// ```
///
/// The secret itself is never returned.
pub async fn get_settings(State(state): State<AppState>) -> Json<WebhookSettingsResponse> {
    Json(state.dispatcher.settings().get().await.into())
}

/// Replace webhook settings.
///
/// # Request Body
///
/// ```json
/// {
///   "webhook_url": "https://example.com/webhook",
///   "webhook_secret": "shared-secret"
/// }
/// ```
///
/// Omitting `webhook_url` disables delivery; omitting `webhook_secret`
/// sends unsigned payloads.
///
/// # Validation
///
/// - HTTPS URLs required (HTTP localhost allowed for development)
/// - At most 2048 characters
pub async fn update_settings(
    State(state): State<AppState>,
    Json(settings): Json<WebhookSettings>,
) -> Result<Json<WebhookSettingsResponse>, AppError> {
    state.dispatcher.settings().replace(settings.clone()).await?;

    Ok(Json(settings.into()))
}

/// Send one test payload to the configured URL.
///
/// No retries; a transport error or non-2xx status is returned as 502 so
/// the admin UI can display it.
pub async fn send_test(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.dispatcher.send_test().await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Test webhook delivered."
    })))
}
