//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Authentication Errors**: Missing or invalid API credentials, bad admin token
/// - **Admission Errors**: Per-key rate limit exceeded
/// - **Validation Errors**: Malformed request bodies
/// - **Storage Errors**: Any sqlx::Error from credential, page or log stores
/// - **Webhook Errors**: Only surfaced by the admin test delivery
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The API key or secret header is missing or empty.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Missing authentication headers.")]
    MissingCredentials,

    /// No active key matches the presented key/secret pair.
    ///
    /// The same error covers unknown, revoked and expired keys and wrong
    /// secrets so callers cannot tell them apart.
    #[error("Invalid API credentials.")]
    InvalidCredentials,

    /// Returns HTTP 429 Too Many Requests.
    #[error("Rate limit exceeded. Try again later.")]
    RateLimited,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("{0}")]
    InvalidPayload(String),

    /// Backing store could not be reached or rejected the query.
    ///
    /// Returns HTTP 503 and hides the details from the client.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),

    /// Returns HTTP 404 Not Found.
    #[error("Resource not found")]
    NotFound,

    /// Key management was attempted while running on fixed test credentials.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("Credential store is running in fixed test mode")]
    FixedCredentialMode,

    /// Admin token missing or wrong.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid webhook URL: {0}")]
    InvalidWebhookUrl(String),

    /// Admin test delivery failed; returns HTTP 502 Bad Gateway.
    #[error(transparent)]
    Webhook(#[from] WebhookError),
}

/// Failures while delivering a webhook.
///
/// These never reach the page-creation caller; they are logged by the
/// dispatcher or returned by the admin test delivery.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Missing webhook URL")]
    MissingWebhookUrl,

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl AppError {
    /// Stable machine-readable code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingCredentials => "missing_credentials",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::RateLimited => "rate_limited",
            AppError::InvalidPayload(_) => "invalid_payload",
            AppError::StorageUnavailable(_) => "storage_unavailable",
            AppError::NotFound => "not_found",
            AppError::FixedCredentialMode => "fixed_credential_mode",
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidWebhookUrl(_) => "invalid_webhook_url",
            AppError::Webhook(WebhookError::MissingWebhookUrl) => "missing_webhook_url",
            AppError::Webhook(_) => "webhook_delivery_failed",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingCredentials
            | AppError::InvalidCredentials
            | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidPayload(_) | AppError::InvalidWebhookUrl(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::FixedCredentialMode => StatusCode::CONFLICT,
            AppError::Webhook(WebhookError::MissingWebhookUrl) => StatusCode::BAD_REQUEST,
            AppError::Webhook(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": "Human-readable error message",
///   "code": "error_type"
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            AppError::StorageUnavailable(e) => {
                tracing::error!(error = %e, "storage unavailable");
                "Storage is temporarily unavailable".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::MissingCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::RateLimited.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::InvalidPayload("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Webhook(WebhookError::Status(500)).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_storage_error_hides_details() {
        let response = AppError::StorageUnavailable(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
