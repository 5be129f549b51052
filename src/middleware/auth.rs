//! Admin token authentication middleware.
//!
//! Guards the key-management and webhook-settings routes:
//! 1. Extract the token from the `Authorization: Bearer <token>` header
//! 2. Compare it against `ADMIN_TOKEN` in constant time
//! 3. Reject anything else with HTTP 401
//!
//! The ingest endpoint does not use this middleware; it authenticates with
//! API key/secret pairs inside the ingest service.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::{AppState, error::AppError};

/// Admin authentication middleware function.
///
/// # Headers
///
/// ```text
/// Authorization: Bearer <ADMIN_TOKEN>
/// ```
///
/// # Returns
///
/// - `Ok(Response)` if the token matches (calls next handler)
/// - `Err(AppError::Unauthorized)` otherwise (returns 401)
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Routes are only mounted with a token configured; fail closed regardless.
    let expected = state.admin_token.as_deref().ok_or(AppError::Unauthorized)?;

    let presented = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    if !bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
        tracing::warn!("admin request with invalid token");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
