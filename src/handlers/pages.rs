//! Bulk page creation endpoint.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};

use crate::{
    AppState,
    error::AppError,
    middleware::headers::{client_ip, credentials_from_headers},
    models::page::CreatePagesResponse,
};

/// Create pages in bulk.
///
/// # Endpoint
///
/// `POST /pagebuilder/v1/create-pages`
///
/// # Authentication
///
/// `X-API-Key` and `X-API-Secret` headers, matched case-insensitively.
///
/// # Request Body
///
/// ```json
/// {
///   "pages": [
///     { "title": "About", "content": "<p>About us</p>" },
///     { "title": "Contact", "content": "<p>Write to us</p>" }
///   ]
/// }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: summary of created pages, even when none were created
/// - **Error (401)**: missing or invalid credentials
/// - **Error (429)**: rate limit exceeded for this key
/// - **Error (400)**: missing, empty or malformed `pages` array
///
/// The body is read raw so credentials are checked before it is parsed.
pub async fn create_pages(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CreatePagesResponse>, AppError> {
    let credentials = credentials_from_headers(&headers);

    let response = state
        .ingest
        .create_pages(&credentials, &body, client_ip(&headers))
        .await?;

    Ok(Json(response))
}
