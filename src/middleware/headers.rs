//! Header lookups at the transport boundary.
//!
//! `HeaderMap` already matches names case-insensitively. This module adds
//! the underscore spellings some proxies and clients produce, so the core
//! only ever sees plain [`Credentials`].

use axum::http::HeaderMap;

use crate::services::ingest_service::Credentials;

pub const API_KEY_HEADERS: [&str; 2] = ["x-api-key", "x_api_key"];
pub const API_SECRET_HEADERS: [&str; 2] = ["x-api-secret", "x_api_secret"];

/// First non-empty value among `names`, trimmed.
pub fn header_value(headers: &HeaderMap, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    })
}

/// API key and secret; missing headers become empty strings.
pub fn credentials_from_headers(headers: &HeaderMap) -> Credentials {
    Credentials {
        api_key: header_value(headers, &API_KEY_HEADERS).unwrap_or_default(),
        secret: header_value(headers, &API_SECRET_HEADERS).unwrap_or_default(),
    }
}

/// Client address from `X-Forwarded-For` (first hop) or `X-Real-IP`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_value(headers, &["x-forwarded-for"])
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_value(headers, &["x-real-ip"]))
}
