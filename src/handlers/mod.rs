//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (headers, JSON body, URL params)
//! 2. Delegates to a service
//! 3. Returns HTTP response (JSON, status code)

/// Admin key management endpoints
pub mod api_keys;
pub mod health;
pub mod logs;
/// Bulk page creation endpoint
pub mod pages;
/// Admin webhook settings and test delivery
pub mod webhooks;
