//! HTTP middleware and transport helpers.
//!
//! Middleware are functions that run before route handlers. They can:
//! - Authenticate requests
//! - Short-circuit requests (reject unauthorized)

/// Admin token authentication middleware
pub mod auth;
/// Case-insensitive credential and client address extraction
pub mod headers;
