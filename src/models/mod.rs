//! Data models for keys, request logs, pages and webhooks.

/// API key authentication model
pub mod api_key;
/// Request and webhook audit entries
pub mod api_log;
pub mod page;
pub mod webhook;
