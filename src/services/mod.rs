//! Business logic services.
//!
//! Services contain the core logic separated from HTTP handlers. Storage
//! backends sit behind traits so PostgreSQL and in-memory stores are
//! interchangeable.

pub mod audit_logger;
pub mod authenticator;
pub mod credential_store;
pub mod ingest_service;
pub mod page_store;
pub mod rate_limiter;
pub mod sanitize;
pub mod webhook_service;
