//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;
use std::time::Duration;

/// Where keys, pages and request logs are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// PostgreSQL via `DATABASE_URL`
    Postgres,
    /// Process memory; everything is lost on restart
    Memory,
}

/// How API credentials are resolved.
///
/// Chosen once at startup. `FixedTest` is a degraded bootstrap mode with a
/// single configured key/secret pair and is never mixed with stored keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStoreMode {
    Persistent,
    FixedTest,
}

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required for the postgres backend): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `STORAGE_BACKEND` (optional): `postgres` (default) or `memory`
/// - `CREDENTIAL_MODE` (optional): `persistent` (default) or `fixed_test`
/// - `RATE_LIMIT_WINDOW_SECS` / `RATE_LIMIT_MAX_REQUESTS`: per-key fixed window
/// - `WEBHOOK_URL` / `WEBHOOK_SECRET`: initial webhook settings
/// - `ADMIN_TOKEN` (optional): enables the admin API
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: Option<String>,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_storage_backend")]
    pub storage_backend: StorageBackend,

    #[serde(default = "default_credential_mode")]
    pub credential_mode: CredentialStoreMode,

    #[serde(default = "default_fixed_api_key")]
    pub fixed_api_key: String,

    #[serde(default = "default_fixed_api_secret")]
    pub fixed_api_secret: String,

    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,

    pub webhook_url: Option<String>,

    pub webhook_secret: Option<String>,

    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,

    #[serde(default = "default_webhook_backoff_base_ms")]
    pub webhook_backoff_base_ms: u64,

    pub admin_token: Option<String>,

    /// Base used to build page permalinks
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Reported in test webhooks
    #[serde(default = "default_site_name")]
    pub site_name: String,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Postgres
}

fn default_credential_mode() -> CredentialStoreMode {
    CredentialStoreMode::Persistent
}

fn default_fixed_api_key() -> String {
    "test_key".to_string()
}

fn default_fixed_api_secret() -> String {
    "test_secret".to_string()
}

fn default_rate_limit_window_secs() -> u64 {
    3600
}

fn default_rate_limit_max_requests() -> u32 {
    100
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

fn default_webhook_backoff_base_ms() -> u64 {
    1000
}

fn default_public_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_site_name() -> String {
    "Page Builder".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            server_port: default_port(),
            storage_backend: default_storage_backend(),
            credential_mode: default_credential_mode(),
            fixed_api_key: default_fixed_api_key(),
            fixed_api_secret: default_fixed_api_secret(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            rate_limit_max_requests: default_rate_limit_max_requests(),
            webhook_url: None,
            webhook_secret: None,
            webhook_timeout_secs: default_webhook_timeout_secs(),
            webhook_backoff_base_ms: default_webhook_backoff_base_ms(),
            admin_token: None,
            public_base_url: default_public_base_url(),
            site_name: default_site_name(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variable values cannot be parsed into
    /// expected types (e.g., `SERVER_PORT=abc`).
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }

    pub fn webhook_backoff_base(&self) -> Duration {
        Duration::from_millis(self.webhook_backoff_base_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.storage_backend, StorageBackend::Postgres);
        assert_eq!(config.credential_mode, CredentialStoreMode::Persistent);
        assert_eq!(config.rate_limit_window(), Duration::from_secs(3600));
        assert_eq!(config.webhook_backoff_base(), Duration::from_secs(1));
        assert!(config.admin_token.is_none());
    }

    #[test]
    fn test_modes_parse_from_snake_case() {
        let mode: CredentialStoreMode = serde_json::from_str("\"fixed_test\"").unwrap();
        assert_eq!(mode, CredentialStoreMode::FixedTest);

        let backend: StorageBackend = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(backend, StorageBackend::Memory);
    }
}
