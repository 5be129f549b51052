//! API Key model for authentication.
//!
//! API keys are key/secret pairs presented on every ingest request. Both
//! halves are stored as SHA-256 hashes; the plaintext is returned once at
//! generation time and cannot be recovered afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Permission granted to every newly generated key.
pub const PERMISSION_CREATE_PAGES: &str = "create_pages";

/// Lifecycle state of a key. Keys are never deleted, only revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Revoked,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Active => "active",
            KeyStatus::Revoked => "revoked",
        }
    }
}

impl TryFrom<String> for KeyStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(KeyStatus::Active),
            "revoked" => Ok(KeyStatus::Revoked),
            other => Err(format!("unknown key status: {other}")),
        }
    }
}

/// Represents an API key record.
///
/// # Database Table
///
/// Maps to the `api_keys` table. The hash columns are never serialized, so
/// list responses can hand this struct straight to the admin API.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ApiKey {
    pub id: Uuid,

    /// Human-readable label chosen at generation time
    pub name: String,

    /// SHA-256 hash of the plaintext key (64 hex characters)
    #[serde(skip_serializing)]
    pub api_key_hash: String,

    /// SHA-256 hash of the plaintext secret
    #[serde(skip_serializing)]
    pub secret_hash: String,

    #[sqlx(try_from = "String")]
    pub status: KeyStatus,

    pub revoked: bool,

    pub created_at: DateTime<Utc>,

    pub expires_at: Option<DateTime<Utc>>,

    pub last_used: Option<DateTime<Utc>>,

    pub request_count: i64,

    pub permissions: Vec<String>,
}

impl ApiKey {
    /// Whether the key may authenticate at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == KeyStatus::Active
            && !self.revoked
            && self.expires_at.is_none_or(|expires| expires > now)
    }

    pub fn revoke(&mut self) {
        self.status = KeyStatus::Revoked;
        self.revoked = true;
    }

    pub fn record_usage(&mut self, at: DateTime<Utc>) {
        self.last_used = Some(at);
        self.request_count += 1;
    }
}

/// Admin request to generate a key.
///
/// ```json
/// { "name": "CMS importer", "expires_in_days": 90 }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,

    #[serde(default)]
    pub expires_in_days: Option<i64>,

    /// Defaults to `["create_pages"]`
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

impl CreateApiKeyRequest {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expires_in_days: None,
            permissions: None,
        }
    }
}

/// Plaintext credentials returned exactly once after generation.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedCredentials {
    pub id: Uuid,
    pub name: String,
    pub api_key: String,
    pub secret: String,
    pub message: String,
}

/// Outcome of a successful credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub valid: bool,
    pub key_id: Uuid,
    pub key_name: String,
}
