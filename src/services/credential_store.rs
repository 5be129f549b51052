//! Credential store for API key/secret pairs.
//!
//! Three backends share the [`CredentialStore`] trait:
//!
//! - [`PgCredentialStore`]: `api_keys` table in PostgreSQL
//! - [`MemoryCredentialStore`]: same semantics in process memory (lost on restart)
//! - [`FixedCredentialStore`]: the single-pair bootstrap mode
//!
//! Only SHA-256 hashes of keys and secrets are ever stored. Lookups scan the
//! usable keys and compare both hashes in constant time.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::CredentialStoreMode;
use crate::db::DbPool;
use crate::error::AppError;
use crate::models::api_key::{
    ApiKey, CreateApiKeyRequest, GeneratedCredentials, KeyStatus, PERMISSION_CREATE_PAGES,
};
use crate::services::sanitize::sanitize_text;

/// Length of a generated plaintext API key.
pub const API_KEY_LENGTH: usize = 32;
/// Length of a generated plaintext secret.
pub const SECRET_LENGTH: usize = 64;

/// Name reported for the fixed test credential.
pub const FIXED_KEY_NAME: &str = "Local Test Key";

const GENERATED_MESSAGE: &str = "API key generated. Save it securely; you cannot view it again.";

#[async_trait]
pub trait CredentialStore: Send + Sync {
    fn mode(&self) -> CredentialStoreMode;

    /// Generate and store a new key. The plaintext pair is only ever returned here.
    async fn create(&self, request: CreateApiKeyRequest) -> Result<GeneratedCredentials, AppError>;

    /// All keys, newest first.
    async fn list(&self) -> Result<Vec<ApiKey>, AppError>;

    /// Mark a key revoked. Revoking twice is not an error.
    async fn revoke(&self, id: Uuid) -> Result<(), AppError>;

    async fn find_active_by_credentials(
        &self,
        api_key: &str,
        secret: &str,
    ) -> Result<Option<ApiKey>, AppError>;

    /// Bump `request_count` and set `last_used`.
    async fn record_usage(&self, id: Uuid) -> Result<(), AppError>;
}

/// Hash a key or secret using SHA-256.
pub fn hash_credential(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time check of both hashes against a stored key.
///
/// Both comparisons always run so timing does not reveal which half matched.
fn matches_credentials(key: &ApiKey, api_key_hash: &str, secret_hash: &str) -> bool {
    let key_ok = key.api_key_hash.as_bytes().ct_eq(api_key_hash.as_bytes());
    let secret_ok = key.secret_hash.as_bytes().ct_eq(secret_hash.as_bytes());
    (key_ok & secret_ok).into()
}

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate a fresh key record together with its plaintext credentials.
fn generate_key(request: CreateApiKeyRequest) -> Result<(ApiKey, GeneratedCredentials), AppError> {
    let name = sanitize_text(&request.name);
    if name.is_empty() {
        return Err(AppError::InvalidPayload("Key name is required.".to_string()));
    }

    if request.expires_in_days.is_some_and(|days| days <= 0) {
        return Err(AppError::InvalidPayload(
            "expires_in_days must be positive.".to_string(),
        ));
    }

    let plaintext_key = random_alphanumeric(API_KEY_LENGTH);
    let plaintext_secret = random_alphanumeric(SECRET_LENGTH);
    let now = Utc::now();

    let permissions = request
        .permissions
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| vec![PERMISSION_CREATE_PAGES.to_string()]);

    let key = ApiKey {
        id: Uuid::new_v4(),
        name: name.clone(),
        api_key_hash: hash_credential(&plaintext_key),
        secret_hash: hash_credential(&plaintext_secret),
        status: KeyStatus::Active,
        revoked: false,
        created_at: now,
        expires_at: request
            .expires_in_days
            .and_then(Duration::try_days)
            .map(|d| now + d),
        last_used: None,
        request_count: 0,
        permissions,
    };

    let credentials = GeneratedCredentials {
        id: key.id,
        name,
        api_key: plaintext_key,
        secret: plaintext_secret,
        message: GENERATED_MESSAGE.to_string(),
    };

    Ok((key, credentials))
}

/// PostgreSQL-backed store.
pub struct PgCredentialStore {
    pool: DbPool,
}

impl PgCredentialStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    fn mode(&self) -> CredentialStoreMode {
        CredentialStoreMode::Persistent
    }

    async fn create(&self, request: CreateApiKeyRequest) -> Result<GeneratedCredentials, AppError> {
        let (key, credentials) = generate_key(request)?;

        sqlx::query(
            r#"
            INSERT INTO api_keys (
                id, name, api_key_hash, secret_hash, status, revoked,
                created_at, expires_at, request_count, permissions
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(key.id)
        .bind(&key.name)
        .bind(&key.api_key_hash)
        .bind(&key.secret_hash)
        .bind(key.status.as_str())
        .bind(key.revoked)
        .bind(key.created_at)
        .bind(key.expires_at)
        .bind(key.request_count)
        .bind(&key.permissions)
        .execute(&self.pool)
        .await?;

        tracing::info!(key_id = %key.id, key_name = %key.name, "api key generated");

        Ok(credentials)
    }

    async fn list(&self) -> Result<Vec<ApiKey>, AppError> {
        let keys = sqlx::query_as::<_, ApiKey>(
            "SELECT * FROM api_keys ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }

    async fn revoke(&self, id: Uuid) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE api_keys SET status = 'revoked', revoked = true WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        tracing::info!(key_id = %id, "api key revoked");
        Ok(())
    }

    async fn find_active_by_credentials(
        &self,
        api_key: &str,
        secret: &str,
    ) -> Result<Option<ApiKey>, AppError> {
        let api_key_hash = hash_credential(api_key);
        let secret_hash = hash_credential(secret);

        let candidates = sqlx::query_as::<_, ApiKey>(
            r#"
            SELECT * FROM api_keys
            WHERE status = 'active'
              AND revoked = false
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(candidates
            .into_iter()
            .find(|key| matches_credentials(key, &api_key_hash, &secret_hash)))
    }

    async fn record_usage(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE api_keys SET last_used = NOW(), request_count = request_count + 1 WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-memory store with the same semantics as the database one.
#[derive(Default)]
pub struct MemoryCredentialStore {
    keys: Arc<RwLock<Vec<ApiKey>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    fn mode(&self) -> CredentialStoreMode {
        CredentialStoreMode::Persistent
    }

    async fn create(&self, request: CreateApiKeyRequest) -> Result<GeneratedCredentials, AppError> {
        let (key, credentials) = generate_key(request)?;
        tracing::info!(key_id = %key.id, key_name = %key.name, "api key generated");
        self.keys.write().await.push(key);
        Ok(credentials)
    }

    async fn list(&self) -> Result<Vec<ApiKey>, AppError> {
        // Insertion order is creation order.
        Ok(self.keys.read().await.iter().rev().cloned().collect())
    }

    async fn revoke(&self, id: Uuid) -> Result<(), AppError> {
        let mut keys = self.keys.write().await;
        let key = keys
            .iter_mut()
            .find(|k| k.id == id)
            .ok_or(AppError::NotFound)?;
        key.revoke();

        tracing::info!(key_id = %id, "api key revoked");
        Ok(())
    }

    async fn find_active_by_credentials(
        &self,
        api_key: &str,
        secret: &str,
    ) -> Result<Option<ApiKey>, AppError> {
        let api_key_hash = hash_credential(api_key);
        let secret_hash = hash_credential(secret);
        let now = Utc::now();

        Ok(self
            .keys
            .read()
            .await
            .iter()
            .filter(|key| key.is_usable_at(now))
            .find(|key| matches_credentials(key, &api_key_hash, &secret_hash))
            .cloned())
    }

    async fn record_usage(&self, id: Uuid) -> Result<(), AppError> {
        let mut keys = self.keys.write().await;
        if let Some(key) = keys.iter_mut().find(|k| k.id == id) {
            key.record_usage(Utc::now());
        }
        Ok(())
    }
}

/// Degraded bootstrap mode: one configured key/secret pair, nothing stored.
///
/// Key management is unavailable; `create` hands back the fixed pair and
/// `revoke` fails with [`AppError::FixedCredentialMode`].
pub struct FixedCredentialStore {
    api_key: String,
    secret: String,
    key: RwLock<ApiKey>,
}

impl FixedCredentialStore {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        let api_key = api_key.into();
        let secret = secret.into();

        let key = ApiKey {
            id: Uuid::nil(),
            name: FIXED_KEY_NAME.to_string(),
            api_key_hash: hash_credential(&api_key),
            secret_hash: hash_credential(&secret),
            status: KeyStatus::Active,
            revoked: false,
            created_at: Utc::now(),
            expires_at: None,
            last_used: None,
            request_count: 0,
            permissions: vec![PERMISSION_CREATE_PAGES.to_string()],
        };

        Self {
            api_key,
            secret,
            key: RwLock::new(key),
        }
    }
}

#[async_trait]
impl CredentialStore for FixedCredentialStore {
    fn mode(&self) -> CredentialStoreMode {
        CredentialStoreMode::FixedTest
    }

    async fn create(&self, _request: CreateApiKeyRequest) -> Result<GeneratedCredentials, AppError> {
        Ok(GeneratedCredentials {
            id: Uuid::nil(),
            name: FIXED_KEY_NAME.to_string(),
            api_key: self.api_key.clone(),
            secret: self.secret.clone(),
            message: "Fixed test mode: returning the configured test credentials.".to_string(),
        })
    }

    async fn list(&self) -> Result<Vec<ApiKey>, AppError> {
        Ok(vec![self.key.read().await.clone()])
    }

    async fn revoke(&self, _id: Uuid) -> Result<(), AppError> {
        Err(AppError::FixedCredentialMode)
    }

    async fn find_active_by_credentials(
        &self,
        api_key: &str,
        secret: &str,
    ) -> Result<Option<ApiKey>, AppError> {
        let key = self.key.read().await;
        if matches_credentials(&key, &hash_credential(api_key), &hash_credential(secret)) {
            Ok(Some(key.clone()))
        } else {
            Ok(None)
        }
    }

    async fn record_usage(&self, _id: Uuid) -> Result<(), AppError> {
        self.key.write().await.record_usage(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_returns_plaintext_and_stores_hashes() {
        let store = MemoryCredentialStore::new();
        let generated = store
            .create(CreateApiKeyRequest::named("Importer"))
            .await
            .unwrap();

        assert_eq!(generated.api_key.len(), API_KEY_LENGTH);
        assert_eq!(generated.secret.len(), SECRET_LENGTH);
        assert!(generated.api_key.chars().all(|c| c.is_ascii_alphanumeric()));

        let keys = store.list().await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].api_key_hash, hash_credential(&generated.api_key));
        assert_ne!(keys[0].api_key_hash, generated.api_key);
        assert_ne!(keys[0].secret_hash, generated.secret);
        assert_eq!(keys[0].permissions, vec![PERMISSION_CREATE_PAGES.to_string()]);
    }

    #[tokio::test]
    async fn test_hashes_never_serialized() {
        let store = MemoryCredentialStore::new();
        store
            .create(CreateApiKeyRequest::named("Importer"))
            .await
            .unwrap();

        let keys = store.list().await.unwrap();
        let json = serde_json::to_value(&keys[0]).unwrap();
        assert!(json.get("api_key_hash").is_none());
        assert!(json.get("secret_hash").is_none());
        assert_eq!(json["status"], "active");
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let store = MemoryCredentialStore::new();
        let result = store.create(CreateApiKeyRequest::named("  <b></b> ")).await;
        assert!(matches!(result, Err(AppError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = MemoryCredentialStore::new();
        store.create(CreateApiKeyRequest::named("first")).await.unwrap();
        store.create(CreateApiKeyRequest::named("second")).await.unwrap();

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.name)
            .collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_find_requires_both_halves() {
        let store = MemoryCredentialStore::new();
        let generated = store
            .create(CreateApiKeyRequest::named("Importer"))
            .await
            .unwrap();

        let found = store
            .find_active_by_credentials(&generated.api_key, &generated.secret)
            .await
            .unwrap();
        assert_eq!(found.map(|k| k.id), Some(generated.id));

        let wrong_secret = store
            .find_active_by_credentials(&generated.api_key, "nope")
            .await
            .unwrap();
        assert!(wrong_secret.is_none());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = MemoryCredentialStore::new();
        let generated = store
            .create(CreateApiKeyRequest::named("Importer"))
            .await
            .unwrap();

        store.revoke(generated.id).await.unwrap();
        store.revoke(generated.id).await.unwrap();

        let key = store.list().await.unwrap().remove(0);
        assert_eq!(key.status, KeyStatus::Revoked);
        assert!(key.revoked);

        let found = store
            .find_active_by_credentials(&generated.api_key, &generated.secret)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_revoke_unknown_id() {
        let store = MemoryCredentialStore::new();
        assert!(matches!(
            store.revoke(Uuid::new_v4()).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_expired_key_is_not_usable() {
        let store = MemoryCredentialStore::new();
        let generated = store
            .create(CreateApiKeyRequest::named("Importer"))
            .await
            .unwrap();

        {
            let mut keys = store.keys.write().await;
            keys[0].expires_at = Some(Utc::now() - Duration::minutes(1));
        }

        let found = store
            .find_active_by_credentials(&generated.api_key, &generated.secret)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_record_usage() {
        let store = MemoryCredentialStore::new();
        let generated = store
            .create(CreateApiKeyRequest::named("Importer"))
            .await
            .unwrap();

        store.record_usage(generated.id).await.unwrap();
        store.record_usage(generated.id).await.unwrap();

        let key = store.list().await.unwrap().remove(0);
        assert_eq!(key.request_count, 2);
        assert!(key.last_used.is_some());
    }

    #[tokio::test]
    async fn test_fixed_mode() {
        let store = FixedCredentialStore::new("test_key", "test_secret");
        assert_eq!(store.mode(), CredentialStoreMode::FixedTest);

        let found = store
            .find_active_by_credentials("test_key", "test_secret")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.name, FIXED_KEY_NAME);

        assert!(
            store
                .find_active_by_credentials("test_key", "other")
                .await
                .unwrap()
                .is_none()
        );

        let generated = store
            .create(CreateApiKeyRequest::named("ignored"))
            .await
            .unwrap();
        assert_eq!(generated.api_key, "test_key");

        assert!(matches!(
            store.revoke(Uuid::nil()).await,
            Err(AppError::FixedCredentialMode)
        ));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
