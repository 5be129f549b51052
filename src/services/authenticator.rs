//! Credential validation for the ingest endpoint.
//!
//! This is the only trust boundary in front of page creation: nothing is
//! written until [`Authenticator::validate`] succeeds.

use std::sync::Arc;

use crate::error::AppError;
use crate::models::api_key::AuthResult;
use crate::services::credential_store::CredentialStore;

#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
}

impl Authenticator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Check a presented key/secret pair.
    ///
    /// # Errors
    ///
    /// - `MissingCredentials`: either value is empty
    /// - `InvalidCredentials`: no usable key matches. Unknown, revoked and
    ///   expired keys and wrong secrets all produce this same error.
    /// - `StorageUnavailable`: the store could not be queried
    pub async fn validate(&self, api_key: &str, secret: &str) -> Result<AuthResult, AppError> {
        let api_key = api_key.trim();
        let secret = secret.trim();

        if api_key.is_empty() || secret.is_empty() {
            return Err(AppError::MissingCredentials);
        }

        let key = self
            .store
            .find_active_by_credentials(api_key, secret)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        Ok(AuthResult {
            valid: true,
            key_id: key.id,
            key_name: key.name,
        })
    }

    /// Record a successful authentication against the key.
    ///
    /// A failure here is logged and otherwise ignored.
    pub async fn record_usage(&self, result: &AuthResult) {
        if let Err(e) = self.store.record_usage(result.key_id).await {
            tracing::error!(key_id = %result.key_id, error = %e, "failed to record api key usage");
        }
    }
}
