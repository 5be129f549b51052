//! Webhook settings, signing and delivery.
//!
//! Deliveries are signed with HMAC-SHA256 over the exact body bytes and
//! retried with exponential backoff on a background task. A failed delivery
//! is logged and never affects the request that triggered it.

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::error::{AppError, WebhookError};
use crate::models::page::CreatedPage;
use crate::models::webhook::{
    EVENT_PAGES_CREATED, TestWebhookPayload, WebhookEvent, WebhookSettings,
};
use crate::services::audit_logger::AuditLogger;
use crate::services::ingest_service::PageEventNotifier;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const REQUEST_ID_HEADER: &str = "X-Webhook-Request-Id";

/// Shared, replaceable webhook settings. Read on every send.
#[derive(Clone, Default)]
pub struct WebhookSettingsStore {
    inner: Arc<RwLock<WebhookSettings>>,
}

impl WebhookSettingsStore {
    /// Validates the initial URL, if any.
    pub fn new(settings: WebhookSettings) -> Result<Self, AppError> {
        if let Some(url) = settings.url() {
            validate_webhook_url(url)?;
        }
        Ok(Self {
            inner: Arc::new(RwLock::new(settings)),
        })
    }

    pub async fn get(&self) -> WebhookSettings {
        self.inner.read().await.clone()
    }

    pub async fn replace(&self, settings: WebhookSettings) -> Result<(), AppError> {
        if let Some(url) = settings.url() {
            validate_webhook_url(url)?;
        }
        tracing::info!(
            webhook_url = settings.url().unwrap_or("-"),
            signed = settings.secret().is_some(),
            "webhook settings updated"
        );
        *self.inner.write().await = settings;
        Ok(())
    }
}

/// Bounded retry with exponential backoff.
///
/// After failed attempt `n` (1-based) the dispatcher waits
/// `base_delay * 2^n` before the next one, so 2 then 4 units with the
/// defaults. The 8-unit wait the same schedule gives after attempt 3 is
/// skipped since no attempt follows it; a delivery that fails every time
/// spends 6 units waiting, not 14.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn with_base_delay(base_delay: Duration) -> Self {
        Self {
            base_delay,
            ..Self::default()
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Cheap to clone: the HTTP client, settings and audit logger are shared.
#[derive(Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    settings: WebhookSettingsStore,
    audit: AuditLogger,
    policy: RetryPolicy,
    site_name: String,
}

impl WebhookDispatcher {
    pub fn new(
        settings: WebhookSettingsStore,
        audit: AuditLogger,
        policy: RetryPolicy,
        timeout: Duration,
        site_name: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            settings,
            audit,
            policy,
            site_name: site_name.into(),
        })
    }

    pub fn settings(&self) -> &WebhookSettingsStore {
        &self.settings
    }

    /// Deliver an event with retries and log the final outcome.
    ///
    /// # Process
    ///
    /// 1. Read current settings; no URL means log `Missing webhook URL` and stop
    /// 2. Serialize the payload once and sign those exact bytes
    /// 3. POST up to `max_attempts` times until a 2xx response
    /// 4. Log success, or failure with the last error
    pub async fn send(&self, event: &str, key_name: &str, pages: Vec<CreatedPage>) -> bool {
        let total = pages.len();
        let settings = self.settings.get().await;

        let Some(url) = settings.url() else {
            self.audit
                .log_webhook_outcome(
                    event,
                    "(no URL set)",
                    key_name,
                    total,
                    false,
                    Some(&WebhookError::MissingWebhookUrl.to_string()),
                )
                .await;
            return false;
        };

        let payload = WebhookEvent::new(event, key_name, pages);
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                let error = WebhookError::from(e).to_string();
                self.audit
                    .log_webhook_outcome(event, url, key_name, total, false, Some(&error))
                    .await;
                return false;
            }
        };
        let signature = signature_for(settings.secret(), &body);

        let mut last_error = String::new();
        for attempt in 1..=self.policy.max_attempts {
            match self
                .post_once(url, body.clone(), &signature, Some(&payload.request_id))
                .await
            {
                Ok(()) => {
                    tracing::debug!(
                        request_id = %payload.request_id,
                        attempt,
                        "webhook attempt succeeded"
                    );
                    self.audit
                        .log_webhook_outcome(event, url, key_name, total, true, None)
                        .await;
                    return true;
                }
                Err(e) => {
                    tracing::warn!(
                        request_id = %payload.request_id,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "webhook attempt failed"
                    );
                    last_error = e.to_string();
                }
            }

            if attempt < self.policy.max_attempts {
                tokio::time::sleep(self.policy.delay_after(attempt)).await;
            }
        }

        self.audit
            .log_webhook_outcome(event, url, key_name, total, false, Some(&last_error))
            .await;
        false
    }

    /// Run [`send`](Self::send) on a background task.
    ///
    /// The task runs to completion even if the handle is dropped.
    pub fn dispatch(&self, event: &str, key_name: &str, pages: Vec<CreatedPage>) -> JoinHandle<bool> {
        let dispatcher = self.clone();
        let event = event.to_string();
        let key_name = key_name.to_string();

        tokio::spawn(async move { dispatcher.send(&event, &key_name, pages).await })
    }

    /// Single unretried delivery of a test payload for the admin API.
    pub async fn send_test(&self) -> Result<(), WebhookError> {
        let settings = self.settings.get().await;
        let url = settings.url().ok_or(WebhookError::MissingWebhookUrl)?;

        let body = serde_json::to_vec(&TestWebhookPayload::new(&self.site_name))?;
        let signature = signature_for(settings.secret(), &body);

        self.post_once(url, body, &signature, None).await
    }

    /// One POST. Any status outside 2xx is an error.
    async fn post_once(
        &self,
        url: &str,
        body: Vec<u8>,
        signature: &str,
        request_id: Option<&str>,
    ) -> Result<(), WebhookError> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body);

        if let Some(request_id) = request_id {
            request = request.header(REQUEST_ID_HEADER, request_id);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            Err(WebhookError::Status(status.as_u16()))
        }
    }
}

impl PageEventNotifier for WebhookDispatcher {
    fn pages_created(&self, key_name: &str, pages: Vec<CreatedPage>) {
        // Fire and forget: the outcome is logged by the task itself.
        let _ = self.dispatch(EVENT_PAGES_CREATED, key_name, pages);
    }
}

/// Generate hex-encoded HMAC-SHA256 signature for webhook payload.
///
/// # Verification
///
/// Receivers should:
/// 1. Read the raw request body
/// 2. Compute HMAC-SHA256(secret, body)
/// 3. Compare against `X-Webhook-Signature` in constant time
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Signature header value; empty when no secret is configured.
fn signature_for(secret: Option<&str>, payload: &[u8]) -> String {
    secret
        .map(|secret| sign_payload(secret, payload))
        .unwrap_or_default()
}

/// Validate webhook URL format.
///
/// # Rules
///
/// - Must be valid absolute URL
/// - Must be HTTPS (HTTP localhost allowed for development)
/// - Maximum 2048 characters
pub fn validate_webhook_url(url: &str) -> Result<(), AppError> {
    if url.len() > 2048 {
        return Err(AppError::InvalidWebhookUrl(
            "URL exceeds 2048 characters".to_string(),
        ));
    }

    let parsed = url::Url::parse(url)
        .map_err(|_| AppError::InvalidWebhookUrl("Invalid URL format".to_string()))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            if matches!(
                parsed.host_str(),
                Some("localhost") | Some("127.0.0.1") | Some("0.0.0.0") | Some("[::1]")
            ) {
                Ok(())
            } else {
                Err(AppError::InvalidWebhookUrl(
                    "HTTP is only allowed for localhost. Use HTTPS for production.".to_string(),
                ))
            }
        }
        _ => Err(AppError::InvalidWebhookUrl(
            "URL must use HTTP or HTTPS".to_string(),
        )),
    }
}
