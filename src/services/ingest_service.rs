//! Bulk page ingest.
//!
//! A request moves through
//! `Received → Authenticated → RateChecked → Validated → Created → Logged → NotifyAttempted`
//! and may be rejected at any of the first three checks. Exactly one audit
//! entry is written per request whatever the outcome.
//!
//! Items are created one at a time with no surrounding transaction: an item
//! with an empty title or a failed insert is skipped and the rest continue.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::api_key::AuthResult;
use crate::models::api_log::{LogStatus, NewApiLogEntry};
use crate::models::page::{CreatePagesResponse, CreatedPage, NewPage};
use crate::services::audit_logger::AuditLogger;
use crate::services::authenticator::Authenticator;
use crate::services::page_store::PageStore;
use crate::services::rate_limiter::RateLimiter;
use crate::services::sanitize::{sanitize_content, sanitize_text};

/// Endpoint name recorded in the audit log.
pub const CREATE_PAGES_ENDPOINT: &str = "create-pages";

/// Receives created pages after a successful request.
///
/// Implementations must return immediately; delivery happens elsewhere.
pub trait PageEventNotifier: Send + Sync {
    fn pages_created(&self, key_name: &str, pages: Vec<CreatedPage>);
}

/// Credentials as presented by the transport layer.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub api_key: String,
    pub secret: String,
}

/// Where a request was turned away.
#[derive(Debug, Clone, Copy)]
enum Stage {
    Authenticated,
    RateChecked,
    Validated,
}

pub struct IngestService {
    authenticator: Authenticator,
    rate_limiter: Arc<RateLimiter>,
    pages: Arc<dyn PageStore>,
    audit: AuditLogger,
    notifier: Arc<dyn PageEventNotifier>,
}

impl IngestService {
    pub fn new(
        authenticator: Authenticator,
        rate_limiter: Arc<RateLimiter>,
        pages: Arc<dyn PageStore>,
        audit: AuditLogger,
        notifier: Arc<dyn PageEventNotifier>,
    ) -> Self {
        Self {
            authenticator,
            rate_limiter,
            pages,
            audit,
            notifier,
        }
    }

    /// Authenticate, admit, validate and create the pages in `body`.
    ///
    /// # Errors
    ///
    /// - `MissingCredentials` / `InvalidCredentials`: nothing else is touched
    /// - `RateLimited`: the key is over its window limit
    /// - `InvalidPayload`: `pages` missing, empty, not an array or holding non-objects
    ///
    /// Individual items that cannot be created are skipped, so zero created
    /// pages is still a success.
    pub async fn create_pages(
        &self,
        credentials: &Credentials,
        body: &[u8],
        client_ip: Option<String>,
    ) -> Result<CreatePagesResponse, AppError> {
        let started = Instant::now();

        let auth = match self
            .authenticator
            .validate(&credentials.api_key, &credentials.secret)
            .await
        {
            Ok(auth) => auth,
            Err(e) => {
                self.reject(Stage::Authenticated, None, &e, started, client_ip)
                    .await;
                return Err(e);
            }
        };
        self.authenticator.record_usage(&auth).await;

        if !self.rate_limiter.admit(auth.key_id).await {
            let e = AppError::RateLimited;
            self.reject(Stage::RateChecked, Some(&auth), &e, started, client_ip)
                .await;
            return Err(e);
        }

        let items = match parse_pages(body) {
            Ok(items) => items,
            Err(e) => {
                self.reject(Stage::Validated, Some(&auth), &e, started, client_ip)
                    .await;
                return Err(e);
            }
        };

        let requested = items.len();
        let created = self.create_each(items).await;

        self.audit
            .log_api_request(
                NewApiLogEntry::new(CREATE_PAGES_ENDPOINT, LogStatus::Success)
                    .key(Some(auth.key_id), Some(auth.key_name.clone()))
                    .pages_created(created.len())
                    .response_time_ms(elapsed_ms(started))
                    .ip(client_ip)
                    .message(format!("Created {} of {} pages", created.len(), requested)),
            )
            .await;

        if !created.is_empty() {
            self.notifier.pages_created(&auth.key_name, created.clone());
        }

        Ok(CreatePagesResponse::success(created))
    }

    async fn create_each(&self, items: Vec<NewPage>) -> Vec<CreatedPage> {
        let mut created = Vec::with_capacity(items.len());

        for (index, page) in items.into_iter().enumerate() {
            if page.title.is_empty() {
                tracing::debug!(index, "skipping page with empty title");
                continue;
            }

            match self.pages.create(page).await {
                Ok(record) => created.push(CreatedPage::from(record)),
                Err(e) => tracing::warn!(index, error = %e, "page creation failed, skipping"),
            }
        }

        created
    }

    async fn reject(
        &self,
        stage: Stage,
        auth: Option<&AuthResult>,
        error: &AppError,
        started: Instant,
        client_ip: Option<String>,
    ) {
        tracing::debug!(?stage, code = error.code(), "create-pages rejected");

        let entry = NewApiLogEntry::new(CREATE_PAGES_ENDPOINT, LogStatus::Failed)
            .key(
                auth.map(|a| a.key_id),
                auth.map(|a| a.key_name.clone()),
            )
            .response_time_ms(elapsed_ms(started))
            .ip(client_ip)
            .message(error.to_string());

        self.audit.log_api_request(entry).await;
    }
}

/// Extract and sanitize the `pages` array.
///
/// Missing titles or contents become empty strings; empty titles are
/// filtered later so they count as skipped rather than invalid.
fn parse_pages(body: &[u8]) -> Result<Vec<NewPage>, AppError> {
    let invalid = || AppError::InvalidPayload("Invalid or missing pages array.".to_string());

    let value: Value = serde_json::from_slice(body)
        .map_err(|_| AppError::InvalidPayload("Request body must be valid JSON.".to_string()))?;

    let pages = value
        .get("pages")
        .and_then(Value::as_array)
        .filter(|pages| !pages.is_empty())
        .ok_or_else(invalid)?;

    pages
        .iter()
        .map(|item| {
            item.as_object()
                .map(|page| NewPage {
                    title: sanitize_text(&scalar_field(page, "title")),
                    content: sanitize_content(&scalar_field(page, "content")),
                })
                .ok_or_else(|| AppError::InvalidPayload("Each page must be an object.".to_string()))
        })
        .collect()
}

/// Field as text. Numbers and booleans are stringified (`true` as "1",
/// `false` as ""); arrays, objects and null read as empty.
fn scalar_field<'a>(page: &'a Map<String, Value>, name: &str) -> Cow<'a, str> {
    match page.get(name) {
        Some(Value::String(s)) => Cow::Borrowed(s),
        Some(Value::Number(n)) => Cow::Owned(n.to_string()),
        Some(Value::Bool(true)) => Cow::Borrowed("1"),
        _ => Cow::Borrowed(""),
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::api_key::CreateApiKeyRequest;
    use crate::models::page::PageRecord;
    use crate::services::audit_logger::{ApiLogStore, MemoryApiLogStore};
    use crate::services::credential_store::{CredentialStore, MemoryCredentialStore};
    use crate::services::page_store::MemoryPageStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingNotifier {
        calls: Mutex<Vec<(String, Vec<CreatedPage>)>>,
    }

    impl PageEventNotifier for RecordingNotifier {
        fn pages_created(&self, key_name: &str, pages: Vec<CreatedPage>) {
            self.calls
                .lock()
                .unwrap()
                .push((key_name.to_string(), pages));
        }
    }

    /// Rejects any page titled "boom".
    struct FlakyPageStore {
        inner: MemoryPageStore,
    }

    #[async_trait]
    impl PageStore for FlakyPageStore {
        async fn create(&self, page: NewPage) -> Result<PageRecord, AppError> {
            if page.title == "boom" {
                return Err(AppError::StorageUnavailable(sqlx::Error::PoolTimedOut));
            }
            self.inner.create(page).await
        }

        async fn get(&self, id: i64) -> Result<Option<PageRecord>, AppError> {
            self.inner.get(id).await
        }
    }

    struct Harness {
        service: IngestService,
        credentials: Credentials,
        pages: Arc<FlakyPageStore>,
        logs: Arc<MemoryApiLogStore>,
        limiter: Arc<RateLimiter>,
        notifier: Arc<RecordingNotifier>,
    }

    async fn harness(limit: u32) -> Harness {
        let keys = Arc::new(MemoryCredentialStore::new());
        let generated = keys
            .create(CreateApiKeyRequest::named("Importer"))
            .await
            .unwrap();

        let pages = Arc::new(FlakyPageStore {
            inner: MemoryPageStore::new("https://site.example"),
        });
        let logs = Arc::new(MemoryApiLogStore::new());
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(60), limit));
        let notifier = Arc::new(RecordingNotifier::default());

        let service = IngestService::new(
            Authenticator::new(keys),
            limiter.clone(),
            pages.clone(),
            AuditLogger::new(logs.clone()),
            notifier.clone(),
        );

        Harness {
            service,
            credentials: Credentials {
                api_key: generated.api_key,
                secret: generated.secret,
            },
            pages,
            logs,
            limiter,
            notifier,
        }
    }

    fn body(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[tokio::test]
    async fn test_skips_empty_titles_and_notifies_once() {
        let h = harness(10).await;
        let payload = body(json!({
            "pages": [
                {"title": "A", "content": "<p>a</p>"},
                {"title": ""},
                {"title": "B"}
            ]
        }));

        let response = h
            .service
            .create_pages(&h.credentials, &payload, Some("10.0.0.1".into()))
            .await
            .unwrap();

        assert_eq!(response.status, "success");
        assert_eq!(response.created, 2);
        let titles: Vec<&str> = response.pages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert_eq!(h.pages.inner.count().await, 2);

        let calls = h.notifier.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "Importer");
        assert_eq!(calls[0].1, response.pages);

        let entries = h.logs.recent(10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, LogStatus::Success);
        assert_eq!(entries[0].pages_created, 2);
        assert_eq!(entries[0].ip.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_all_titles_empty_is_success_without_webhook() {
        let h = harness(10).await;
        let payload = body(json!({"pages": [{"title": "  "}, {"content": "x"}]}));

        let response = h
            .service
            .create_pages(&h.credentials, &payload, None)
            .await
            .unwrap();

        assert_eq!(response.created, 0);
        assert!(response.pages.is_empty());
        assert!(h.notifier.calls.lock().unwrap().is_empty());
        assert_eq!(
            h.logs.recent(1).await.unwrap()[0].status,
            LogStatus::Success
        );
    }

    #[tokio::test]
    async fn test_store_failure_skips_item() {
        let h = harness(10).await;
        let payload = body(json!({"pages": [{"title": "A"}, {"title": "boom"}, {"title": "C"}]}));

        let response = h
            .service
            .create_pages(&h.credentials, &payload, None)
            .await
            .unwrap();

        assert_eq!(response.created, 2);
        assert_eq!(response.pages[1].title, "C");
    }

    #[tokio::test]
    async fn test_sanitizes_title_and_content() {
        let h = harness(10).await;
        let payload = body(json!({
            "pages": [{"title": " <b>Hello</b>\n world ", "content": "<p>x</p><script>bad()</script>"}]
        }));

        let response = h
            .service
            .create_pages(&h.credentials, &payload, None)
            .await
            .unwrap();

        let stored = h.pages.get(response.pages[0].id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Hello world");
        assert_eq!(stored.content, "<p>x</p>");
    }

    #[tokio::test]
    async fn test_scalar_titles_are_stringified() {
        let h = harness(10).await;
        let payload = body(json!({
            "pages": [
                {"title": 42, "content": 7},
                {"title": true},
                {"title": false},
                {"title": null},
                {"title": ["x"]}
            ]
        }));

        let response = h
            .service
            .create_pages(&h.credentials, &payload, None)
            .await
            .unwrap();

        let titles: Vec<&str> = response.pages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["42", "1"]);

        let stored = h.pages.get(response.pages[0].id).await.unwrap().unwrap();
        assert_eq!(stored.content, "7");
    }

    #[tokio::test]
    async fn test_invalid_payloads() {
        let h = harness(10).await;

        for payload in [
            body(json!({"pages": []})),
            body(json!({})),
            body(json!({"pages": "nope"})),
            body(json!({"pages": [1, 2]})),
            b"not json".to_vec(),
            Vec::new(),
        ] {
            let result = h.service.create_pages(&h.credentials, &payload, None).await;
            assert!(matches!(result, Err(AppError::InvalidPayload(_))));
        }

        assert!(h.notifier.calls.lock().unwrap().is_empty());
        assert_eq!(h.pages.inner.count().await, 0);
        let entries = h.logs.recent(10).await.unwrap();
        assert_eq!(entries.len(), 6);
        assert!(entries.iter().all(|e| e.status == LogStatus::Failed));
    }

    #[tokio::test]
    async fn test_missing_credentials_touch_nothing() {
        let h = harness(10).await;
        let payload = body(json!({"pages": [{"title": "A"}]}));

        let result = h
            .service
            .create_pages(&Credentials::default(), &payload, None)
            .await;

        assert!(matches!(result, Err(AppError::MissingCredentials)));
        assert_eq!(h.limiter.tracked_keys().await, 0);
        assert_eq!(h.pages.inner.count().await, 0);
        assert!(h.notifier.calls.lock().unwrap().is_empty());

        let entry = h.logs.recent(1).await.unwrap().remove(0);
        assert_eq!(entry.status, LogStatus::Failed);
        assert!(entry.key_id.is_none());
    }

    #[tokio::test]
    async fn test_invalid_credentials() {
        let h = harness(10).await;
        let payload = body(json!({"pages": [{"title": "A"}]}));
        let credentials = Credentials {
            api_key: h.credentials.api_key.clone(),
            secret: "wrong".to_string(),
        };

        let result = h.service.create_pages(&credentials, &payload, None).await;

        assert!(matches!(result, Err(AppError::InvalidCredentials)));
        assert_eq!(h.limiter.tracked_keys().await, 0);
        assert_eq!(h.pages.inner.count().await, 0);
    }

    #[tokio::test]
    async fn test_rate_limited_after_limit() {
        let h = harness(1).await;
        let payload = body(json!({"pages": [{"title": "A"}]}));

        h.service
            .create_pages(&h.credentials, &payload, None)
            .await
            .unwrap();
        let result = h.service.create_pages(&h.credentials, &payload, None).await;

        assert!(matches!(result, Err(AppError::RateLimited)));
        assert_eq!(h.pages.inner.count().await, 1);

        let entry = h.logs.recent(1).await.unwrap().remove(0);
        assert_eq!(entry.status, LogStatus::Failed);
        assert_eq!(entry.pages_created, 0);
        assert_eq!(entry.key_name.as_deref(), Some("Importer"));
    }
}
