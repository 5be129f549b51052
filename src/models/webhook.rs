//! Webhook models for settings and event delivery.
//!
//! # Webhook Flow
//!
//! 1. An operator configures a URL (and optionally a secret) via env or the admin API
//! 2. A successful bulk create builds a `pages_created` payload
//! 3. The payload is signed with HMAC-SHA256 and POSTed to the URL
//! 4. The receiver verifies `X-Webhook-Signature` with the shared secret

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::page::CreatedPage;

/// Event name sent after a bulk create.
pub const EVENT_PAGES_CREATED: &str = "pages_created";

/// Event name used by the admin test delivery.
pub const EVENT_TEST: &str = "test_event";

/// Process-wide webhook configuration.
///
/// The secret is kept in plaintext (required for HMAC generation) but is
/// masked in [`WebhookSettingsResponse`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WebhookSettings {
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
}

impl WebhookSettings {
    /// URL to deliver to, if one is set and non-blank.
    pub fn url(&self) -> Option<&str> {
        self.webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Signing secret, if one is set and non-blank.
    pub fn secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_deref()
            .map(str::trim)
            .filter(|secret| !secret.is_empty())
    }
}

/// Admin view of the settings.
#[derive(Debug, Serialize)]
pub struct WebhookSettingsResponse {
    pub webhook_url: Option<String>,
    pub secret_configured: bool,
}

impl From<WebhookSettings> for WebhookSettingsResponse {
    fn from(settings: WebhookSettings) -> Self {
        Self {
            secret_configured: settings.secret().is_some(),
            webhook_url: settings.url().map(str::to_string),
        }
    }
}

/// Webhook payload sent to the configured endpoint.
///
/// # Example
///
/// ```json
/// {
///   "event": "pages_created",
///   "timestamp": "2025-01-15T10:30:00+00:00",
///   "request_id": "req_3f0c1d2e4b5a46f7a8b9c0d1e2f3a4b5",
///   "api_key_name": "CMS importer",
///   "total_pages": 1,
///   "pages": [{ "id": 7, "title": "About", "url": "https://site/pages/7" }]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub timestamp: String,
    pub request_id: String,
    pub api_key_name: String,
    pub total_pages: usize,
    pub pages: Vec<CreatedPage>,
}

impl WebhookEvent {
    pub fn new(event: &str, api_key_name: &str, pages: Vec<CreatedPage>) -> Self {
        Self {
            event: event.to_string(),
            timestamp: rfc3339(Utc::now()),
            request_id: new_request_id(),
            api_key_name: api_key_name.to_string(),
            total_pages: pages.len(),
            pages,
        }
    }
}

/// Payload of the admin test delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestWebhookPayload {
    pub event: String,
    pub timestamp: String,
    pub message: String,
    pub site: String,
}

impl TestWebhookPayload {
    pub fn new(site: &str) -> Self {
        Self {
            event: EVENT_TEST.to_string(),
            timestamp: rfc3339(Utc::now()),
            message: format!("This is a test webhook from {site}."),
            site: site.to_string(),
        }
    }
}

/// Unique per dispatch.
pub fn new_request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_settings_are_unset() {
        let settings = WebhookSettings {
            webhook_url: Some("   ".to_string()),
            webhook_secret: Some(String::new()),
        };

        assert!(settings.url().is_none());
        assert!(settings.secret().is_none());
    }

    #[test]
    fn test_event_counts_pages() {
        let pages = vec![
            CreatedPage {
                id: 1,
                title: "A".to_string(),
                url: "http://site/pages/1".to_string(),
            },
            CreatedPage {
                id: 2,
                title: "B".to_string(),
                url: "http://site/pages/2".to_string(),
            },
        ];
        let event = WebhookEvent::new(EVENT_PAGES_CREATED, "importer", pages);

        assert_eq!(event.total_pages, 2);
        assert!(event.request_id.starts_with("req_"));
        assert!(DateTime::parse_from_rfc3339(&event.timestamp).is_ok());
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(new_request_id(), new_request_id());
    }
}
