//! Audit trail for API requests and webhook deliveries.
//!
//! [`AuditLogger`] never fails its caller: every entry is emitted as a
//! `tracing` event and appended to an [`ApiLogStore`]. A failed append is
//! reported on the error log and swallowed, so logging can never fail a
//! page-creation request.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::api_log::{ApiLogEntry, LogStatus, NewApiLogEntry};

#[async_trait]
pub trait ApiLogStore: Send + Sync {
    async fn append(&self, entry: NewApiLogEntry) -> Result<ApiLogEntry, AppError>;

    /// Newest entries first.
    async fn recent(&self, limit: i64) -> Result<Vec<ApiLogEntry>, AppError>;
}

/// `api_logs` table.
pub struct PgApiLogStore {
    pool: DbPool,
}

impl PgApiLogStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiLogStore for PgApiLogStore {
    async fn append(&self, entry: NewApiLogEntry) -> Result<ApiLogEntry, AppError> {
        let row = sqlx::query_as::<_, ApiLogEntry>(
            r#"
            INSERT INTO api_logs (
                key_id, key_name, endpoint, status, pages_created,
                response_time_ms, ip, message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(entry.key_id)
        .bind(entry.key_name)
        .bind(entry.endpoint)
        .bind(entry.status.as_str())
        .bind(entry.pages_created)
        .bind(entry.response_time_ms)
        .bind(entry.ip)
        .bind(entry.message)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ApiLogEntry>, AppError> {
        let rows = sqlx::query_as::<_, ApiLogEntry>(
            "SELECT * FROM api_logs ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[derive(Default)]
pub struct MemoryApiLogStore {
    entries: RwLock<Vec<ApiLogEntry>>,
}

impl MemoryApiLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApiLogStore for MemoryApiLogStore {
    async fn append(&self, entry: NewApiLogEntry) -> Result<ApiLogEntry, AppError> {
        let mut entries = self.entries.write().await;
        let row = ApiLogEntry {
            id: entries.len() as i64 + 1,
            created_at: Utc::now(),
            key_id: entry.key_id,
            key_name: entry.key_name,
            endpoint: entry.endpoint,
            status: entry.status,
            pages_created: entry.pages_created,
            response_time_ms: entry.response_time_ms,
            ip: entry.ip,
            message: entry.message,
        };
        entries.push(row.clone());
        Ok(row)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ApiLogEntry>, AppError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn ApiLogStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn ApiLogStore>) -> Self {
        Self { store }
    }

    /// Record one inbound API request.
    pub async fn log_api_request(&self, entry: NewApiLogEntry) {
        match entry.status {
            LogStatus::Success => tracing::info!(
                target: "audit",
                endpoint = %entry.endpoint,
                key_name = entry.key_name.as_deref().unwrap_or("-"),
                pages_created = entry.pages_created,
                response_time_ms = entry.response_time_ms,
                "api request succeeded"
            ),
            LogStatus::Failed => tracing::warn!(
                target: "audit",
                endpoint = %entry.endpoint,
                key_name = entry.key_name.as_deref().unwrap_or("-"),
                ip = entry.ip.as_deref().unwrap_or("-"),
                message = %entry.message,
                "api request failed"
            ),
        }

        self.append(entry).await;
    }

    /// Record the final outcome of a webhook delivery.
    pub async fn log_webhook_outcome(
        &self,
        event: &str,
        url: &str,
        key_name: &str,
        pages: usize,
        success: bool,
        error: Option<&str>,
    ) {
        let (status, message) = if success {
            tracing::info!(target: "audit", event, url, "webhook delivered");
            (LogStatus::Success, format!("Webhook delivered to {url}"))
        } else {
            let reason = error.unwrap_or("unknown error");
            tracing::warn!(target: "audit", event, url, reason, "webhook delivery failed");
            (LogStatus::Failed, format!("Webhook to {url} failed: {reason}"))
        };

        let entry = NewApiLogEntry::new(format!("webhook:{event}"), status)
            .key(None, Some(key_name.to_string()))
            .pages_created(pages)
            .message(message);

        self.append(entry).await;
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<ApiLogEntry>, AppError> {
        self.store.recent(limit).await
    }

    async fn append(&self, entry: NewApiLogEntry) {
        let endpoint = entry.endpoint.clone();
        if let Err(e) = self.store.append(entry).await {
            tracing::error!(%endpoint, error = %e, "failed to write api log entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingStore;

    #[async_trait]
    impl ApiLogStore for FailingStore {
        async fn append(&self, _entry: NewApiLogEntry) -> Result<ApiLogEntry, AppError> {
            Err(AppError::StorageUnavailable(sqlx::Error::PoolTimedOut))
        }

        async fn recent(&self, _limit: i64) -> Result<Vec<ApiLogEntry>, AppError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_entries_listed_newest_first() {
        let store = Arc::new(MemoryApiLogStore::new());
        let logger = AuditLogger::new(store.clone());

        logger
            .log_api_request(NewApiLogEntry::new("create-pages", LogStatus::Failed))
            .await;
        logger
            .log_api_request(
                NewApiLogEntry::new("create-pages", LogStatus::Success).pages_created(2),
            )
            .await;

        let entries = logger.recent(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, LogStatus::Success);
        assert_eq!(entries[0].pages_created, 2);
        assert_eq!(entries[1].status, LogStatus::Failed);

        assert_eq!(logger.recent(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_webhook_outcome_entry() {
        let store = Arc::new(MemoryApiLogStore::new());
        let logger = AuditLogger::new(store.clone());

        logger
            .log_webhook_outcome(
                "pages_created",
                "http://hook",
                "Importer",
                3,
                false,
                Some("HTTP 500"),
            )
            .await;

        let entry = store.recent(1).await.unwrap().remove(0);
        assert_eq!(entry.endpoint, "webhook:pages_created");
        assert_eq!(entry.status, LogStatus::Failed);
        assert_eq!(entry.key_name.as_deref(), Some("Importer"));
        assert!(entry.message.contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_store_failure_is_contained() {
        let logger = AuditLogger::new(Arc::new(FailingStore));

        // Must return normally even though the store rejects the write.
        logger
            .log_api_request(NewApiLogEntry::new("create-pages", LogStatus::Success))
            .await;
        logger
            .log_webhook_outcome("pages_created", "http://hook", "k", 1, true, None)
            .await;
    }
}
