//! Page storage.
//!
//! Pages are owned by the store; the ingest path only creates them and reads
//! back id and permalink. Each insert is independent of the others.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::page::{NewPage, PageRecord};

pub const PAGE_STATUS_PUBLISHED: &str = "published";

#[async_trait]
pub trait PageStore: Send + Sync {
    /// Insert one published page.
    async fn create(&self, page: NewPage) -> Result<PageRecord, AppError>;

    async fn get(&self, id: i64) -> Result<Option<PageRecord>, AppError>;
}

fn permalink(base_url: &str, id: i64) -> String {
    format!("{}/pages/{}", base_url.trim_end_matches('/'), id)
}

/// `pages` table.
pub struct PgPageStore {
    pool: DbPool,
    base_url: String,
}

impl PgPageStore {
    pub fn new(pool: DbPool, base_url: impl Into<String>) -> Self {
        Self {
            pool,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PageStore for PgPageStore {
    async fn create(&self, page: NewPage) -> Result<PageRecord, AppError> {
        // The permalink embeds the id, so take it from the sequence up front.
        let record = sqlx::query_as::<_, PageRecord>(
            r#"
            WITH next AS (SELECT nextval(pg_get_serial_sequence('pages', 'id')) AS id)
            INSERT INTO pages (id, title, content, status, url)
            SELECT id, $1, $2, $3, $4 || '/pages/' || id FROM next
            RETURNING *
            "#,
        )
        .bind(page.title)
        .bind(page.content)
        .bind(PAGE_STATUS_PUBLISHED)
        .bind(&self.base_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get(&self, id: i64) -> Result<Option<PageRecord>, AppError> {
        let record = sqlx::query_as::<_, PageRecord>("SELECT * FROM pages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }
}

pub struct MemoryPageStore {
    base_url: String,
    next_id: AtomicI64,
    pages: RwLock<Vec<PageRecord>>,
}

impl MemoryPageStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            next_id: AtomicI64::new(1),
            pages: RwLock::new(Vec::new()),
        }
    }

    pub async fn count(&self) -> usize {
        self.pages.read().await.len()
    }
}

#[async_trait]
impl PageStore for MemoryPageStore {
    async fn create(&self, page: NewPage) -> Result<PageRecord, AppError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = PageRecord {
            id,
            title: page.title,
            content: page.content,
            status: PAGE_STATUS_PUBLISHED.to_string(),
            url: permalink(&self.base_url, id),
            created_at: Utc::now(),
        };
        self.pages.write().await.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: i64) -> Result<Option<PageRecord>, AppError> {
        Ok(self.pages.read().await.iter().find(|p| p.id == id).cloned())
    }
}
