//! Page records and the bulk-create request/response shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A page held by the page store. Every page created here is published.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PageRecord {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub status: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Sanitized input for a single page insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPage {
    pub title: String,
    pub content: String,
}

/// Summary of a created page, returned to the caller and sent in webhooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPage {
    pub id: i64,
    pub title: String,
    pub url: String,
}

impl From<PageRecord> for CreatedPage {
    fn from(page: PageRecord) -> Self {
        Self {
            id: page.id,
            title: page.title,
            url: page.url,
        }
    }
}

/// Response of `POST /pagebuilder/v1/create-pages`.
///
/// ```json
/// {
///   "status": "success",
///   "message": "Pages created successfully.",
///   "created": 2,
///   "pages": [{ "id": 1, "title": "A", "url": "https://site/pages/1" }]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePagesResponse {
    pub status: String,
    pub message: String,
    pub created: usize,
    pub pages: Vec<CreatedPage>,
}

impl CreatePagesResponse {
    pub fn success(pages: Vec<CreatedPage>) -> Self {
        Self {
            status: "success".to_string(),
            message: "Pages created successfully.".to_string(),
            created: pages.len(),
            pages,
        }
    }
}
