//! Request and webhook audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failed,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Failed => "failed",
        }
    }
}

impl TryFrom<String> for LogStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "success" => Ok(LogStatus::Success),
            "failed" => Ok(LogStatus::Failed),
            other => Err(format!("unknown log status: {other}")),
        }
    }
}

/// One row of the append-only `api_logs` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ApiLogEntry {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub key_id: Option<Uuid>,
    pub key_name: Option<String>,
    pub endpoint: String,
    #[sqlx(try_from = "String")]
    pub status: LogStatus,
    pub pages_created: i32,
    pub response_time_ms: Option<i64>,
    pub ip: Option<String>,
    pub message: String,
}

/// Entry to be appended. The store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewApiLogEntry {
    pub key_id: Option<Uuid>,
    pub key_name: Option<String>,
    pub endpoint: String,
    pub status: LogStatus,
    pub pages_created: i32,
    pub response_time_ms: Option<i64>,
    pub ip: Option<String>,
    pub message: String,
}

impl NewApiLogEntry {
    pub fn new(endpoint: impl Into<String>, status: LogStatus) -> Self {
        Self {
            key_id: None,
            key_name: None,
            endpoint: endpoint.into(),
            status,
            pages_created: 0,
            response_time_ms: None,
            ip: None,
            message: String::new(),
        }
    }

    pub fn key(mut self, key_id: Option<Uuid>, key_name: Option<String>) -> Self {
        self.key_id = key_id;
        self.key_name = key_name;
        self
    }

    pub fn pages_created(mut self, count: usize) -> Self {
        self.pages_created = i32::try_from(count).unwrap_or(i32::MAX);
        self
    }

    pub fn response_time_ms(mut self, ms: i64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }

    pub fn ip(mut self, ip: Option<String>) -> Self {
        self.ip = ip;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}
