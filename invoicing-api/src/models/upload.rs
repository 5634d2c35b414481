//! Bulk upload batch bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Which entity a bulk upload targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadEntity {
    Clients,
    Products,
}

impl UploadEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadEntity::Clients => "clients",
            UploadEntity::Products => "products",
        }
    }
}

/// Upload batch status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Processing,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }
}

/// One validation or insert failure, addressed by spreadsheet row number
/// (1-based, header excluded).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowError {
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub message: String,
}

/// Record of one bulk upload run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UploadBatch {
    pub batch_id: Uuid,
    pub company_id: Uuid,
    pub entity: String,
    pub filename: String,
    pub status: String,
    pub total_rows: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub skipped: i32,
    pub errors: serde_json::Value,
    pub started_utc: DateTime<Utc>,
    pub finished_utc: Option<DateTime<Utc>>,
}
