use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::pipeline::ConversionService;
use crate::types::ConversionType;

pub const ANONYMOUS_USER: &str = "anonymous";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConversionService>,
    pub config: Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Completed,
    Failed,
}

impl ConversionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionStatus::Completed => "completed",
            ConversionStatus::Failed => "failed",
        }
    }

    pub fn from_tag(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(ConversionStatus::Completed),
            "failed" => Some(ConversionStatus::Failed),
            _ => None,
        }
    }
}

/// One row per conversion attempt. Terminal from birth: only
/// `download_count` changes after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRecord {
    pub file_id: Uuid,
    pub user_id: String,
    pub original_filename: String,
    pub output_filename: String,
    pub conversion_type: ConversionType,
    pub status: ConversionStatus,
    /// Opaque blob store handle. Present iff `status == Completed`; never sent to clients.
    #[serde(skip_serializing, default)]
    pub storage_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub download_count: i64,
}

impl ConversionRecord {
    pub fn download_url(&self) -> Option<String> {
        match self.status {
            ConversionStatus::Completed => Some(download_url(&self.file_id)),
            ConversionStatus::Failed => None,
        }
    }
}

pub fn download_url(file_id: &Uuid) -> String {
    format!("/api/download/{}", file_id)
}

// API Request/Response types

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub success: bool,
    pub file_id: Uuid,
    pub conversion_type: ConversionType,
    pub output_filename: String,
    pub download_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionListItem {
    #[serde(flatten)]
    pub record: ConversionRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl From<ConversionRecord> for ConversionListItem {
    fn from(record: ConversionRecord) -> Self {
        let download_url = record.download_url();
        Self { record, download_url }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversionsResponse {
    pub conversions: Vec<ConversionListItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeCount {
    pub conversion_type: ConversionType,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub stats: Vec<TypeCount>,
    pub total_conversions: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
    pub storage: String,
}
