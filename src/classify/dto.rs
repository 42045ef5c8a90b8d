use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::classify::repo::HistoryRecord;
use crate::users::dto::PublicUser;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationSummary {
    pub disease: String,
    pub confidence: Option<f64>,
    pub crop_type: Option<String>,
    pub full_result: Value,
}

/// Payload of a successful POST /api/classify.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyData {
    pub id: Uuid,
    pub user: PublicUser,
    pub image: String,
    pub classification: ClassificationSummary,
    pub insights: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: Uuid,
    pub image: String,
    pub disease: String,
    pub crop_type: Option<String>,
    pub model_response: String,
    pub genai_response: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<HistoryRecord> for HistoryItem {
    fn from(r: HistoryRecord) -> Self {
        Self {
            id: r.id,
            image: r.image_url,
            disease: r.disease,
            crop_type: r.crop_type,
            model_response: r.model_response,
            genai_response: r.genai_response,
            created_at: r.created_at,
        }
    }
}

/// Single record with its owner embedded, for GET /api/classification/:id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDetails {
    pub user: PublicUser,
    #[serde(flatten)]
    pub record: HistoryItem,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub email: String,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}
fn default_page() -> i64 {
    1
}
fn default_limit() -> i64 {
    10
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryListData {
    pub history: Vec<HistoryItem>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiseaseCount {
    pub disease: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CropCount {
    pub crop_type: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsData {
    pub total_scans: i64,
    pub disease_distribution: Vec<DiseaseCount>,
    pub crop_distribution: Vec<CropCount>,
    pub recent_scans: Vec<HistoryItem>,
}

impl StatsData {
    pub fn empty() -> Self {
        Self {
            total_scans: 0,
            disease_distribution: Vec::new(),
            crop_distribution: Vec::new(),
            recent_scans: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteHistoryRequest {
    pub email: String,
}
