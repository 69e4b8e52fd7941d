use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LinkRecord {
    pub id: i64,
    pub short_code: String,
    pub original_url: String,
    pub click_count: i64,
    pub created_at: i64,
    pub owner: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortenResponse {
    pub short_code: String,
    pub original_url: String,
    pub short_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Public view of a link used by the stats listing
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStats {
    pub short_code: String,
    pub original_url: String,
    pub click_count: i64,
}

impl From<&LinkRecord> for LinkStats {
    fn from(record: &LinkRecord) -> Self {
        Self {
            short_code: record.short_code.clone(),
            original_url: record.original_url.clone(),
            click_count: record.click_count,
        }
    }
}
