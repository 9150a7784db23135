use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::platform::Platform;

/// A grade persisted from an external platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: i64,
    pub user_id: i64,
    pub assignment_id: i64,
    pub platform: Platform,
    pub platform_id: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// A fetched grade in the common shape. `assignment_id` is the persisted assignment id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedGrade {
    pub platform_id: String,
    pub platform: Platform,
    pub assignment_id: i64,
    pub score: f64,
    pub max_score: Option<f64>,
    pub percentage: Option<f64>,
    pub owner_user_id: i64,
}

/// Partial update for [`Grade`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradeUpdate {
    pub score: Option<f64>,
    pub max_score: Option<Option<f64>>,
    pub percentage: Option<Option<f64>>,
}
