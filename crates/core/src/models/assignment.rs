use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::platform::Platform;

/// An assignment persisted from an external platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub platform: Platform,
    pub platform_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A fetched assignment in the common shape. `course_id` is the persisted course id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedAssignment {
    pub platform_id: String,
    pub platform: Platform,
    pub title: String,
    pub due_date: Option<DateTime<Utc>>,
    pub course_id: i64,
    pub owner_user_id: i64,
}

/// Partial update for [`Assignment`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentUpdate {
    pub title: Option<String>,
    /// `Some(None)` clears the due date.
    pub due_date: Option<Option<DateTime<Utc>>>,
}
