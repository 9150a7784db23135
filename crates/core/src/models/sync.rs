use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::platform::Platform;

/// Status of a sync run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Running,
    Completed,
    Failed,
}

/// History row for one sync invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncRun {
    pub id: i64,
    pub user_id: i64,
    pub platform: Platform,
    pub status: SyncStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub new_courses: i64,
    pub new_assignments: i64,
    pub new_grades: i64,
    pub failed_items: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Which kind of record a failure concerns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Course,
    Assignment,
    Grade,
}

/// Where in the pipeline a record was dropped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    /// Listing a course's assignments or grades failed.
    Fetch,
    /// The raw record was missing a required field.
    Normalize,
    /// The store rejected the record.
    Persist,
}

/// One record that did not make it into the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
    pub kind: RecordKind,
    pub stage: FailureStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<String>,
    pub record: serde_json::Value,
    pub error: String,
}

/// Outcome of a single sync, returned to the caller and handed to the notifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub platform: Platform,
    pub new_courses_count: u32,
    pub new_assignments_count: u32,
    pub new_grades_count: u32,
    pub failed_items: Vec<FailedItem>,
}

impl SyncResult {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            new_courses_count: 0,
            new_assignments_count: 0,
            new_grades_count: 0,
            failed_items: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed_items.is_empty()
    }
}
