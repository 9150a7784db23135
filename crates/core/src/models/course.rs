use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::platform::Platform;

/// A course persisted from an external platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub user_id: i64,
    pub platform: Platform,
    pub platform_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A fetched course in the common shape, ready for reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCourse {
    pub platform_id: String,
    pub platform: Platform,
    pub name: String,
    pub owner_user_id: i64,
}

/// Partial update for [`Course`]; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseUpdate {
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn course_camel_case_fields() {
        let course = Course {
            id: 7,
            user_id: 1,
            platform: Platform::Canvas,
            platform_id: "101".to_string(),
            name: "Organic Chemistry".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
        };
        let json = serde_json::to_string(&course).unwrap();
        assert!(json.contains("\"userId\""));
        assert!(json.contains("\"platformId\""));
        assert!(json.contains("\"platform\":\"canvas\""));
        let back: Course = serde_json::from_str(&json).unwrap();
        assert_eq!(back, course);
    }
}
