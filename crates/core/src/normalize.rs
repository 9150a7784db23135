//! Raw platform records to the common Course/Assignment/Grade shape.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

use crate::models::assignment::NormalizedAssignment;
use crate::models::course::NormalizedCourse;
use crate::models::grade::NormalizedGrade;
use crate::models::platform::Platform;
use crate::platforms::{ExternalAssignment, ExternalCourse, ExternalGrade};

/// Why a raw record could not be normalized. Recorded per item, never fatal.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NormalizeError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("`{field}` is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

pub fn normalize_course(
    owner_user_id: i64,
    platform: Platform,
    raw: &ExternalCourse,
) -> Result<NormalizedCourse, NormalizeError> {
    Ok(NormalizedCourse {
        platform_id: required(&raw.platform_id, "platformId")?,
        platform,
        name: required(&raw.name, "name")?,
        owner_user_id,
    })
}

/// `course_id` is the persisted id of the course the assignment belongs to.
pub fn normalize_assignment(
    owner_user_id: i64,
    platform: Platform,
    course_id: i64,
    raw: &ExternalAssignment,
) -> Result<NormalizedAssignment, NormalizeError> {
    let platform_id = required(&raw.platform_id, "platformId")?;
    let title = required(&raw.title, "title")?;

    let due_date = raw.due_date.as_deref().and_then(|text| {
        let parsed = parse_due_date(text);
        if parsed.is_none() {
            tracing::debug!(
                platform = %platform,
                due = text,
                "Unrecognized due date; storing none"
            );
        }
        parsed
    });

    Ok(NormalizedAssignment {
        platform_id,
        platform,
        title,
        due_date,
        course_id,
        owner_user_id,
    })
}

/// `assignment_id` is the persisted id of the graded assignment.
pub fn normalize_grade(
    owner_user_id: i64,
    platform: Platform,
    assignment_id: i64,
    raw: &ExternalGrade,
) -> Result<NormalizedGrade, NormalizeError> {
    let platform_id = required(&raw.platform_id, "platformId")?;

    let score_text = required(&raw.score, "score")?;
    let (score, out_of) = parse_score(&score_text).ok_or(NormalizeError::InvalidNumber {
        field: "score",
        value: score_text.clone(),
    })?;

    let max_score = match optional(&raw.max_score) {
        Some(text) => Some(parse_number(&text).ok_or(NormalizeError::InvalidNumber {
            field: "maxScore",
            value: text,
        })?),
        None => out_of,
    };

    let percentage = match optional(&raw.percentage) {
        Some(text) => Some(parse_number(&text).ok_or(NormalizeError::InvalidNumber {
            field: "percentage",
            value: text,
        })?),
        None => derive_percentage(score, max_score),
    };

    Ok(NormalizedGrade {
        platform_id,
        platform,
        assignment_id,
        score,
        max_score,
        percentage,
        owner_user_id,
    })
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, NormalizeError> {
    optional(value).ok_or(NormalizeError::MissingField(field))
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS ±ZZZZ`, `YYYY-MM-DD HH:MM[:SS]` (UTC) and `YYYY-MM-DD`.
pub fn parse_due_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// `"85"`, `"85%"`, `"8.0 / 10.0"`. Returns the score and, for the fraction form, the maximum.
pub fn parse_score(text: &str) -> Option<(f64, Option<f64>)> {
    match text.split_once('/') {
        Some((score, max)) => Some((parse_number(score)?, Some(parse_number(max)?))),
        None => Some((parse_number(text)?, None)),
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn derive_percentage(score: f64, max_score: Option<f64>) -> Option<f64> {
    let max = max_score.filter(|m| *m > 0.0)?;
    Some((score / max * 10_000.0).round() / 100.0)
}
