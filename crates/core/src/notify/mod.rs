//! Notification sinks for sync outcomes and study reminders.

pub mod relay;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{HttpConfig, NotificationConfig};
use crate::db::repository::{AssignmentRepository, CourseRepository};
use crate::error::{Result, SatchelError};
use crate::models::platform::Platform;
use crate::models::sync::SyncResult;
use crate::models::user::User;

pub use relay::RelayNotifier;

/// Aggregate counts for a finished sync.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub platform: Platform,
    pub platform_name: &'static str,
    pub new_courses_count: u32,
    pub new_assignments_count: u32,
    pub new_grades_count: u32,
    pub failed_items_count: usize,
}

impl From<&SyncResult> for SyncSummary {
    fn from(result: &SyncResult) -> Self {
        Self {
            platform: result.platform,
            platform_name: result.platform.display_name(),
            new_courses_count: result.new_courses_count,
            new_assignments_count: result.new_assignments_count,
            new_grades_count: result.new_grades_count,
            failed_items_count: result.failed_items.len(),
        }
    }
}

/// A sync that failed before any records were reconciled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncErrorSummary {
    pub platform: Platform,
    pub platform_name: &'static str,
    pub error: String,
    pub occurred_at: DateTime<Utc>,
}

impl SyncErrorSummary {
    pub fn new(platform: Platform, error: impl Into<String>) -> Self {
        Self {
            platform,
            platform_name: platform.display_name(),
            error: error.into(),
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentReminder {
    pub title: String,
    pub due_date: DateTime<Utc>,
    pub course_name: String,
    pub platform: Platform,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeUpdate {
    pub assignment_title: String,
    pub course_name: String,
    pub platform: Platform,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

/// Accepts (recipient, message) pairs. Callers log failures instead of propagating them.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_sync_complete(&self, email: &str, summary: &SyncSummary) -> Result<()>;

    async fn notify_sync_error(&self, email: &str, summary: &SyncErrorSummary) -> Result<()>;

    async fn notify_assignment_reminder(
        &self,
        email: &str,
        reminder: &AssignmentReminder,
    ) -> Result<()>;

    async fn notify_grade_update(&self, email: &str, update: &GradeUpdate) -> Result<()>;
}

/// Writes notifications to the log. Used when no relay is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify_sync_complete(&self, email: &str, summary: &SyncSummary) -> Result<()> {
        info!(
            to = email,
            platform = %summary.platform,
            new_courses = summary.new_courses_count,
            new_assignments = summary.new_assignments_count,
            new_grades = summary.new_grades_count,
            failed_items = summary.failed_items_count,
            "Sync complete"
        );
        Ok(())
    }

    async fn notify_sync_error(&self, email: &str, summary: &SyncErrorSummary) -> Result<()> {
        warn!(
            to = email,
            platform = %summary.platform,
            error = %summary.error,
            "Sync failed"
        );
        Ok(())
    }

    async fn notify_assignment_reminder(
        &self,
        email: &str,
        reminder: &AssignmentReminder,
    ) -> Result<()> {
        info!(
            to = email,
            title = %reminder.title,
            due = %reminder.due_date.to_rfc3339(),
            course = %reminder.course_name,
            "Assignment due soon"
        );
        Ok(())
    }

    async fn notify_grade_update(&self, email: &str, update: &GradeUpdate) -> Result<()> {
        info!(
            to = email,
            assignment = %update.assignment_title,
            score = update.score,
            max_score = ?update.max_score,
            "Grade posted"
        );
        Ok(())
    }
}

/// The relay when notifications are enabled, otherwise the log.
pub fn sink_from_config(
    notifications: &NotificationConfig,
    http: &HttpConfig,
) -> Result<Arc<dyn NotificationSink>> {
    match (&notifications.relay_url, notifications.enabled) {
        (Some(url), true) => Ok(Arc::new(RelayNotifier::new(url, &notifications.from, http)?)),
        _ => {
            debug!("Notifications disabled; logging instead");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Remind `user` of every assignment due within `window` of `now`. Returns how many were sent.
///
/// A failed delivery is logged and skipped.
pub async fn send_due_reminders<R>(
    repo: &R,
    sink: &dyn NotificationSink,
    user: &User,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<usize>
where
    R: CourseRepository + AssignmentRepository + ?Sized,
{
    let horizon = now.checked_add_signed(window).ok_or_else(|| {
        SatchelError::Config(format!("reminder window of {window} runs past the calendar"))
    })?;
    let mut sent = 0;

    for course in repo.list_courses_for_user(user.id).await? {
        for assignment in repo.list_assignments_for_course(course.id).await? {
            let Some(due) = assignment.due_date else {
                continue;
            };
            if due <= now || due > horizon {
                continue;
            }

            let reminder = AssignmentReminder {
                title: assignment.title.clone(),
                due_date: due,
                course_name: course.name.clone(),
                platform: assignment.platform,
            };
            match sink.notify_assignment_reminder(&user.email, &reminder).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(assignment_id = assignment.id, error = %e, "Reminder not delivered")
                }
            }
        }
    }

    info!(user_id = user.id, sent, "Assignment reminders processed");
    Ok(sent)
}
