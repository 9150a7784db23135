//! Mail relay sink: one JSON POST per message, rendered by the relay from a template name.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

use crate::config::HttpConfig;
use crate::error::{Result, SatchelError};

use super::{AssignmentReminder, GradeUpdate, NotificationSink, SyncErrorSummary, SyncSummary};

pub const SYNC_COMPLETE: &str = "sync-complete";
pub const SYNC_ERROR: &str = "sync-error";
pub const ASSIGNMENT_REMINDER: &str = "assignment-reminder";
pub const GRADE_UPDATE: &str = "grade-update";

#[derive(Serialize)]
struct RelayMessage<'a, T: Serialize> {
    to: &'a str,
    from: &'a str,
    template: &'a str,
    data: &'a T,
}

pub struct RelayNotifier {
    client: Client,
    url: String,
    from: String,
}

impl RelayNotifier {
    pub fn new(url: &str, from: &str, http: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(http.timeout())
            .user_agent(http.user_agent.as_str())
            .build()?;
        Ok(Self::with_client(client, url, from))
    }

    pub fn with_client(client: Client, url: &str, from: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            from: from.to_string(),
        }
    }

    async fn send<T: Serialize + Sync>(&self, to: &str, template: &str, data: &T) -> Result<()> {
        let message = RelayMessage {
            to,
            from: &self.from,
            template,
            data,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .map_err(|e| SatchelError::Notify(format!("relay request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(template, status = %status, "Mail relay rejected message");
            return Err(SatchelError::Notify(format!(
                "relay returned {status} for {template}: {body}"
            )));
        }

        info!(template, "Notification handed to mail relay");
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for RelayNotifier {
    async fn notify_sync_complete(&self, email: &str, summary: &SyncSummary) -> Result<()> {
        self.send(email, SYNC_COMPLETE, summary).await
    }

    async fn notify_sync_error(&self, email: &str, summary: &SyncErrorSummary) -> Result<()> {
        self.send(email, SYNC_ERROR, summary).await
    }

    async fn notify_assignment_reminder(
        &self,
        email: &str,
        reminder: &AssignmentReminder,
    ) -> Result<()> {
        self.send(email, ASSIGNMENT_REMINDER, reminder).await
    }

    async fn notify_grade_update(&self, email: &str, update: &GradeUpdate) -> Result<()> {
        self.send(email, GRADE_UPDATE, update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::platform::Platform;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier(server: &MockServer) -> RelayNotifier {
        RelayNotifier::new(
            &format!("{}/send", server.uri()),
            "sync@satchel.test",
            &HttpConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn posts_sync_complete_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(body_partial_json(serde_json::json!({
                "to": "jdoe@example.edu",
                "from": "sync@satchel.test",
                "template": "sync-complete",
                "data": {"platform": "canvas", "platformName": "Canvas", "newCoursesCount": 2}
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let summary = SyncSummary {
            platform: Platform::Canvas,
            platform_name: "Canvas",
            new_courses_count: 2,
            new_assignments_count: 0,
            new_grades_count: 0,
            failed_items_count: 0,
        };
        notifier(&server)
            .notify_sync_complete("jdoe@example.edu", &summary)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn posts_grade_update() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "template": "grade-update",
                "data": {"assignmentTitle": "Lab 3", "score": 18.0, "maxScore": 20.0}
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let update = GradeUpdate {
            assignment_title: "Lab 3".into(),
            course_name: "Chem".into(),
            platform: Platform::Owlv2,
            score: 18.0,
            max_score: Some(20.0),
            percentage: Some(90.0),
        };
        notifier(&server)
            .notify_grade_update("jdoe@example.edu", &update)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn relay_error_status_is_notify_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("queue full"))
            .mount(&server)
            .await;

        let err = notifier(&server)
            .notify_sync_error(
                "jdoe@example.edu",
                &SyncErrorSummary::new(Platform::Piazza, "authentication failed"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SatchelError::Notify(ref m) if m.contains("503") && m.contains("queue full")
        ));
    }

    #[tokio::test]
    async fn unreachable_relay_is_notify_error() {
        let relay = RelayNotifier::with_client(
            Client::new(),
            "http://127.0.0.1:9/send",
            "sync@satchel.test",
        );
        let err = relay
            .notify_sync_error(
                "jdoe@example.edu",
                &SyncErrorSummary::new(Platform::Moodle, "timeout"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SatchelError::Notify(_)));
    }
}
