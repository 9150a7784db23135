pub mod parser;

use crate::models::platform::Platform;

use super::session::{CookieSessionAdapter, SessionSite};
use super::{AdapterResult, Capabilities, ExternalAssignment, ExternalCourse};

pub const DEFAULT_BASE_URL: &str = "https://webassign.net";

/// WebAssign: username login, class dashboard, per-class assignment listing. No gradebook.
pub struct WebAssign;

impl SessionSite for WebAssign {
    const PLATFORM: Platform = Platform::WebAssign;
    const LOGIN_PATH: &'static str = "/login";
    const IDENTIFIER_FIELD: &'static str = "username";
    const COURSES_PATH: &'static str = "/student";
    const CAPABILITIES: Capabilities = Capabilities {
        assignments: true,
        grades: false,
    };

    fn assignments_path(course_id: &str) -> Option<String> {
        Some(format!(
            "/student/class/{}/assignments",
            urlencoding::encode(course_id)
        ))
    }

    fn parse_courses(html: &str) -> AdapterResult<Vec<ExternalCourse>> {
        parser::parse_courses(html)
    }

    fn parse_assignments(html: &str, course_id: &str) -> AdapterResult<Vec<ExternalAssignment>> {
        parser::parse_assignments(html, course_id)
    }
}

pub type WebAssignAdapter = CookieSessionAdapter<WebAssign>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::platforms::PlatformAdapter;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn syncs_classes_and_assignments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_string_contains("username=jdoe"))
            .respond_with(
                ResponseTemplate::new(302).append_header("set-cookie", "UserPass=t0k; Path=/"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/student"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div class="student-classes"><div class="class-card" data-class-id="42"><span class="class-title">Calc I</span></div></div>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/student/class/42/assignments"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<ul class="assignment-list"><li class="assignment" data-assignment-id="9"><b class="assignment-name">Limits</b></li></ul>"#,
            ))
            .mount(&server)
            .await;

        let mut adapter =
            WebAssignAdapter::new(&server.uri(), "jdoe", "pw", &HttpConfig::default()).unwrap();
        adapter.authenticate().await.unwrap();

        let courses = adapter.fetch_courses().await.unwrap();
        assert_eq!(courses.len(), 1);
        let assignments = adapter.fetch_assignments("42").await.unwrap();
        assert_eq!(assignments[0].platform_id.as_deref(), Some("9"));
        assert!(adapter.fetch_grades("42").await.unwrap().is_empty());
        assert!(!adapter.capabilities().grades);
    }
}
