pub mod models;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION, LINK};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::HttpConfig;
use crate::error::{AdapterError, Result};
use crate::models::platform::Platform;

use self::models::{CanvasAssignment, CanvasCourse, CanvasProfile, CanvasSubmission};
use super::{
    disposed, AdapterResult, AdapterVariant, Capabilities, ExternalAssignment, ExternalCourse,
    ExternalGrade, PlatformAdapter, SessionState,
};

const PLATFORM: Platform = Platform::Canvas;
const PER_PAGE: u32 = 100;
const MAX_PAGES: usize = 50;

/// Canvas LMS over its REST API with a personal access token.
pub struct CanvasAdapter {
    base_url: String,
    api_key: String,
    http: Client,
    state: SessionState,
}

impl CanvasAdapter {
    pub fn new(base_url: &str, api_key: &str, settings: &HttpConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.as_str())
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
            state: SessionState::Uninitialized,
        })
    }

    async fn get(&self, url: &str) -> AdapterResult<reqwest::Response> {
        self.http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| AdapterError::Fetch {
                platform: PLATFORM,
                reason: format!("request failed: {e}"),
            })
    }

    /// Fetch every page of a collection endpoint, following `Link: rel="next"`.
    async fn get_all<T: DeserializeOwned>(&self, path: &str) -> AdapterResult<Vec<T>> {
        self.ensure_authenticated()?;

        let mut results = Vec::new();
        let mut next = Some(format!("{}{path}", self.base_url));
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages == MAX_PAGES {
                warn!(path, pages, "Stopping pagination at page limit");
                break;
            }
            pages += 1;
            debug!(url = %url, "Fetching page");

            let response = self.get(&url).await?;
            let status = response.status();
            if !status.is_success() {
                warn!(status = %status, path, "Canvas API request failed");
                return Err(AdapterError::Fetch {
                    platform: PLATFORM,
                    reason: format!("GET {path} returned status {status}"),
                });
            }

            next = next_link(response.headers());
            let body = response.text().await.map_err(|e| AdapterError::Fetch {
                platform: PLATFORM,
                reason: format!("failed to read {path}: {e}"),
            })?;
            let page: Vec<T> = serde_json::from_str(&body).map_err(|e| AdapterError::Parse {
                platform: PLATFORM,
                reason: format!("unexpected response for {path}: {e}"),
            })?;
            results.extend(page);
        }

        Ok(results)
    }
}

/// Target of the `rel="next"` entry in an RFC 5988 `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .find_map(|entry| {
            let mut parts = entry.split(';');
            let target = parts.next()?.trim();
            let is_next = parts.any(|p| {
                let p = p.trim();
                p == r#"rel="next""# || p == "rel=next"
            });
            is_next.then(|| {
                target
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string()
            })
        })
}

#[async_trait]
impl PlatformAdapter for CanvasAdapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    fn variant(&self) -> AdapterVariant {
        AdapterVariant::Token
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn state(&self) -> SessionState {
        self.state
    }

    async fn authenticate(&mut self) -> AdapterResult<()> {
        if self.state == SessionState::Disposed {
            return Err(disposed(PLATFORM));
        }
        info!(base_url = %self.base_url, "Authenticating with Canvas");

        let url = format!("{}/api/v1/users/self", self.base_url);
        let response = self.get(&url).await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Canvas rejected the access token");
            return Err(AdapterError::Authentication {
                platform: PLATFORM,
                reason: format!("token probe returned status {status}"),
            });
        }

        if let Ok(profile) = response.json::<CanvasProfile>().await {
            debug!(canvas_user = %profile.id.to_native(), "Canvas token accepted");
        }
        self.state = SessionState::Authenticated;
        Ok(())
    }

    async fn fetch_courses(&self) -> AdapterResult<Vec<ExternalCourse>> {
        let courses: Vec<CanvasCourse> = self
            .get_all(&format!(
                "/api/v1/courses?enrollment_state=active&per_page={PER_PAGE}"
            ))
            .await?;
        info!(count = courses.len(), "Fetched Canvas courses");

        Ok(courses
            .into_iter()
            .map(|c| ExternalCourse {
                platform_id: c.id.map(|id| id.to_native()),
                name: c.name.or(c.course_code),
            })
            .collect())
    }

    async fn fetch_assignments(&self, course_id: &str) -> AdapterResult<Vec<ExternalAssignment>> {
        let assignments: Vec<CanvasAssignment> = self
            .get_all(&format!(
                "/api/v1/courses/{}/assignments?per_page={PER_PAGE}",
                urlencoding::encode(course_id)
            ))
            .await?;
        debug!(course_id, count = assignments.len(), "Fetched Canvas assignments");

        Ok(assignments
            .into_iter()
            .map(|a| ExternalAssignment {
                platform_id: a.id.map(|id| id.to_native()),
                title: a.name,
                due_date: a.due_at,
                course_platform_id: course_id.to_string(),
            })
            .collect())
    }

    /// The caller's own submissions; ungraded ones are skipped.
    async fn fetch_grades(&self, course_id: &str) -> AdapterResult<Vec<ExternalGrade>> {
        let submissions: Vec<CanvasSubmission> = self
            .get_all(&format!(
                "/api/v1/courses/{}/students/submissions\
                 ?student_ids[]=self&include[]=assignment&per_page={PER_PAGE}",
                urlencoding::encode(course_id)
            ))
            .await?;
        debug!(course_id, count = submissions.len(), "Fetched Canvas submissions");

        Ok(submissions
            .into_iter()
            .filter_map(|s| {
                let score = s.score?;
                Some(ExternalGrade {
                    platform_id: s.id.map(|id| id.to_native()),
                    assignment_platform_id: s.assignment_id.map(|id| id.to_native()),
                    score: Some(score.to_string()),
                    max_score: s
                        .assignment
                        .and_then(|a| a.points_possible)
                        .map(|p| p.to_string()),
                    percentage: None,
                })
            })
            .collect())
    }

    async fn dispose(&mut self) {
        self.state = SessionState::Disposed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn authenticated(server: &MockServer) -> CanvasAdapter {
        Mock::given(method("GET"))
            .and(path("/api/v1/users/self"))
            .and(header("authorization", "Bearer good-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": 1, "name": "Jane Doe"})),
            )
            .mount(server)
            .await;

        let mut adapter =
            CanvasAdapter::new(&server.uri(), "good-token", &HttpConfig::default()).unwrap();
        adapter.authenticate().await.unwrap();
        adapter
    }

    #[tokio::test]
    async fn authenticate_success_then_two_courses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/courses"))
            .and(query_param("enrollment_state", "active"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 101, "name": "Organic Chemistry"},
                {"id": 102, "name": "Linear Algebra"}
            ])))
            .mount(&server)
            .await;

        let adapter = authenticated(&server).await;
        assert_eq!(adapter.state(), SessionState::Authenticated);
        let courses = adapter.fetch_courses().await.unwrap();
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].platform_id.as_deref(), Some("101"));
        assert_eq!(courses[1].name.as_deref(), Some("Linear Algebra"));
    }

    #[tokio::test]
    async fn bad_token_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/self"))
            .respond_with(ResponseTemplate::new(401).set_body_json(
                serde_json::json!({"errors": [{"message": "Invalid access token."}]}),
            ))
            .mount(&server)
            .await;

        let mut adapter =
            CanvasAdapter::new(&server.uri(), "bad-token", &HttpConfig::default()).unwrap();
        let err = adapter.authenticate().await.unwrap_err();
        assert!(matches!(err, AdapterError::Authentication { .. }));
        assert!(matches!(
            adapter.fetch_courses().await.unwrap_err(),
            AdapterError::NotAuthenticated { .. }
        ));
    }

    #[tokio::test]
    async fn follows_link_header_pagination() {
        let server = MockServer::start().await;
        let next = format!(
            "<{}/api/v1/courses/5/assignments?page=2&per_page=100>; rel=\"next\", <{}/api/v1/courses/5/assignments?page=1&per_page=100>; rel=\"first\"",
            server.uri(),
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/api/v1/courses/5/assignments"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 3, "name": "Final project", "due_at": null}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/courses/5/assignments"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", next.as_str())
                    .set_body_json(serde_json::json!([
                        {"id": 1, "name": "HW 1", "due_at": "2025-02-01T23:59:00Z"},
                        {"id": 2, "name": "HW 2", "due_at": "2025-02-08T23:59:00Z"}
                    ])),
            )
            .mount(&server)
            .await;

        let adapter = authenticated(&server).await;
        let assignments = adapter.fetch_assignments("5").await.unwrap();
        let ids: Vec<_> = assignments
            .iter()
            .map(|a| a.platform_id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(
            assignments[0].due_date.as_deref(),
            Some("2025-02-01T23:59:00Z")
        );
        assert!(assignments[2].due_date.is_none());
    }

    #[tokio::test]
    async fn grades_skip_ungraded_submissions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/courses/5/students/submissions"))
            .and(query_param("student_ids[]", "self"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 900, "assignment_id": 1, "score": 42.5, "workflow_state": "graded",
                 "assignment": {"id": 1, "points_possible": 50}},
                {"id": 901, "assignment_id": 2, "score": null, "workflow_state": "unsubmitted",
                 "assignment": {"id": 2, "points_possible": 10}}
            ])))
            .mount(&server)
            .await;

        let adapter = authenticated(&server).await;
        let grades = adapter.fetch_grades("5").await.unwrap();
        assert_eq!(grades.len(), 1);
        assert_eq!(grades[0].platform_id.as_deref(), Some("900"));
        assert_eq!(grades[0].assignment_platform_id.as_deref(), Some("1"));
        assert_eq!(grades[0].score.as_deref(), Some("42.5"));
        assert_eq!(grades[0].max_score.as_deref(), Some("50"));
    }

    #[tokio::test]
    async fn server_error_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/courses"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let adapter = authenticated(&server).await;
        let err = adapter.fetch_courses().await.unwrap_err();
        assert!(matches!(err, AdapterError::Fetch { .. }));
    }

    #[tokio::test]
    async fn malformed_json_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/courses"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let adapter = authenticated(&server).await;
        let err = adapter.fetch_courses().await.unwrap_err();
        assert!(matches!(err, AdapterError::Parse { .. }));
    }

    #[test]
    fn next_link_absent_on_last_page() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            r#"<https://c.edu/api/v1/courses?page=1>; rel="first", <https://c.edu/api/v1/courses?page=1>; rel="last""#
                .parse()
                .unwrap(),
        );
        assert_eq!(next_link(&headers), None);
    }
}
