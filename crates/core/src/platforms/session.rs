//! Form-login, cookie-session transport shared by the scraped platforms.

use std::marker::PhantomData;

use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{redirect, Client, StatusCode};
use tracing::{debug, info, warn};

use crate::config::HttpConfig;
use crate::error::{AdapterError, Result};
use crate::models::platform::Platform;

use super::{
    disposed, AdapterResult, AdapterVariant, Capabilities, ExternalAssignment, ExternalCourse,
    ExternalGrade, PlatformAdapter, SessionState,
};

struct SessionCookies {
    raw: Vec<String>,
    header: String,
}

/// An HTTP client bound to one platform login.
///
/// Redirects are never followed: the session cookie arrives on the login redirect itself.
/// Cookies live only in this value and are dropped on [`CookieSession::close`].
pub struct CookieSession {
    platform: Platform,
    base_url: String,
    http: Client,
    cookies: Option<SessionCookies>,
    state: SessionState,
}

impl CookieSession {
    pub fn new(platform: Platform, base_url: &str, settings: &HttpConfig) -> Result<Self> {
        let http = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.as_str())
            .build()?;
        Ok(Self {
            platform,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            cookies: None,
            state: SessionState::Uninitialized,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// `set-cookie` values exactly as the login response sent them.
    pub fn raw_cookies(&self) -> &[String] {
        match &self.cookies {
            Some(cookies) => &cookies.raw,
            None => &[],
        }
    }

    /// Submit the login form. 200 and 302 with at least one cookie count as success.
    pub async fn login(&mut self, path: &str, form: &[(&str, &str)]) -> AdapterResult<()> {
        if self.state == SessionState::Disposed {
            return Err(disposed(self.platform));
        }

        let url = format!("{}{path}", self.base_url);
        debug!(platform = %self.platform, url = %url, "Submitting login form");

        let response = self
            .http
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(|e| AdapterError::Fetch {
                platform: self.platform,
                reason: format!("login request failed: {e}"),
            })?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::FOUND {
            warn!(platform = %self.platform, status = %status, "Login rejected");
            return Err(AdapterError::Authentication {
                platform: self.platform,
                reason: format!("login returned status {status}"),
            });
        }

        let raw: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        if raw.is_empty() {
            return Err(AdapterError::Authentication {
                platform: self.platform,
                reason: "login response carried no session cookie".into(),
            });
        }

        let header = cookie_header(&raw);
        debug!(platform = %self.platform, cookies = raw.len(), "Session established");
        self.cookies = Some(SessionCookies { raw, header });
        self.state = SessionState::Authenticated;
        Ok(())
    }

    /// Authenticated GET returning the page body.
    pub async fn get_html(&self, path: &str) -> AdapterResult<String> {
        let cookies = match (&self.state, &self.cookies) {
            (SessionState::Authenticated, Some(cookies)) => cookies,
            _ => {
                return Err(AdapterError::NotAuthenticated {
                    platform: self.platform,
                })
            }
        };

        let url = format!("{}{path}", self.base_url);
        debug!(platform = %self.platform, url = %url, "Fetching page");

        let response = self
            .http
            .get(&url)
            .header(COOKIE, &cookies.header)
            .send()
            .await
            .map_err(|e| AdapterError::Fetch {
                platform: self.platform,
                reason: format!("GET {path} failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(platform = %self.platform, status = %status, path, "Page request failed");
            return Err(AdapterError::Fetch {
                platform: self.platform,
                reason: format!("GET {path} returned status {status}"),
            });
        }

        response.text().await.map_err(|e| AdapterError::Fetch {
            platform: self.platform,
            reason: format!("failed to read {path}: {e}"),
        })
    }

    pub fn close(&mut self) {
        self.cookies = None;
        self.state = SessionState::Disposed;
    }
}

/// `Cookie` request header built from the `name=value` part of each `set-cookie`.
fn cookie_header(raw: &[String]) -> String {
    raw.iter()
        .filter_map(|c| c.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Where a scraped platform keeps its login form and listing pages, and how to read them.
pub trait SessionSite: Send + Sync + 'static {
    const PLATFORM: Platform;
    const LOGIN_PATH: &'static str;
    /// Form field carrying the login identifier (`username` or `email`).
    const IDENTIFIER_FIELD: &'static str;
    const COURSES_PATH: &'static str;
    const CAPABILITIES: Capabilities;

    fn assignments_path(_course_id: &str) -> Option<String> {
        None
    }

    fn grades_path(_course_id: &str) -> Option<String> {
        None
    }

    fn parse_courses(html: &str) -> AdapterResult<Vec<ExternalCourse>>;

    fn parse_assignments(_html: &str, _course_id: &str) -> AdapterResult<Vec<ExternalAssignment>> {
        Ok(Vec::new())
    }

    fn parse_grades(_html: &str, _course_id: &str) -> AdapterResult<Vec<ExternalGrade>> {
        Ok(Vec::new())
    }
}

/// [`PlatformAdapter`] for any [`SessionSite`].
pub struct CookieSessionAdapter<S: SessionSite> {
    session: CookieSession,
    identifier: String,
    password: String,
    _site: PhantomData<fn() -> S>,
}

impl<S: SessionSite> CookieSessionAdapter<S> {
    pub fn new(
        base_url: &str,
        identifier: &str,
        password: &str,
        settings: &HttpConfig,
    ) -> Result<Self> {
        Ok(Self {
            session: CookieSession::new(S::PLATFORM, base_url, settings)?,
            identifier: identifier.to_string(),
            password: password.to_string(),
            _site: PhantomData,
        })
    }

    pub fn session(&self) -> &CookieSession {
        &self.session
    }
}

#[async_trait]
impl<S: SessionSite> PlatformAdapter for CookieSessionAdapter<S> {
    fn platform(&self) -> Platform {
        S::PLATFORM
    }

    fn variant(&self) -> AdapterVariant {
        AdapterVariant::CookieSession
    }

    fn capabilities(&self) -> Capabilities {
        S::CAPABILITIES
    }

    fn state(&self) -> SessionState {
        self.session.state()
    }

    async fn authenticate(&mut self) -> AdapterResult<()> {
        info!(platform = %S::PLATFORM, "Authenticating");
        let form = [
            (S::IDENTIFIER_FIELD, self.identifier.as_str()),
            ("password", self.password.as_str()),
        ];
        self.session.login(S::LOGIN_PATH, &form).await?;
        info!(platform = %S::PLATFORM, "Authenticated");
        Ok(())
    }

    async fn fetch_courses(&self) -> AdapterResult<Vec<ExternalCourse>> {
        let html = self.session.get_html(S::COURSES_PATH).await?;
        let courses = S::parse_courses(&html)?;
        debug!(platform = %S::PLATFORM, count = courses.len(), "Parsed courses");
        Ok(courses)
    }

    async fn fetch_assignments(&self, course_id: &str) -> AdapterResult<Vec<ExternalAssignment>> {
        self.ensure_authenticated()?;
        let Some(path) = S::assignments_path(course_id) else {
            return Ok(Vec::new());
        };
        let html = self.session.get_html(&path).await?;
        let assignments = S::parse_assignments(&html, course_id)?;
        debug!(
            platform = %S::PLATFORM,
            course_id,
            count = assignments.len(),
            "Parsed assignments"
        );
        Ok(assignments)
    }

    async fn fetch_grades(&self, course_id: &str) -> AdapterResult<Vec<ExternalGrade>> {
        self.ensure_authenticated()?;
        let Some(path) = S::grades_path(course_id) else {
            return Ok(Vec::new());
        };
        let html = self.session.get_html(&path).await?;
        let grades = S::parse_grades(&html, course_id)?;
        debug!(
            platform = %S::PLATFORM,
            course_id,
            count = grades.len(),
            "Parsed grades"
        );
        Ok(grades)
    }

    async fn dispose(&mut self) {
        if self.session.state() != SessionState::Disposed {
            debug!(platform = %S::PLATFORM, "Dropping session");
        }
        self.session.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct TestSite;

    impl SessionSite for TestSite {
        const PLATFORM: Platform = Platform::Piazza;
        const LOGIN_PATH: &'static str = "/login";
        const IDENTIFIER_FIELD: &'static str = "email";
        const COURSES_PATH: &'static str = "/account";
        const CAPABILITIES: Capabilities = Capabilities {
            assignments: false,
            grades: false,
        };

        fn parse_courses(html: &str) -> AdapterResult<Vec<ExternalCourse>> {
            Ok(vec![ExternalCourse {
                platform_id: Some("c1".into()),
                name: Some(html.trim().to_string()),
            }])
        }
    }

    fn adapter(server: &MockServer) -> CookieSessionAdapter<TestSite> {
        CookieSessionAdapter::new(&server.uri(), "a@b.edu", "pw", &HttpConfig::default()).unwrap()
    }

    #[test]
    fn cookie_header_keeps_name_value_pairs() {
        let raw = vec![
            "sid=abc123; Path=/; HttpOnly".to_string(),
            "csrf=xyz; Secure".to_string(),
            "garbage".to_string(),
        ];
        assert_eq!(cookie_header(&raw), "sid=abc123; csrf=xyz");
    }

    #[tokio::test]
    async fn login_302_captures_cookies_without_following() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_string_contains("email=a%40b.edu"))
            .and(body_string_contains("password=pw"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", "/dashboard")
                    .append_header("set-cookie", "sid=abc; Path=/; HttpOnly")
                    .append_header("set-cookie", "remember=1; Path=/"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dashboard"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut adapter = adapter(&server);
        adapter.authenticate().await.unwrap();
        assert_eq!(adapter.state(), SessionState::Authenticated);
        assert_eq!(
            adapter.session().raw_cookies(),
            ["sid=abc; Path=/; HttpOnly", "remember=1; Path=/"]
        );
    }

    #[tokio::test]
    async fn login_401_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mut adapter = adapter(&server);
        let err = adapter.authenticate().await.unwrap_err();
        assert!(matches!(err, AdapterError::Authentication { .. }));
        assert!(err.to_string().contains("401"));
        assert_eq!(adapter.state(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn login_without_cookie_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>Try again</html>"))
            .mount(&server)
            .await;

        let err = adapter(&server).authenticate().await.unwrap_err();
        assert!(err.to_string().contains("no session cookie"));
    }

    #[tokio::test]
    async fn fetch_before_login_is_not_authenticated() {
        let server = MockServer::start().await;
        let adapter = adapter(&server);
        let err = adapter.fetch_courses().await.unwrap_err();
        assert!(matches!(err, AdapterError::NotAuthenticated { .. }));
        let err = adapter.fetch_assignments("c1").await.unwrap_err();
        assert!(matches!(err, AdapterError::NotAuthenticated { .. }));
    }

    #[tokio::test]
    async fn authenticated_get_sends_cookie_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).append_header("set-cookie", "sid=abc; Path=/"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/account"))
            .and(header("cookie", "sid=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Physics 101"))
            .expect(1)
            .mount(&server)
            .await;

        let mut adapter = adapter(&server);
        adapter.authenticate().await.unwrap();
        let courses = adapter.fetch_courses().await.unwrap();
        assert_eq!(courses[0].name.as_deref(), Some("Physics 101"));
        assert!(adapter.fetch_grades("c1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_success_page_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(302).append_header("set-cookie", "sid=abc"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/account"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut adapter = adapter(&server);
        adapter.authenticate().await.unwrap();
        let err = adapter.fetch_courses().await.unwrap_err();
        assert!(matches!(err, AdapterError::Fetch { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn dispose_drops_session_and_blocks_fetches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(302).append_header("set-cookie", "sid=abc"))
            .mount(&server)
            .await;

        let mut adapter = adapter(&server);
        adapter.authenticate().await.unwrap();
        adapter.dispose().await;
        adapter.dispose().await;
        assert_eq!(adapter.state(), SessionState::Disposed);
        assert!(adapter.session().raw_cookies().is_empty());
        assert!(matches!(
            adapter.fetch_courses().await.unwrap_err(),
            AdapterError::NotAuthenticated { .. }
        ));
        assert!(adapter.authenticate().await.is_err());
    }
}
