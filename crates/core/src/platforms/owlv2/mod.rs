//! OWLv2 (Cengage), which only renders data client-side and is driven through a headless browser.

pub mod browser;
pub mod parser;
pub mod webdriver;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::error::AdapterError;
use crate::models::platform::Platform;

use self::browser::{wait_for_navigation, wait_for_selector, BrowserLauncher, BrowserSession};
use super::{
    disposed, AdapterResult, AdapterVariant, Capabilities, ExternalAssignment, ExternalCourse,
    ExternalGrade, PlatformAdapter, SessionState,
};

pub const DEFAULT_BASE_URL: &str = "https://owlv2.cengage.com";

const PLATFORM: Platform = Platform::Owlv2;
const USERNAME_FIELD: &str = "#username";
const PASSWORD_FIELD: &str = "#password";
const SUBMIT_BUTTON: &str = r#"button[type="submit"]"#;
const FAILED_LOGIN_MARKERS: [&str; 2] = ["login", "error"];

/// Deadlines for every bounded browser wait.
#[derive(Debug, Clone, Copy)]
pub struct BrowserTimeouts {
    /// Login form rendering.
    pub login: Duration,
    /// Post-submit navigation.
    pub navigation: Duration,
    /// Listing containers on data pages.
    pub element: Duration,
}

impl BrowserTimeouts {
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            login: Duration::from_secs(config.login_timeout_secs),
            navigation: Duration::from_secs(config.navigation_timeout_secs),
            element: Duration::from_secs(config.element_timeout_secs),
        }
    }
}

impl Default for BrowserTimeouts {
    fn default() -> Self {
        Self::from_config(&BrowserConfig::default())
    }
}

/// Owns at most one browser for its lifetime; [`PlatformAdapter::dispose`] closes it.
pub struct Owlv2Adapter {
    base_url: String,
    username: String,
    password: String,
    launcher: Arc<dyn BrowserLauncher>,
    timeouts: BrowserTimeouts,
    browser: Mutex<Option<Box<dyn BrowserSession>>>,
    state: SessionState,
}

impl Owlv2Adapter {
    pub fn new(
        base_url: &str,
        username: &str,
        password: &str,
        launcher: Arc<dyn BrowserLauncher>,
        timeouts: BrowserTimeouts,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            launcher,
            timeouts,
            browser: Mutex::new(None),
            state: SessionState::Uninitialized,
        }
    }

    /// Navigate to `path`, wait for `container`, and return the rendered page.
    async fn load(&self, path: &str, container: &str) -> AdapterResult<String> {
        self.ensure_authenticated()?;
        let guard = self.browser.lock().await;
        let session = guard
            .as_deref()
            .ok_or(AdapterError::NotAuthenticated { platform: PLATFORM })?;

        session.goto(&format!("{}{path}", self.base_url)).await?;
        wait_for_selector(session, PLATFORM, container, self.timeouts.element).await?;
        session.page_source().await
    }
}

async fn login(
    session: &dyn BrowserSession,
    base_url: &str,
    username: &str,
    password: &str,
    timeouts: &BrowserTimeouts,
) -> AdapterResult<()> {
    session.goto(&format!("{base_url}/login")).await?;
    wait_for_selector(session, PLATFORM, USERNAME_FIELD, timeouts.login).await?;

    session.type_into(USERNAME_FIELD, username).await?;
    session.type_into(PASSWORD_FIELD, password).await?;
    let before = session.current_url().await?;
    session.click(SUBMIT_BUTTON).await?;

    let landed = wait_for_navigation(session, PLATFORM, &before, timeouts.navigation).await?;
    let lowered = landed.to_ascii_lowercase();
    if FAILED_LOGIN_MARKERS.iter().any(|m| lowered.contains(m)) {
        warn!(url = %landed, "OWLv2 login bounced back");
        return Err(AdapterError::Authentication {
            platform: PLATFORM,
            reason: "login page rejected the credentials".into(),
        });
    }
    Ok(())
}

#[async_trait]
impl PlatformAdapter for Owlv2Adapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    fn variant(&self) -> AdapterVariant {
        AdapterVariant::HeadlessBrowser
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn state(&self) -> SessionState {
        self.state
    }

    /// Launch the browser, then log in. The browser stays owned by the adapter
    /// even when login fails, so `dispose` remains the single teardown point.
    async fn authenticate(&mut self) -> AdapterResult<()> {
        if self.state == SessionState::Disposed {
            return Err(disposed(PLATFORM));
        }
        if let Some(previous) = self.browser.get_mut().take() {
            previous.close().await;
        }

        info!(base_url = %self.base_url, "Launching browser for OWLv2");
        let slot = self.browser.get_mut();
        let session = slot.insert(self.launcher.launch().await?);

        login(
            session.as_ref(),
            &self.base_url,
            &self.username,
            &self.password,
            &self.timeouts,
        )
        .await?;

        info!("OWLv2 authentication successful");
        self.state = SessionState::Authenticated;
        Ok(())
    }

    async fn fetch_courses(&self) -> AdapterResult<Vec<ExternalCourse>> {
        let page = self.load("/courses", parser::COURSE_LIST).await?;
        parser::parse_courses(&page)
    }

    async fn fetch_assignments(&self, course_id: &str) -> AdapterResult<Vec<ExternalAssignment>> {
        let path = format!("/course/{}/assignments", urlencoding::encode(course_id));
        let page = self.load(&path, parser::ASSIGNMENT_LIST).await?;
        parser::parse_assignments(&page, course_id)
    }

    async fn fetch_grades(&self, course_id: &str) -> AdapterResult<Vec<ExternalGrade>> {
        let path = format!("/course/{}/grades", urlencoding::encode(course_id));
        let page = self.load(&path, parser::GRADE_LIST).await?;
        parser::parse_grades(&page, course_id)
    }

    async fn dispose(&mut self) {
        if let Some(session) = self.browser.get_mut().take() {
            debug!("Closing OWLv2 browser");
            session.close().await;
        }
        self.state = SessionState::Disposed;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use super::*;

    /// Counts launches and closes across every session it hands out.
    #[derive(Default)]
    pub struct Counters {
        pub launches: AtomicUsize,
        pub closes: AtomicUsize,
    }

    /// Serves canned pages keyed by URL path. Submitting the login form lands on `after_login`.
    pub struct ScriptedLauncher {
        pub counters: Arc<Counters>,
        pub pages: HashMap<String, String>,
        pub after_login: String,
        pub form_renders: bool,
    }

    impl ScriptedLauncher {
        pub fn new(after_login: &str) -> Self {
            Self {
                counters: Arc::new(Counters::default()),
                pages: HashMap::new(),
                after_login: after_login.to_string(),
                form_renders: true,
            }
        }

        pub fn page(mut self, path: &str, html: &str) -> Self {
            self.pages.insert(path.to_string(), html.to_string());
            self
        }
    }

    #[async_trait]
    impl BrowserLauncher for ScriptedLauncher {
        async fn launch(&self) -> AdapterResult<Box<dyn BrowserSession>> {
            self.counters.launches.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedSession {
                counters: self.counters.clone(),
                pages: self.pages.clone(),
                after_login: self.after_login.clone(),
                form_renders: self.form_renders,
                current: StdMutex::new("about:blank".into()),
            }))
        }
    }

    struct ScriptedSession {
        counters: Arc<Counters>,
        pages: HashMap<String, String>,
        after_login: String,
        form_renders: bool,
        current: StdMutex<String>,
    }

    impl ScriptedSession {
        fn current(&self) -> String {
            self.current.lock().unwrap().clone()
        }

        fn current_page(&self) -> Option<&String> {
            let url = self.current();
            self.pages
                .iter()
                .find(|(path, _)| url.ends_with(path.as_str()))
                .map(|(_, html)| html)
        }
    }

    #[async_trait]
    impl BrowserSession for ScriptedSession {
        async fn goto(&self, url: &str) -> AdapterResult<()> {
            *self.current.lock().unwrap() = url.to_string();
            Ok(())
        }

        async fn exists(&self, selector: &str) -> AdapterResult<bool> {
            if selector == USERNAME_FIELD {
                return Ok(self.form_renders && self.current().ends_with("/login"));
            }
            let class = selector.trim_start_matches('.');
            Ok(self.current_page().is_some_and(|html| html.contains(class)))
        }

        async fn type_into(&self, _selector: &str, _text: &str) -> AdapterResult<()> {
            Ok(())
        }

        async fn click(&self, _selector: &str) -> AdapterResult<()> {
            *self.current.lock().unwrap() = self.after_login.clone();
            Ok(())
        }

        async fn current_url(&self) -> AdapterResult<String> {
            Ok(self.current())
        }

        async fn page_source(&self) -> AdapterResult<String> {
            Ok(self.current_page().cloned().unwrap_or_default())
        }

        async fn close(self: Box<Self>) {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn fast_timeouts() -> BrowserTimeouts {
        BrowserTimeouts {
            login: Duration::from_millis(300),
            navigation: Duration::from_millis(300),
            element: Duration::from_millis(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::{fast_timeouts, ScriptedLauncher};
    use super::*;

    const BASE: &str = "https://owl.test";

    fn adapter(launcher: ScriptedLauncher) -> (Owlv2Adapter, Arc<testing::Counters>) {
        let counters = launcher.counters.clone();
        let adapter = Owlv2Adapter::new(BASE, "jdoe", "pw", Arc::new(launcher), fast_timeouts());
        (adapter, counters)
    }

    #[tokio::test]
    async fn login_fetch_and_single_teardown() {
        let launcher = ScriptedLauncher::new("https://owl.test/dashboard")
            .page(
                "/courses",
                r#"<ul class="course-list"><li class="course-item" data-course-id="c1"><span class="course-name">Chem</span></li></ul>"#,
            )
            .page(
                "/course/c1/assignments",
                r#"<div class="assignment-list"><div class="assignment-item" data-assignment-id="a1"><span class="assignment-title">Moles</span></div></div>"#,
            )
            .page(
                "/course/c1/grades",
                r#"<div class="grade-list"><div class="grade-item" data-assignment-id="a1"><span class="score">9</span><span class="max-score">10</span></div></div>"#,
            );
        let (mut adapter, counters) = adapter(launcher);

        adapter.authenticate().await.unwrap();
        assert_eq!(adapter.state(), SessionState::Authenticated);

        let courses = adapter.fetch_courses().await.unwrap();
        assert_eq!(courses[0].platform_id.as_deref(), Some("c1"));
        let assignments = adapter.fetch_assignments("c1").await.unwrap();
        assert_eq!(assignments[0].title.as_deref(), Some("Moles"));
        let grades = adapter.fetch_grades("c1").await.unwrap();
        assert_eq!(grades[0].score.as_deref(), Some("9"));

        adapter.dispose().await;
        adapter.dispose().await;
        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert!(matches!(
            adapter.fetch_courses().await.unwrap_err(),
            AdapterError::NotAuthenticated { .. }
        ));
    }

    #[tokio::test]
    async fn bounce_to_login_is_authentication_error() {
        let (mut adapter, counters) =
            adapter(ScriptedLauncher::new("https://owl.test/login?error=invalid"));

        let err = adapter.authenticate().await.unwrap_err();
        assert!(matches!(err, AdapterError::Authentication { .. }));
        assert_eq!(adapter.state(), SessionState::Uninitialized);

        adapter.dispose().await;
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_login_form_times_out_and_still_closes_once() {
        let mut launcher = ScriptedLauncher::new("https://owl.test/dashboard");
        launcher.form_renders = false;
        let (mut adapter, counters) = adapter(launcher);

        let err = adapter.authenticate().await.unwrap_err();
        assert!(matches!(
            err,
            AdapterError::Timeout { ref waiting_for, .. } if waiting_for == USERNAME_FIELD
        ));

        adapter.dispose().await;
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_container_times_out() {
        let launcher = ScriptedLauncher::new("https://owl.test/dashboard")
            .page("/courses", "<div>Maintenance window</div>");
        let (mut adapter, _counters) = adapter(launcher);
        adapter.authenticate().await.unwrap();

        let err = adapter.fetch_courses().await.unwrap_err();
        assert!(matches!(err, AdapterError::Timeout { .. }));
        adapter.dispose().await;
    }

    #[tokio::test]
    async fn fetch_before_authenticate_launches_nothing() {
        let (adapter, counters) = adapter(ScriptedLauncher::new("https://owl.test/dashboard"));
        let err = adapter.fetch_courses().await.unwrap_err();
        assert!(matches!(err, AdapterError::NotAuthenticated { .. }));
        assert_eq!(counters.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn authenticate_after_dispose_is_rejected() {
        let (mut adapter, counters) = adapter(ScriptedLauncher::new("https://owl.test/dashboard"));
        adapter.dispose().await;
        assert!(adapter.authenticate().await.is_err());
        assert_eq!(counters.launches.load(Ordering::SeqCst), 0);
    }
}
