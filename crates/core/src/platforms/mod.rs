//! Platform adapters: one per external learning platform.
//!
//! Every adapter speaks the same capability set ([`PlatformAdapter`]) over one of
//! three transports: a REST token, a cookie session, or a headless browser.

pub mod canvas;
pub mod gradescope;
pub mod html;
pub mod moodle;
pub mod owlv2;
pub mod piazza;
pub mod registry;
pub mod session;
pub mod webassign;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AdapterError;
use crate::models::platform::Platform;

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// How an adapter talks to its platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterVariant {
    Token,
    CookieSession,
    HeadlessBrowser,
}

impl AdapterVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterVariant::Token => "token",
            AdapterVariant::CookieSession => "cookie-session",
            AdapterVariant::HeadlessBrowser => "headless-browser",
        }
    }
}

impl fmt::Display for AdapterVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which per-course fetches return data. Unsupported fetches return an empty list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub assignments: bool,
    pub grades: bool,
}

impl Capabilities {
    pub const ALL: Capabilities = Capabilities {
        assignments: true,
        grades: true,
    };
}

/// Adapter lifecycle. Fetches are only accepted while `Authenticated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Authenticated,
    Disposed,
}

/// A course as the platform reported it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCourse {
    pub platform_id: Option<String>,
    pub name: Option<String>,
}

/// An assignment as the platform reported it. `due_date` is raw platform text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAssignment {
    pub platform_id: Option<String>,
    pub title: Option<String>,
    pub due_date: Option<String>,
    pub course_platform_id: String,
}

/// A grade as the platform reported it. Score fields are raw text (`"85"`, `"85 / 100"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalGrade {
    pub platform_id: Option<String>,
    pub assignment_platform_id: Option<String>,
    pub score: Option<String>,
    pub max_score: Option<String>,
    pub percentage: Option<String>,
}

/// One external platform's authentication and data retrieval.
///
/// Adapters never retry; retry policy belongs to the orchestrator.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    fn variant(&self) -> AdapterVariant;

    fn capabilities(&self) -> Capabilities;

    fn state(&self) -> SessionState;

    async fn authenticate(&mut self) -> AdapterResult<()>;

    async fn fetch_courses(&self) -> AdapterResult<Vec<ExternalCourse>>;

    async fn fetch_assignments(&self, course_id: &str) -> AdapterResult<Vec<ExternalAssignment>> {
        let _ = course_id;
        self.ensure_authenticated()?;
        Ok(Vec::new())
    }

    async fn fetch_grades(&self, course_id: &str) -> AdapterResult<Vec<ExternalGrade>> {
        let _ = course_id;
        self.ensure_authenticated()?;
        Ok(Vec::new())
    }

    /// Release sessions and processes. Safe to call more than once.
    async fn dispose(&mut self);

    fn ensure_authenticated(&self) -> AdapterResult<()> {
        match self.state() {
            SessionState::Authenticated => Ok(()),
            SessionState::Uninitialized | SessionState::Disposed => {
                Err(AdapterError::NotAuthenticated {
                    platform: self.platform(),
                })
            }
        }
    }
}

/// Error for `authenticate()` on an adapter that was already disposed.
pub(crate) fn disposed(platform: Platform) -> AdapterError {
    AdapterError::Authentication {
        platform,
        reason: "adapter has been disposed".into(),
    }
}

/// Parse failure for a page whose expected container is missing.
pub(crate) fn missing_container(platform: Platform, parser: &str, marker: &str) -> AdapterError {
    AdapterError::Parse {
        platform,
        reason: format!("expected `{marker}` not found on page (parser {parser})"),
    }
}

/// Logs a diagnostic when a container was present but held no records.
pub(crate) fn note_if_empty<T>(platform: Platform, parser: &str, what: &str, records: &[T]) {
    if records.is_empty() {
        tracing::warn!(
            platform = %platform,
            parser,
            "No {what} found on page; markup may have changed"
        );
    }
}
