pub mod parser;

use crate::models::platform::Platform;

use super::session::{CookieSessionAdapter, SessionSite};
use super::{AdapterResult, Capabilities, ExternalCourse};

pub const DEFAULT_BASE_URL: &str = "https://piazza.com";

/// Piazza: email login; only the class list is synced.
pub struct Piazza;

impl SessionSite for Piazza {
    const PLATFORM: Platform = Platform::Piazza;
    const LOGIN_PATH: &'static str = "/login";
    const IDENTIFIER_FIELD: &'static str = "email";
    const COURSES_PATH: &'static str = "/account";
    const CAPABILITIES: Capabilities = Capabilities {
        assignments: false,
        grades: false,
    };

    fn parse_courses(html: &str) -> AdapterResult<Vec<ExternalCourse>> {
        parser::parse_courses(html)
    }
}

pub type PiazzaAdapter = CookieSessionAdapter<Piazza>;
