pub mod parser;

use crate::models::platform::Platform;

use super::session::{CookieSessionAdapter, SessionSite};
use super::{AdapterResult, Capabilities, ExternalAssignment, ExternalCourse, ExternalGrade};

pub const DEFAULT_BASE_URL: &str = "https://www.gradescope.com";

/// Gradescope: email login; assignments and scores share one course page.
pub struct Gradescope;

impl SessionSite for Gradescope {
    const PLATFORM: Platform = Platform::Gradescope;
    const LOGIN_PATH: &'static str = "/login";
    const IDENTIFIER_FIELD: &'static str = "email";
    const COURSES_PATH: &'static str = "/account";
    const CAPABILITIES: Capabilities = Capabilities::ALL;

    fn assignments_path(course_id: &str) -> Option<String> {
        Some(format!("/courses/{}/assignments", urlencoding::encode(course_id)))
    }

    fn grades_path(course_id: &str) -> Option<String> {
        Self::assignments_path(course_id)
    }

    fn parse_courses(html: &str) -> AdapterResult<Vec<ExternalCourse>> {
        parser::parse_courses(html)
    }

    fn parse_assignments(html: &str, course_id: &str) -> AdapterResult<Vec<ExternalAssignment>> {
        parser::parse_assignments(html, course_id)
    }

    fn parse_grades(html: &str, course_id: &str) -> AdapterResult<Vec<ExternalGrade>> {
        parser::parse_grades(html, course_id)
    }
}

pub type GradescopeAdapter = CookieSessionAdapter<Gradescope>;
