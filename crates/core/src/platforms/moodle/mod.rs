pub mod parser;

use crate::models::platform::Platform;

use super::session::{CookieSessionAdapter, SessionSite};
use super::{AdapterResult, Capabilities, ExternalAssignment, ExternalCourse, ExternalGrade};

/// Moodle: self-hosted, so the base URL comes from the credential payload.
pub struct Moodle;

impl SessionSite for Moodle {
    const PLATFORM: Platform = Platform::Moodle;
    const LOGIN_PATH: &'static str = "/login/index.php";
    const IDENTIFIER_FIELD: &'static str = "username";
    const COURSES_PATH: &'static str = "/my/";
    const CAPABILITIES: Capabilities = Capabilities::ALL;

    fn assignments_path(course_id: &str) -> Option<String> {
        Some(format!(
            "/mod/assign/index.php?id={}",
            urlencoding::encode(course_id)
        ))
    }

    fn grades_path(course_id: &str) -> Option<String> {
        Some(format!(
            "/grade/report/user/index.php?id={}",
            urlencoding::encode(course_id)
        ))
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

pub type MoodleAdapter = CookieSessionAdapter<Moodle>;
