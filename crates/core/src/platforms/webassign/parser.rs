//! WebAssign student dashboard and class assignment listing.

use crate::models::platform::Platform;
use crate::platforms::html::{self, Element};
use crate::platforms::{
    missing_container, note_if_empty, AdapterResult, ExternalAssignment, ExternalCourse,
};

pub const PARSER_VERSION: &str = "webassign/2025.1";

const PLATFORM: Platform = Platform::WebAssign;

/// `/student`: `.student-classes` holding `.class-card[data-class-id]` with a `.class-title`.
pub fn parse_courses(page: &str) -> AdapterResult<Vec<ExternalCourse>> {
    let container = html::first_by_class(page, "student-classes")
        .ok_or_else(|| missing_container(PLATFORM, PARSER_VERSION, ".student-classes"))?;

    let courses: Vec<ExternalCourse> = container
        .by_class("class-card")
        .iter()
        .map(|card| ExternalCourse {
            platform_id: card.attr("data-class-id").filter(|id| !id.is_empty()),
            name: card.text_of_class("class-title"),
        })
        .collect();

    note_if_empty(PLATFORM, PARSER_VERSION, "classes", &courses);
    Ok(courses)
}

/// `/student/class/{id}/assignments`: `.assignment-list` rows `.assignment[data-assignment-id]`.
pub fn parse_assignments(page: &str, course_id: &str) -> AdapterResult<Vec<ExternalAssignment>> {
    let container = html::first_by_class(page, "assignment-list")
        .ok_or_else(|| missing_container(PLATFORM, PARSER_VERSION, ".assignment-list"))?;

    let assignments: Vec<ExternalAssignment> = container
        .by_class("assignment")
        .iter()
        .map(|row| ExternalAssignment {
            platform_id: row.attr("data-assignment-id").filter(|id| !id.is_empty()),
            title: row.text_of_class("assignment-name"),
            due_date: due_date(row),
            course_platform_id: course_id.to_string(),
        })
        .collect();

    note_if_empty(PLATFORM, PARSER_VERSION, "assignments", &assignments);
    Ok(assignments)
}

/// Machine-readable `datetime` when present, else the visible text.
fn due_date(row: &Element<'_>) -> Option<String> {
    let due = row.first_by_class("due-date")?;
    due.attr("datetime")
        .filter(|d| !d.trim().is_empty())
        .or_else(|| Some(due.text()).filter(|t| !t.is_empty()))
}
