//! OWLv2 rendered pages, read from the browser's page source.

use crate::models::platform::Platform;
use crate::platforms::html;
use crate::platforms::{
    missing_container, note_if_empty, AdapterResult, ExternalAssignment, ExternalCourse,
    ExternalGrade,
};

pub const PARSER_VERSION: &str = "owlv2/2025.1";

const PLATFORM: Platform = Platform::Owlv2;

pub const COURSE_LIST: &str = ".course-list";
pub const ASSIGNMENT_LIST: &str = ".assignment-list";
pub const GRADE_LIST: &str = ".grade-list";

pub fn parse_courses(page: &str) -> AdapterResult<Vec<ExternalCourse>> {
    let list = html::first_by_class(page, "course-list")
        .ok_or_else(|| missing_container(PLATFORM, PARSER_VERSION, COURSE_LIST))?;

    let courses: Vec<ExternalCourse> = list
        .by_class("course-item")
        .iter()
        .map(|item| ExternalCourse {
            platform_id: item.attr("data-course-id").filter(|id| !id.is_empty()),
            name: item.text_of_class("course-name"),
        })
        .collect();

    note_if_empty(PLATFORM, PARSER_VERSION, "courses", &courses);
    Ok(courses)
}

pub fn parse_assignments(page: &str, course_id: &str) -> AdapterResult<Vec<ExternalAssignment>> {
    let list = html::first_by_class(page, "assignment-list")
        .ok_or_else(|| missing_container(PLATFORM, PARSER_VERSION, ASSIGNMENT_LIST))?;

    let assignments: Vec<ExternalAssignment> = list
        .by_class("assignment-item")
        .iter()
        .map(|item| ExternalAssignment {
            platform_id: item.attr("data-assignment-id").filter(|id| !id.is_empty()),
            title: item.text_of_class("assignment-title"),
            due_date: item.text_of_class("due-date"),
            course_platform_id: course_id.to_string(),
        })
        .collect();

    note_if_empty(PLATFORM, PARSER_VERSION, "assignments", &assignments);
    Ok(assignments)
}

/// OWLv2 has no grade identifier of its own; the assignment id stands in.
pub fn parse_grades(page: &str, _course_id: &str) -> AdapterResult<Vec<ExternalGrade>> {
    let list = html::first_by_class(page, "grade-list")
        .ok_or_else(|| missing_container(PLATFORM, PARSER_VERSION, GRADE_LIST))?;

    let grades: Vec<ExternalGrade> = list
        .by_class("grade-item")
        .iter()
        .map(|item| {
            let id = item.attr("data-assignment-id").filter(|id| !id.is_empty());
            ExternalGrade {
                platform_id: id.clone(),
                assignment_platform_id: id,
                score: item.text_of_class("score"),
                max_score: item.text_of_class("max-score"),
                percentage: item.text_of_class("percentage"),
            }
        })
        .collect();

    note_if_empty(PLATFORM, PARSER_VERSION, "grades", &grades);
    Ok(grades)
}
