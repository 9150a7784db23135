//! Gradescope account page and student assignments table.

use crate::models::platform::Platform;
use crate::platforms::html::{self, Element};
use crate::platforms::{
    missing_container, note_if_empty, AdapterResult, ExternalAssignment, ExternalCourse,
    ExternalGrade,
};

pub const PARSER_VERSION: &str = "gradescope/2025.1";

const PLATFORM: Platform = Platform::Gradescope;
const ASSIGNMENTS_TABLE: &str = "assignments-student-table";

/// `/account`: `.courseList` of `a.courseBox[href=/courses/{id}]` tiles.
pub fn parse_courses(page: &str) -> AdapterResult<Vec<ExternalCourse>> {
    let list = html::first_by_class(page, "courseList")
        .ok_or_else(|| missing_container(PLATFORM, PARSER_VERSION, ".courseList"))?;

    let courses: Vec<ExternalCourse> = list
        .by_class("courseBox")
        .iter()
        .filter_map(|tile| {
            // Enroll / add-course tiles carry no link.
            let href = tile.attr("href")?;
            Some(ExternalCourse {
                platform_id: html::segment_after(&href, "courses"),
                name: tile
                    .text_of_class("courseBox--name")
                    .or_else(|| tile.text_of_class("courseBox--shortname")),
            })
        })
        .collect();

    note_if_empty(PLATFORM, PARSER_VERSION, "courses", &courses);
    Ok(courses)
}

/// `/courses/{id}/assignments`: one row per assignment in `#assignments-student-table`.
pub fn parse_assignments(page: &str, course_id: &str) -> AdapterResult<Vec<ExternalAssignment>> {
    let assignments: Vec<ExternalAssignment> = assignment_rows(page)?
        .iter()
        .map(|row| ExternalAssignment {
            platform_id: assignment_id(row),
            title: row_header(row).map(|th| th.text()).filter(|t| !t.is_empty()),
            due_date: row
                .first_by_class("submissionTimeChart--dueDate")
                .and_then(|t| t.attr("datetime"))
                .filter(|d| !d.trim().is_empty()),
            course_platform_id: course_id.to_string(),
        })
        .collect();

    note_if_empty(PLATFORM, PARSER_VERSION, "assignments", &assignments);
    Ok(assignments)
}

/// Same table; rows with a `.submissionStatus--score` ("8.0 / 10.0") are graded.
pub fn parse_grades(page: &str, _course_id: &str) -> AdapterResult<Vec<ExternalGrade>> {
    let grades: Vec<ExternalGrade> = assignment_rows(page)?
        .iter()
        .filter_map(|row| {
            let score = row.text_of_class("submissionStatus--score")?;
            let id = assignment_id(row);
            Some(ExternalGrade {
                platform_id: id.clone(),
                assignment_platform_id: id,
                score: Some(score),
                max_score: None,
                percentage: None,
            })
        })
        .collect();

    if grades.is_empty() {
        tracing::debug!(platform = %PLATFORM, "No graded submissions on page");
    }
    Ok(grades)
}

fn assignment_rows(page: &str) -> AdapterResult<Vec<Element<'_>>> {
    let table = html::by_id(page, ASSIGNMENTS_TABLE).ok_or_else(|| {
        missing_container(PLATFORM, PARSER_VERSION, "#assignments-student-table")
    })?;
    Ok(table
        .by_tag("tr")
        .into_iter()
        .filter(|row| row_header(row).is_some())
        .collect())
}

fn row_header<'a>(row: &Element<'a>) -> Option<Element<'a>> {
    row.find_all(|t| {
        t.is("th")
            && (t.has_class("table--primaryLink") || t.attr("role").as_deref() == Some("rowheader"))
    })
    .into_iter()
    .next()
}

/// Submitted rows link to `/courses/{c}/assignments/{id}/...`; unsubmitted ones carry
/// `data-assignment-id`.
fn assignment_id(row: &Element<'_>) -> Option<String> {
    row.by_tag("a")
        .iter()
        .filter_map(|a| a.attr("href"))
        .find_map(|href| html::segment_after(&href, "assignments"))
        .or_else(|| {
            row.find_all(|t| t.attr("data-assignment-id").is_some())
                .first()
                .and_then(|e| e.attr("data-assignment-id"))
                .filter(|id| !id.is_empty())
        })
}
