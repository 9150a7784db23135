//! Piazza account page: the enrolled class list.

use crate::models::platform::Platform;
use crate::platforms::html;
use crate::platforms::{missing_container, note_if_empty, AdapterResult, ExternalCourse};

pub const PARSER_VERSION: &str = "piazza/2025.1";

const PLATFORM: Platform = Platform::Piazza;

/// `.my-classes` entries `.class-entry[data-nid]` with `.course-number` and `.course-name`.
pub fn parse_courses(page: &str) -> AdapterResult<Vec<ExternalCourse>> {
    let list = html::first_by_class(page, "my-classes")
        .ok_or_else(|| missing_container(PLATFORM, PARSER_VERSION, ".my-classes"))?;

    let courses: Vec<ExternalCourse> = list
        .by_class("class-entry")
        .iter()
        .map(|entry| {
            let number = entry.text_of_class("course-number");
            let title = entry.text_of_class("course-name");
            let name = match (number, title) {
                (Some(number), Some(title)) => Some(format!("{number}: {title}")),
                (number, title) => title.or(number),
            };
            ExternalCourse {
                platform_id: entry.attr("data-nid").filter(|id| !id.is_empty()),
                name,
            }
        })
        .collect();

    note_if_empty(PLATFORM, PARSER_VERSION, "classes", &courses);
    Ok(courses)
}
