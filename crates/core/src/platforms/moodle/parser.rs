//! Moodle dashboard, assignment index, and user grade report.

use chrono::NaiveDateTime;

use crate::models::platform::Platform;
use crate::platforms::html::{self, Element};
use crate::platforms::{
    missing_container, note_if_empty, AdapterResult, ExternalAssignment, ExternalCourse,
    ExternalGrade,
};

pub const PARSER_VERSION: &str = "moodle/4.x-2025.1";

const PLATFORM: Platform = Platform::Moodle;
const ASSIGN_VIEW: &str = "/mod/assign/view.php";
const DUE_DATE_FORMAT: &str = "%A, %d %B %Y, %I:%M %p";

/// `/my/`: `.dashboard-card[data-course-id]` cards, name in `.multiline`.
pub fn parse_courses(page: &str) -> AdapterResult<Vec<ExternalCourse>> {
    let deck = html::first_by_class(page, "dashboard-card-deck")
        .ok_or_else(|| missing_container(PLATFORM, PARSER_VERSION, ".dashboard-card-deck"))?;

    let courses: Vec<ExternalCourse> = deck
        .by_class("dashboard-card")
        .iter()
        .map(|card| ExternalCourse {
            platform_id: card
                .attr("data-course-id")
                .filter(|id| !id.is_empty())
                .or_else(|| linked_id(card, "/course/view.php")),
            name: card.text_of_class("multiline"),
        })
        .collect();

    note_if_empty(PLATFORM, PARSER_VERSION, "courses", &courses);
    Ok(courses)
}

/// `/mod/assign/index.php?id=`: `table.generaltable`, name in cell `c1`, due date in `c2`.
pub fn parse_assignments(page: &str, course_id: &str) -> AdapterResult<Vec<ExternalAssignment>> {
    let table = html::first_by_class(page, "generaltable")
        .ok_or_else(|| missing_container(PLATFORM, PARSER_VERSION, "table.generaltable"))?;

    let assignments: Vec<ExternalAssignment> = table
        .by_tag("tr")
        .iter()
        .filter_map(|row| {
            let name_cell = cell(row, "c1")?;
            Some(ExternalAssignment {
                platform_id: linked_id(&name_cell, ASSIGN_VIEW),
                title: Some(name_cell.text()).filter(|t| !t.is_empty()),
                due_date: cell(row, "c2").and_then(|c| due_date(&c.text())),
                course_platform_id: course_id.to_string(),
            })
        })
        .collect();

    note_if_empty(PLATFORM, PARSER_VERSION, "assignments", &assignments);
    Ok(assignments)
}

/// `/grade/report/user/index.php?id=`: `table.user-grade` rows for assignment items.
///
/// Ungraded items (`-`) and non-assignment items (quizzes, totals) are skipped.
pub fn parse_grades(page: &str, _course_id: &str) -> AdapterResult<Vec<ExternalGrade>> {
    let table = html::first_by_class(page, "user-grade")
        .ok_or_else(|| missing_container(PLATFORM, PARSER_VERSION, "table.user-grade"))?;

    let grades: Vec<ExternalGrade> = table
        .by_tag("tr")
        .iter()
        .filter_map(|row| {
            let item = row.first_by_class("column-itemname")?;
            let id = linked_id(&item, ASSIGN_VIEW)?;
            let score = row
                .text_of_class("column-grade")
                .filter(|g| g != "-")?;
            Some(ExternalGrade {
                platform_id: Some(id.clone()),
                assignment_platform_id: Some(id),
                score: Some(score),
                max_score: row
                    .text_of_class("column-range")
                    .and_then(|r| range_max(&r)),
                percentage: row
                    .text_of_class("column-percentage")
                    .filter(|p| p != "-"),
            })
        })
        .collect();

    note_if_empty(PLATFORM, PARSER_VERSION, "grades", &grades);
    Ok(grades)
}

fn cell<'a>(row: &Element<'a>, column: &str) -> Option<Element<'a>> {
    row.find_all(|t| t.is("td") && t.has_class(column))
        .into_iter()
        .next()
}

/// `id` query parameter of the first link into `target`.
fn linked_id(scope: &Element<'_>, target: &str) -> Option<String> {
    scope
        .by_tag("a")
        .iter()
        .filter_map(|a| a.attr("href"))
        .filter(|href| href.contains(target))
        .find_map(|href| html::query_param(&href, "id"))
}

/// Moodle renders due dates like `Friday, 7 February 2025, 11:59 PM`.
fn due_date(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() || text == "-" {
        return None;
    }
    match NaiveDateTime::parse_from_str(text, DUE_DATE_FORMAT) {
        Ok(dt) => Some(dt.format("%Y-%m-%d %H:%M").to_string()),
        Err(_) => Some(text.to_string()),
    }
}

/// Upper bound of a range cell such as `0–100` or `0-10.00`.
fn range_max(range: &str) -> Option<String> {
    range
        .rsplit(['–', '-'])
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty() && m.parse::<f64>().is_ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;

    const DASHBOARD: &str = r#"
<section class="block_myoverview">
  <div class="card-deck dashboard-card-deck" role="list">
    <div class="card dashboard-card" role="listitem" data-region="course-content" data-course-id="42">
      <a href="https://moodle.uni.edu/course/view.php?id=42" tabindex="-1">
        <div class="card-img dashboard-card-img"></div>
      </a>
      <div class="card-body">
        <a href="https://moodle.uni.edu/course/view.php?id=42" class="aalink coursename">
          <span class="sr-only">Course name</span>
          <span class="multiline">Biology 101</span>
        </a>
      </div>
    </div>
    <div class="card dashboard-card" role="listitem">
      <a href="https://moodle.uni.edu/course/view.php?id=43"><span class="multiline">Ethics</span></a>
    </div>
  </div>
</section>"#;

    const ASSIGN_INDEX: &str = r#"
<table class="generaltable mod_index">
  <thead><tr>
    <th class="header c0">Topic</th><th class="header c1">Assignments</th><th class="header c2">Due date</th>
  </tr></thead>
  <tbody>
    <tr><td class="cell c0">Week 1</td>
      <td class="cell c1"><a href="https://moodle.uni.edu/mod/assign/view.php?id=77">Essay 1</a></td>
      <td class="cell c2">Friday, 7 February 2025, 11:59 PM</td></tr>
    <tr><td class="cell c0"></td>
      <td class="cell c1"><a href="https://moodle.uni.edu/mod/assign/view.php?id=78">Lab report</a></td>
      <td class="cell c2">-</td></tr>
  </tbody>
</table>"#;

    const GRADE_REPORT: &str = r#"
<table class="generaltable user-grade">
  <tr><th class="column-itemname level1">Biology 101</th></tr>
  <tr>
    <th class="level2 column-itemname"><a class="gradeitemheader" href="https://moodle.uni.edu/mod/assign/view.php?id=77">Essay 1</a></th>
    <td class="level2 column-grade">85.00</td>
    <td class="level2 column-range">0&ndash;100</td>
    <td class="level2 column-percentage">85.00 %</td>
  </tr>
  <tr>
    <th class="level2 column-itemname"><a href="https://moodle.uni.edu/mod/assign/view.php?id=78">Lab report</a></th>
    <td class="level2 column-grade">-</td>
    <td class="level2 column-range">0&ndash;10</td>
    <td class="level2 column-percentage">-</td>
  </tr>
  <tr>
    <th class="level2 column-itemname"><a href="https://moodle.uni.edu/mod/quiz/view.php?id=90">Quiz 1</a></th>
    <td class="level2 column-grade">7.00</td>
  </tr>
</table>"#;

    #[test]
    fn parses_dashboard_cards() {
        let courses = parse_courses(DASHBOARD).unwrap();
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].platform_id.as_deref(), Some("42"));
        assert_eq!(courses[0].name.as_deref(), Some("Biology 101"));
        assert_eq!(courses[1].platform_id.as_deref(), Some("43"));
    }

    #[test]
    fn parses_assignment_index_with_moodle_dates() {
        let assignments = parse_assignments(ASSIGN_INDEX, "42").unwrap();
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[0].platform_id.as_deref(), Some("77"));
        assert_eq!(assignments[0].title.as_deref(), Some("Essay 1"));
        assert_eq!(assignments[0].due_date.as_deref(), Some("2025-02-07 23:59"));
        assert!(assignments[1].due_date.is_none());
    }

    #[test]
    fn grade_report_keeps_graded_assignments_only() {
        let grades = parse_grades(GRADE_REPORT, "42").unwrap();
        assert_eq!(grades.len(), 1);
        assert_eq!(grades[0].assignment_platform_id.as_deref(), Some("77"));
        assert_eq!(grades[0].score.as_deref(), Some("85.00"));
        assert_eq!(grades[0].max_score.as_deref(), Some("100"));
        assert_eq!(grades[0].percentage.as_deref(), Some("85.00 %"));
    }

    #[test]
    fn login_redirect_page_is_parse_error() {
        let err = parse_assignments("<form id=\"login\"></form>", "42").unwrap_err();
        assert!(matches!(err, AdapterError::Parse { .. }));
    }

    #[test]
    fn range_upper_bound() {
        assert_eq!(range_max("0–100").as_deref(), Some("100"));
        assert_eq!(range_max("0.00-10.00").as_deref(), Some("10.00"));
        assert_eq!(range_max("n/a"), None);
    }
}
