use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::crypto;
use crate::error::Result;
use crate::models::{
    assignment::{Assignment, AssignmentUpdate, NormalizedAssignment},
    course::{Course, CourseUpdate, NormalizedCourse},
    credential::{CredentialPayload, StoredCredential},
    grade::{Grade, GradeUpdate, NormalizedGrade},
    platform::Platform,
    sync::{SyncRun, SyncStatus},
    user::{NewUser, User},
};

use super::repository::{
    AssignmentRepository, CourseRepository, CredentialRepository, GradeRepository,
    SatchelRepository, SyncRunOutcome, SyncRunRepository, UserRepository,
};

const COURSE_COLUMNS: &str = "id, user_id, platform, platform_id, name, created_at";
const ASSIGNMENT_COLUMNS: &str =
    "id, user_id, course_id, platform, platform_id, title, due_date, created_at";
const GRADE_COLUMNS: &str =
    "id, user_id, assignment_id, platform, platform_id, score, max_score, percentage, created_at";
const SYNC_RUN_COLUMNS: &str = "id, user_id, platform, status, started_at, completed_at, \
     new_courses, new_assignments, new_grades, failed_items, error_message";

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
    credential_key: [u8; 32],
}

impl SqliteRepository {
    /// `credential_key` seals stored platform credentials.
    pub fn new(pool: SqlitePool, credential_key: [u8; 32]) -> Self {
        Self {
            pool,
            credential_key,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl SatchelRepository for SqliteRepository {}

// -- Helper functions for converting DB values --

fn parse_platform(s: &str) -> Result<Platform> {
    s.parse()
}

fn parse_sync_status(s: &str) -> SyncStatus {
    match s {
        "running" => SyncStatus::Running,
        "completed" => SyncStatus::Completed,
        "failed" => SyncStatus::Failed,
        _ => SyncStatus::Failed,
    }
}

fn sync_status_to_str(s: &SyncStatus) -> &'static str {
    match s {
        SyncStatus::Running => "running",
        SyncStatus::Completed => "completed",
        SyncStatus::Failed => "failed",
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn datetime_to_str(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn row_to_user(r: &SqliteRow) -> User {
    User {
        id: r.get("id"),
        email: r.get("email"),
        name: r.get("name"),
        created_at: parse_datetime(r.get("created_at")),
    }
}

fn row_to_course(r: &SqliteRow) -> Result<Course> {
    Ok(Course {
        id: r.get("id"),
        user_id: r.get("user_id"),
        platform: parse_platform(r.get("platform"))?,
        platform_id: r.get("platform_id"),
        name: r.get("name"),
        created_at: parse_datetime(r.get("created_at")),
    })
}

fn row_to_assignment(r: &SqliteRow) -> Result<Assignment> {
    Ok(Assignment {
        id: r.get("id"),
        user_id: r.get("user_id"),
        course_id: r.get("course_id"),
        platform: parse_platform(r.get("platform"))?,
        platform_id: r.get("platform_id"),
        title: r.get("title"),
        due_date: r
            .get::<Option<String>, _>("due_date")
            .map(|s| parse_datetime(&s)),
        created_at: parse_datetime(r.get("created_at")),
    })
}

fn row_to_grade(r: &SqliteRow) -> Result<Grade> {
    Ok(Grade {
        id: r.get("id"),
        user_id: r.get("user_id"),
        assignment_id: r.get("assignment_id"),
        platform: parse_platform(r.get("platform"))?,
        platform_id: r.get("platform_id"),
        score: r.get("score"),
        max_score: r.get("max_score"),
        percentage: r.get("percentage"),
        created_at: parse_datetime(r.get("created_at")),
    })
}

fn row_to_sync_run(r: &SqliteRow) -> Result<SyncRun> {
    Ok(SyncRun {
        id: r.get("id"),
        user_id: r.get("user_id"),
        platform: parse_platform(r.get("platform"))?,
        status: parse_sync_status(r.get("status")),
        started_at: parse_datetime(r.get("started_at")),
        completed_at: r
            .get::<Option<String>, _>("completed_at")
            .map(|s| parse_datetime(&s)),
        new_courses: r.get("new_courses"),
        new_assignments: r.get("new_assignments"),
        new_grades: r.get("new_grades"),
        failed_items: r.get("failed_items"),
        error_message: r.get("error_message"),
    })
}

// -- UserRepository --

#[async_trait]
impl UserRepository for SqliteRepository {
    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let now = datetime_to_str(&Utc::now());
        let result = sqlx::query("INSERT INTO users (email, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&user.email)
            .bind(&user.name)
            .bind(&now)
            .execute(&self.pool)
            .await?;

        Ok(User {
            id: result.last_insert_rowid(),
            email: user.email.clone(),
            name: user.name.clone(),
            created_at: parse_datetime(&now),
        })
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, email, name, created_at FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_user))
    }
}

// -- CourseRepository --

#[async_trait]
impl CourseRepository for SqliteRepository {
    async fn create_course(&self, course: &NormalizedCourse) -> Result<Course> {
        let now = datetime_to_str(&Utc::now());
        let result = sqlx::query(
            "INSERT INTO courses (user_id, platform, platform_id, name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(course.owner_user_id)
        .bind(course.platform.as_str())
        .bind(&course.platform_id)
        .bind(&course.name)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Course {
            id: result.last_insert_rowid(),
            user_id: course.owner_user_id,
            platform: course.platform,
            platform_id: course.platform_id.clone(),
            name: course.name.clone(),
            created_at: parse_datetime(&now),
        })
    }

    async fn get_course(&self, id: i64) -> Result<Option<Course>> {
        let row = sqlx::query(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_course).transpose()
    }

    async fn find_course(
        &self,
        user_id: i64,
        platform: Platform,
        platform_id: &str,
    ) -> Result<Option<Course>> {
        let row = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses
             WHERE user_id = ?1 AND platform = ?2 AND platform_id = ?3"
        ))
        .bind(user_id)
        .bind(platform.as_str())
        .bind(platform_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_course).transpose()
    }

    async fn update_course(&self, id: i64, update: &CourseUpdate) -> Result<Option<Course>> {
        let Some(mut course) = self.get_course(id).await? else {
            return Ok(None);
        };
        if let Some(name) = &update.name {
            course.name = name.clone();
        }

        sqlx::query("UPDATE courses SET name = ?1 WHERE id = ?2")
            .bind(&course.name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(Some(course))
    }

    async fn list_courses_for_user(&self, user_id: i64) -> Result<Vec<Course>> {
        let rows = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE user_id = ?1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_course).collect()
    }
}

// -- AssignmentRepository --

#[async_trait]
impl AssignmentRepository for SqliteRepository {
    async fn create_assignment(&self, assignment: &NormalizedAssignment) -> Result<Assignment> {
        let now = datetime_to_str(&Utc::now());
        let result = sqlx::query(
            "INSERT INTO assignments
             (user_id, course_id, platform, platform_id, title, due_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(assignment.owner_user_id)
        .bind(assignment.course_id)
        .bind(assignment.platform.as_str())
        .bind(&assignment.platform_id)
        .bind(&assignment.title)
        .bind(assignment.due_date.as_ref().map(datetime_to_str))
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Assignment {
            id: result.last_insert_rowid(),
            user_id: assignment.owner_user_id,
            course_id: assignment.course_id,
            platform: assignment.platform,
            platform_id: assignment.platform_id.clone(),
            title: assignment.title.clone(),
            due_date: assignment.due_date,
            created_at: parse_datetime(&now),
        })
    }

    async fn get_assignment(&self, id: i64) -> Result<Option<Assignment>> {
        let row = sqlx::query(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_assignment).transpose()
    }

    async fn find_assignment(
        &self,
        user_id: i64,
        platform: Platform,
        platform_id: &str,
    ) -> Result<Option<Assignment>> {
        let row = sqlx::query(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
             WHERE user_id = ?1 AND platform = ?2 AND platform_id = ?3"
        ))
        .bind(user_id)
        .bind(platform.as_str())
        .bind(platform_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_assignment).transpose()
    }

    async fn update_assignment(
        &self,
        id: i64,
        update: &AssignmentUpdate,
    ) -> Result<Option<Assignment>> {
        let Some(mut assignment) = self.get_assignment(id).await? else {
            return Ok(None);
        };
        if let Some(title) = &update.title {
            assignment.title = title.clone();
        }
        if let Some(due_date) = update.due_date {
            assignment.due_date = due_date;
        }

        sqlx::query("UPDATE assignments SET title = ?1, due_date = ?2 WHERE id = ?3")
            .bind(&assignment.title)
            .bind(assignment.due_date.as_ref().map(datetime_to_str))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(Some(assignment))
    }

    async fn list_assignments_for_course(&self, course_id: i64) -> Result<Vec<Assignment>> {
        let rows = sqlx::query(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE course_id = ?1
             ORDER BY due_date IS NULL, due_date, id"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_assignment).collect()
    }
}

// -- GradeRepository --

#[async_trait]
impl GradeRepository for SqliteRepository {
    async fn create_grade(&self, grade: &NormalizedGrade) -> Result<Grade> {
        let now = datetime_to_str(&Utc::now());
        let result = sqlx::query(
            "INSERT INTO grades
             (user_id, assignment_id, platform, platform_id, score, max_score, percentage,
              created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(grade.owner_user_id)
        .bind(grade.assignment_id)
        .bind(grade.platform.as_str())
        .bind(&grade.platform_id)
        .bind(grade.score)
        .bind(grade.max_score)
        .bind(grade.percentage)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Grade {
            id: result.last_insert_rowid(),
            user_id: grade.owner_user_id,
            assignment_id: grade.assignment_id,
            platform: grade.platform,
            platform_id: grade.platform_id.clone(),
            score: grade.score,
            max_score: grade.max_score,
            percentage: grade.percentage,
            created_at: parse_datetime(&now),
        })
    }

    async fn get_grade(&self, id: i64) -> Result<Option<Grade>> {
        let row = sqlx::query(&format!("SELECT {GRADE_COLUMNS} FROM grades WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_grade).transpose()
    }

    async fn find_grade(
        &self,
        user_id: i64,
        platform: Platform,
        platform_id: &str,
    ) -> Result<Option<Grade>> {
        let row = sqlx::query(&format!(
            "SELECT {GRADE_COLUMNS} FROM grades
             WHERE user_id = ?1 AND platform = ?2 AND platform_id = ?3"
        ))
        .bind(user_id)
        .bind(platform.as_str())
        .bind(platform_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_grade).transpose()
    }

    async fn update_grade(&self, id: i64, update: &GradeUpdate) -> Result<Option<Grade>> {
        let Some(mut grade) = self.get_grade(id).await? else {
            return Ok(None);
        };
        if let Some(score) = update.score {
            grade.score = score;
        }
        if let Some(max_score) = update.max_score {
            grade.max_score = max_score;
        }
        if let Some(percentage) = update.percentage {
            grade.percentage = percentage;
        }

        sqlx::query("UPDATE grades SET score = ?1, max_score = ?2, percentage = ?3 WHERE id = ?4")
            .bind(grade.score)
            .bind(grade.max_score)
            .bind(grade.percentage)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(Some(grade))
    }

    async fn list_grades_for_assignment(&self, assignment_id: i64) -> Result<Vec<Grade>> {
        let rows = sqlx::query(&format!(
            "SELECT {GRADE_COLUMNS} FROM grades WHERE assignment_id = ?1 ORDER BY id"
        ))
        .bind(assignment_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_grade).collect()
    }

    async fn list_grades_for_user(&self, user_id: i64) -> Result<Vec<Grade>> {
        let rows = sqlx::query(&format!(
            "SELECT {GRADE_COLUMNS} FROM grades WHERE user_id = ?1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_grade).collect()
    }
}

// -- CredentialRepository --

#[async_trait]
impl CredentialRepository for SqliteRepository {
    async fn save_credentials(
        &self,
        user_id: i64,
        platform: Platform,
        payload: &CredentialPayload,
    ) -> Result<()> {
        let sealed = crypto::seal_json(&self.credential_key, payload)?;
        sqlx::query(
            "INSERT INTO platform_credentials (user_id, platform, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, platform) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(platform.as_str())
        .bind(&sealed)
        .bind(datetime_to_str(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_credentials(
        &self,
        user_id: i64,
        platform: Platform,
    ) -> Result<Option<StoredCredential>> {
        let row = sqlx::query(
            "SELECT user_id, platform, payload, updated_at FROM platform_credentials
             WHERE user_id = ?1 AND platform = ?2",
        )
        .bind(user_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => {
                let sealed: Vec<u8> = r.get("payload");
                Ok(Some(StoredCredential {
                    user_id: r.get("user_id"),
                    platform: parse_platform(r.get("platform"))?,
                    payload: crypto::open_json(&self.credential_key, &sealed)?,
                    updated_at: parse_datetime(r.get("updated_at")),
                }))
            }
            None => Ok(None),
        }
    }
}

// -- SyncRunRepository --

#[async_trait]
impl SyncRunRepository for SqliteRepository {
    async fn create_sync_run(&self, user_id: i64, platform: Platform) -> Result<SyncRun> {
        let now = datetime_to_str(&Utc::now());
        let result = sqlx::query(
            "INSERT INTO sync_runs (user_id, platform, status, started_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(user_id)
        .bind(platform.as_str())
        .bind(sync_status_to_str(&SyncStatus::Running))
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(SyncRun {
            id: result.last_insert_rowid(),
            user_id,
            platform,
            status: SyncStatus::Running,
            started_at: parse_datetime(&now),
            completed_at: None,
            new_courses: 0,
            new_assignments: 0,
            new_grades: 0,
            failed_items: 0,
            error_message: None,
        })
    }

    async fn finish_sync_run(&self, id: i64, outcome: &SyncRunOutcome) -> Result<()> {
        sqlx::query(
            "UPDATE sync_runs SET status = ?1, completed_at = ?2, new_courses = ?3,
             new_assignments = ?4, new_grades = ?5, failed_items = ?6, error_message = ?7
             WHERE id = ?8",
        )
        .bind(sync_status_to_str(&outcome.status))
        .bind(datetime_to_str(&Utc::now()))
        .bind(outcome.new_courses)
        .bind(outcome.new_assignments)
        .bind(outcome.new_grades)
        .bind(outcome.failed_items)
        .bind(&outcome.error_message)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_latest_sync_run(
        &self,
        user_id: i64,
        platform: Platform,
    ) -> Result<Option<SyncRun>> {
        let row = sqlx::query(&format!(
            "SELECT {SYNC_RUN_COLUMNS} FROM sync_runs WHERE user_id = ?1 AND platform = ?2
             ORDER BY id DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_sync_run).transpose()
    }

    async fn list_sync_runs(&self, user_id: i64) -> Result<Vec<SyncRun>> {
        let rows = sqlx::query(&format!(
            "SELECT {SYNC_RUN_COLUMNS} FROM sync_runs WHERE user_id = ?1 ORDER BY id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_sync_run).collect()
    }
}
