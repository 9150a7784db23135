use async_trait::async_trait;

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

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> Result<User>;
    async fn get_user(&self, id: i64) -> Result<Option<User>>;
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Fails with a unique violation when the dedup key already exists.
    async fn create_course(&self, course: &NormalizedCourse) -> Result<Course>;
    async fn get_course(&self, id: i64) -> Result<Option<Course>>;
    async fn find_course(
        &self,
        user_id: i64,
        platform: Platform,
        platform_id: &str,
    ) -> Result<Option<Course>>;
    async fn update_course(&self, id: i64, update: &CourseUpdate) -> Result<Option<Course>>;
    async fn list_courses_for_user(&self, user_id: i64) -> Result<Vec<Course>>;
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn create_assignment(&self, assignment: &NormalizedAssignment) -> Result<Assignment>;
    async fn get_assignment(&self, id: i64) -> Result<Option<Assignment>>;
    async fn find_assignment(
        &self,
        user_id: i64,
        platform: Platform,
        platform_id: &str,
    ) -> Result<Option<Assignment>>;
    async fn update_assignment(
        &self,
        id: i64,
        update: &AssignmentUpdate,
    ) -> Result<Option<Assignment>>;
    /// Ordered by due date, undated assignments last.
    async fn list_assignments_for_course(&self, course_id: i64) -> Result<Vec<Assignment>>;
}

#[async_trait]
pub trait GradeRepository: Send + Sync {
    async fn create_grade(&self, grade: &NormalizedGrade) -> Result<Grade>;
    async fn get_grade(&self, id: i64) -> Result<Option<Grade>>;
    async fn find_grade(
        &self,
        user_id: i64,
        platform: Platform,
        platform_id: &str,
    ) -> Result<Option<Grade>>;
    async fn update_grade(&self, id: i64, update: &GradeUpdate) -> Result<Option<Grade>>;
    async fn list_grades_for_assignment(&self, assignment_id: i64) -> Result<Vec<Grade>>;
    async fn list_grades_for_user(&self, user_id: i64) -> Result<Vec<Grade>>;
}

/// Per-user, per-platform login material. Last write wins.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn save_credentials(
        &self,
        user_id: i64,
        platform: Platform,
        payload: &CredentialPayload,
    ) -> Result<()>;
    async fn get_credentials(
        &self,
        user_id: i64,
        platform: Platform,
    ) -> Result<Option<StoredCredential>>;
}

#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    async fn create_sync_run(&self, user_id: i64, platform: Platform) -> Result<SyncRun>;
    async fn finish_sync_run(&self, id: i64, outcome: &SyncRunOutcome) -> Result<()>;
    async fn get_latest_sync_run(
        &self,
        user_id: i64,
        platform: Platform,
    ) -> Result<Option<SyncRun>>;
    async fn list_sync_runs(&self, user_id: i64) -> Result<Vec<SyncRun>>;
}

/// Final state written to a sync run row.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRunOutcome {
    pub status: SyncStatus,
    pub new_courses: i64,
    pub new_assignments: i64,
    pub new_grades: i64,
    pub failed_items: i64,
    pub error_message: Option<String>,
}

impl SyncRunOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Failed,
            new_courses: 0,
            new_assignments: 0,
            new_grades: 0,
            failed_items: 0,
            error_message: Some(message.into()),
        }
    }
}

pub trait SatchelRepository:
    UserRepository
    + CourseRepository
    + AssignmentRepository
    + GradeRepository
    + CredentialRepository
    + SyncRunRepository
{
}
