//! Merges normalized records into the store, deduplicating on (owner, platform, native id).

use tracing::{debug, warn};

use crate::db::repository::{AssignmentRepository, CourseRepository, GradeRepository};
use crate::error::{Result, SatchelError};
use crate::models::assignment::NormalizedAssignment;
use crate::models::course::NormalizedCourse;
use crate::models::grade::NormalizedGrade;
use crate::models::platform::Platform;

/// Result of reconciling one record. `id` is the persisted row, new or existing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: bool,
    pub id: i64,
}

impl ReconcileOutcome {
    fn created(id: i64) -> Self {
        Self { created: true, id }
    }

    fn existing(id: i64) -> Self {
        Self { created: false, id }
    }
}

/// Existing records are left untouched; only missing ones are created.
///
/// A store-level failure (including a uniqueness violation from a concurrent
/// sync of the same platform) is returned to the caller for per-item reporting.
pub struct Reconciler<'r, R: ?Sized> {
    repo: &'r R,
}

impl<'r, R: ?Sized + Sync> Reconciler<'r, R> {
    pub fn new(repo: &'r R) -> Self {
        Self { repo }
    }

    pub async fn upsert_course(&self, course: &NormalizedCourse) -> Result<ReconcileOutcome>
    where
        R: CourseRepository,
    {
        let existing = self
            .repo
            .find_course(course.owner_user_id, course.platform, &course.platform_id)
            .await?;
        if let Some(existing) = existing {
            debug!(platform_id = %course.platform_id, "Course already synced");
            return Ok(ReconcileOutcome::existing(existing.id));
        }

        let created = self
            .repo
            .create_course(course)
            .await
            .map_err(|e| race_noted(e, course.platform, &course.platform_id))?;
        Ok(ReconcileOutcome::created(created.id))
    }

    pub async fn upsert_assignment(
        &self,
        assignment: &NormalizedAssignment,
    ) -> Result<ReconcileOutcome>
    where
        R: AssignmentRepository,
    {
        let existing = self
            .repo
            .find_assignment(
                assignment.owner_user_id,
                assignment.platform,
                &assignment.platform_id,
            )
            .await?;
        if let Some(existing) = existing {
            return Ok(ReconcileOutcome::existing(existing.id));
        }

        let created = self
            .repo
            .create_assignment(assignment)
            .await
            .map_err(|e| race_noted(e, assignment.platform, &assignment.platform_id))?;
        Ok(ReconcileOutcome::created(created.id))
    }

    pub async fn upsert_grade(&self, grade: &NormalizedGrade) -> Result<ReconcileOutcome>
    where
        R: GradeRepository,
    {
        let existing = self
            .repo
            .find_grade(grade.owner_user_id, grade.platform, &grade.platform_id)
            .await?;
        if let Some(existing) = existing {
            return Ok(ReconcileOutcome::existing(existing.id));
        }

        let created = self
            .repo
            .create_grade(grade)
            .await
            .map_err(|e| race_noted(e, grade.platform, &grade.platform_id))?;
        Ok(ReconcileOutcome::created(created.id))
    }
}

fn race_noted(err: SatchelError, platform: Platform, platform_id: &str) -> SatchelError {
    if err.is_unique_violation() {
        warn!(
            platform = %platform,
            platform_id,
            "Record was created concurrently by another sync"
        );
    }
    err
}
