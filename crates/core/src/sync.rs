//! Sync orchestration: authenticate, fetch, normalize, reconcile, notify.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::db::repository::{SatchelRepository, SyncRunOutcome};
use crate::error::{Result, SatchelError};
use crate::models::credential::CredentialPayload;
use crate::models::platform::Platform;
use crate::models::sync::{FailedItem, FailureStage, RecordKind, SyncResult, SyncStatus};
use crate::models::user::User;
use crate::normalize::{normalize_assignment, normalize_course, normalize_grade};
use crate::notify::{GradeUpdate, NotificationSink, SyncErrorSummary, SyncSummary};
use crate::platforms::registry::AdapterRegistry;
use crate::platforms::{AdapterResult, ExternalGrade, PlatformAdapter};
use crate::reconcile::Reconciler;

/// Drives one (user, platform) sync at a time per call. Calls for different
/// pairs may run concurrently against the same orchestrator.
pub struct SyncOrchestrator<R: SatchelRepository> {
    repo: R,
    registry: AdapterRegistry,
    notifier: Arc<dyn NotificationSink>,
    settings: SyncConfig,
    grade_updates: bool,
}

/// An assignment persisted during this sync, by native id.
struct SyncedAssignment {
    id: i64,
    title: String,
}

struct Pass {
    result: SyncResult,
    grade_updates: Vec<GradeUpdate>,
}

impl<R: SatchelRepository> SyncOrchestrator<R> {
    pub fn new(
        repo: R,
        registry: AdapterRegistry,
        notifier: Arc<dyn NotificationSink>,
        settings: SyncConfig,
    ) -> Self {
        Self {
            repo,
            registry,
            notifier,
            settings,
            grade_updates: false,
        }
    }

    /// Send a grade-update notification for every grade created by a sync.
    pub fn with_grade_updates(mut self, enabled: bool) -> Self {
        self.grade_updates = enabled;
        self
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Sync with freshly supplied credentials, saving them once the platform accepts them.
    pub async fn sync(
        &self,
        user_id: i64,
        platform: &str,
        credentials: &CredentialPayload,
    ) -> Result<SyncResult> {
        let user = self.load_user(user_id).await?;
        self.run(&user, platform, credentials, true).await
    }

    /// Sync with the credentials saved by an earlier successful sync.
    pub async fn sync_with_stored_credentials(
        &self,
        user_id: i64,
        platform: &str,
    ) -> Result<SyncResult> {
        let user = self.load_user(user_id).await?;
        let parsed: Platform = platform.parse()?;
        let stored = self
            .repo
            .get_credentials(user_id, parsed)
            .await?
            .ok_or(SatchelError::CredentialsNotFound {
                user_id,
                platform: parsed,
            })?;
        self.run(&user, platform, &stored.payload, false).await
    }

    async fn load_user(&self, user_id: i64) -> Result<User> {
        self.repo
            .get_user(user_id)
            .await?
            .ok_or(SatchelError::UserNotFound(user_id))
    }

    async fn run(
        &self,
        user: &User,
        platform: &str,
        credentials: &CredentialPayload,
        save_credentials: bool,
    ) -> Result<SyncResult> {
        // Input errors surface before any run row, network call, or notification.
        let mut adapter = self.registry.resolve(platform, credentials)?;
        let platform = adapter.platform();
        info!(
            user_id = user.id,
            platform = %platform,
            variant = %adapter.variant(),
            "Starting sync"
        );

        let run = self.repo.create_sync_run(user.id, platform).await?;

        let pass = self
            .drive(adapter.as_mut(), user, credentials, save_credentials)
            .await;
        adapter.dispose().await;

        match pass {
            Ok(pass) => {
                let result = pass.result;
                let outcome = SyncRunOutcome {
                    status: SyncStatus::Completed,
                    new_courses: result.new_courses_count.into(),
                    new_assignments: result.new_assignments_count.into(),
                    new_grades: result.new_grades_count.into(),
                    failed_items: result.failed_items.len() as i64,
                    error_message: None,
                };
                if let Err(e) = self.repo.finish_sync_run(run.id, &outcome).await {
                    error!(sync_id = run.id, error = %e, "Failed to record sync run");
                }

                info!(
                    user_id = user.id,
                    platform = %platform,
                    new_courses = result.new_courses_count,
                    new_assignments = result.new_assignments_count,
                    new_grades = result.new_grades_count,
                    failed_items = result.failed_items.len(),
                    "Sync finished"
                );

                for update in &pass.grade_updates {
                    if let Err(e) = self.notifier.notify_grade_update(&user.email, update).await {
                        warn!(error = %e, "Grade update notification not delivered");
                    }
                }
                let summary = SyncSummary::from(&result);
                if let Err(e) = self.notifier.notify_sync_complete(&user.email, &summary).await {
                    warn!(error = %e, "Sync-complete notification not delivered");
                }
                Ok(result)
            }
            Err(e) => {
                error!(user_id = user.id, platform = %platform, error = %e, "Sync failed");
                if let Err(db_err) = self
                    .repo
                    .finish_sync_run(run.id, &SyncRunOutcome::failed(e.to_string()))
                    .await
                {
                    error!(sync_id = run.id, error = %db_err, "Failed to record sync run");
                }

                let summary = SyncErrorSummary::new(platform, e.to_string());
                if let Err(notify_err) =
                    self.notifier.notify_sync_error(&user.email, &summary).await
                {
                    warn!(error = %notify_err, "Sync-error notification not delivered");
                }
                Err(e)
            }
        }
    }

    /// Everything between resolving the adapter and disposing it. Errors returned
    /// here abort the sync; per-record problems land in `failed_items`.
    async fn drive(
        &self,
        adapter: &mut dyn PlatformAdapter,
        user: &User,
        credentials: &CredentialPayload,
        save_credentials: bool,
    ) -> Result<Pass> {
        let platform = adapter.platform();

        adapter.authenticate().await?;
        if save_credentials {
            if let Err(e) = self
                .repo
                .save_credentials(user.id, platform, credentials)
                .await
            {
                warn!(
                    user_id = user.id,
                    platform = %platform,
                    error = %e,
                    "Could not save credentials"
                );
            }
        }

        let adapter: &dyn PlatformAdapter = adapter;
        let courses = self
            .with_retry(platform, "courses", || adapter.fetch_courses())
            .await?;
        info!(platform = %platform, count = courses.len(), "Fetched courses");

        let capabilities = adapter.capabilities();
        let reconciler = Reconciler::new(&self.repo);
        let mut pass = Pass {
            result: SyncResult::new(platform),
            grade_updates: Vec::new(),
        };

        for raw in &courses {
            let course = match normalize_course(user.id, platform, raw) {
                Ok(course) => course,
                Err(e) => {
                    pass.fail(
                        RecordKind::Course,
                        FailureStage::Normalize,
                        raw.platform_id.clone(),
                        raw,
                        e,
                    );
                    continue;
                }
            };
            let course_id = match reconciler.upsert_course(&course).await {
                Ok(outcome) => {
                    if outcome.created {
                        pass.result.new_courses_count += 1;
                    }
                    outcome.id
                }
                Err(e) => {
                    pass.fail(
                        RecordKind::Course,
                        FailureStage::Persist,
                        Some(course.platform_id.clone()),
                        raw,
                        e,
                    );
                    continue;
                }
            };
            let native_id = course.platform_id.as_str();

            let mut synced: HashMap<String, SyncedAssignment> = HashMap::new();

            if capabilities.assignments {
                match self
                    .with_retry(platform, "assignments", || adapter.fetch_assignments(native_id))
                    .await
                {
                    Ok(assignments) => {
                        for raw in &assignments {
                            let assignment =
                                match normalize_assignment(user.id, platform, course_id, raw) {
                                    Ok(a) => a,
                                    Err(e) => {
                                        pass.fail(
                                            RecordKind::Assignment,
                                            FailureStage::Normalize,
                                            raw.platform_id.clone(),
                                            raw,
                                            e,
                                        );
                                        continue;
                                    }
                                };
                            match reconciler.upsert_assignment(&assignment).await {
                                Ok(outcome) => {
                                    if outcome.created {
                                        pass.result.new_assignments_count += 1;
                                    }
                                    synced.insert(
                                        assignment.platform_id.clone(),
                                        SyncedAssignment {
                                            id: outcome.id,
                                            title: assignment.title.clone(),
                                        },
                                    );
                                }
                                Err(e) => pass.fail(
                                    RecordKind::Assignment,
                                    FailureStage::Persist,
                                    Some(assignment.platform_id.clone()),
                                    raw,
                                    e,
                                ),
                            }
                        }
                    }
                    Err(e) => pass.fail_fetch(RecordKind::Assignment, native_id, e),
                }
            }

            if capabilities.grades {
                match self
                    .with_retry(platform, "grades", || adapter.fetch_grades(native_id))
                    .await
                {
                    Ok(grades) => {
                        for raw in &grades {
                            self.reconcile_grade(
                                &reconciler,
                                user,
                                platform,
                                &course.name,
                                &synced,
                                raw,
                                &mut pass,
                            )
                            .await;
                        }
                    }
                    Err(e) => pass.fail_fetch(RecordKind::Grade, native_id, e),
                }
            }
        }

        Ok(pass)
    }

    #[allow(clippy::too_many_arguments)]
    async fn reconcile_grade(
        &self,
        reconciler: &Reconciler<'_, R>,
        user: &User,
        platform: Platform,
        course_name: &str,
        synced: &HashMap<String, SyncedAssignment>,
        raw: &ExternalGrade,
        pass: &mut Pass,
    ) {
        let Some(assignment_native) = raw
            .assignment_platform_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            pass.fail(
                RecordKind::Grade,
                FailureStage::Normalize,
                raw.platform_id.clone(),
                raw,
                "missing required field `assignmentPlatformId`",
            );
            return;
        };

        // Assignments synced in an earlier run still anchor grades in this one.
        let (assignment_id, assignment_title) = match synced.get(assignment_native) {
            Some(a) => (a.id, a.title.clone()),
            None => match self
                .repo
                .find_assignment(user.id, platform, assignment_native)
                .await
            {
                Ok(Some(a)) => (a.id, a.title),
                Ok(None) => {
                    pass.fail(
                        RecordKind::Grade,
                        FailureStage::Normalize,
                        raw.platform_id.clone(),
                        raw,
                        format!("no synced assignment with id {assignment_native}"),
                    );
                    return;
                }
                Err(e) => {
                    pass.fail(
                        RecordKind::Grade,
                        FailureStage::Persist,
                        raw.platform_id.clone(),
                        raw,
                        e,
                    );
                    return;
                }
            },
        };

        let grade = match normalize_grade(user.id, platform, assignment_id, raw) {
            Ok(g) => g,
            Err(e) => {
                pass.fail(
                    RecordKind::Grade,
                    FailureStage::Normalize,
                    raw.platform_id.clone(),
                    raw,
                    e,
                );
                return;
            }
        };

        match reconciler.upsert_grade(&grade).await {
            Ok(outcome) if outcome.created => {
                pass.result.new_grades_count += 1;
                if self.grade_updates {
                    pass.grade_updates.push(GradeUpdate {
                        assignment_title,
                        course_name: course_name.to_string(),
                        platform,
                        score: grade.score,
                        max_score: grade.max_score,
                        percentage: grade.percentage,
                    });
                }
            }
            Ok(_) => {}
            Err(e) => pass.fail(
                RecordKind::Grade,
                FailureStage::Persist,
                Some(grade.platform_id.clone()),
                raw,
                e,
            ),
        }
    }

    /// Repeat transient (`Fetch`/`Timeout`) failures up to `fetch_attempts` total tries.
    async fn with_retry<T, F, Fut>(&self, platform: Platform, what: &str, op: F) -> AdapterResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AdapterResult<T>>,
    {
        let attempts = self.settings.fetch_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let backoff = self.settings.retry_backoff_ms * u64::from(attempt);
                    warn!(
                        platform = %platform,
                        what,
                        attempt,
                        backoff_ms = backoff,
                        error = %e,
                        "Transient fetch failure; retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Pass {
    fn fail(
        &mut self,
        kind: RecordKind,
        stage: FailureStage,
        platform_id: Option<String>,
        record: &impl Serialize,
        error: impl ToString,
    ) {
        let error = error.to_string();
        debug!(?kind, ?stage, platform_id = ?platform_id, error = %error, "Record skipped");
        self.result.failed_items.push(FailedItem {
            kind,
            stage,
            platform_id,
            record: serde_json::to_value(record).unwrap_or_default(),
            error,
        });
    }

    fn fail_fetch(&mut self, kind: RecordKind, course_native_id: &str, error: impl ToString) {
        let error = error.to_string();
        warn!(?kind, course = course_native_id, error = %error, "Per-course fetch failed");
        self.result.failed_items.push(FailedItem {
            kind,
            stage: FailureStage::Fetch,
            platform_id: None,
            record: serde_json::json!({ "coursePlatformId": course_native_id }),
            error,
        });
    }
}
