use satchel_core::db::repository::{SyncRunRepository, UserRepository};
use satchel_core::models::sync::SyncRun;

/// Run the `status` command: recent sync runs for one user.
pub async fn run(config_path: &str, user_id: i64, limit: usize) -> anyhow::Result<()> {
    let (config, repo) = super::open(config_path).await?;

    let user = repo
        .get_user(user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {user_id} not found"))?;

    println!("Satchel Status");
    println!("==============");
    println!("Instance: {}", config.satchel.instance_name);
    println!("User:     {} ({})", user.email, user.id);
    println!();

    let runs = repo.list_sync_runs(user_id).await?;
    if runs.is_empty() {
        println!("No sync runs recorded.");
        return Ok(());
    }

    println!("Recent Syncs");
    println!("------------");
    for run in runs.iter().take(limit) {
        println!("{}", describe_run(run));
    }

    Ok(())
}

fn describe_run(run: &SyncRun) -> String {
    let mut line = format!(
        "#{:<4} {:<11} {:<10} {}  +{} courses, +{} assignments, +{} grades",
        run.id,
        run.platform.as_str(),
        format!("{:?}", run.status).to_lowercase(),
        run.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        run.new_courses,
        run.new_assignments,
        run.new_grades,
    );
    if run.failed_items > 0 {
        line.push_str(&format!(", {} skipped", run.failed_items));
    }
    if let Some(ref err) = run.error_message {
        line.push_str(&format!("\n      error: {err}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use satchel_core::models::platform::Platform;
    use satchel_core::models::sync::SyncStatus;

    fn run(status: SyncStatus, error: Option<&str>) -> SyncRun {
        SyncRun {
            id: 7,
            user_id: 1,
            platform: Platform::Gradescope,
            status,
            started_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap(),
            completed_at: None,
            new_courses: 2,
            new_assignments: 5,
            new_grades: 1,
            failed_items: 0,
            error_message: error.map(String::from),
        }
    }

    #[test]
    fn completed_run_line() {
        let line = describe_run(&run(SyncStatus::Completed, None));
        assert!(line.contains("gradescope"));
        assert!(line.contains("completed"));
        assert!(line.contains("+2 courses, +5 assignments, +1 grades"));
        assert!(!line.contains("error"));
    }

    #[test]
    fn failed_run_shows_error() {
        let line = describe_run(&run(SyncStatus::Failed, Some("authentication failed")));
        assert!(line.contains("failed"));
        assert!(line.contains("error: authentication failed"));
    }
}
