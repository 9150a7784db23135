use std::time::Instant;

use satchel_core::models::credential::CredentialPayload;
use satchel_core::models::sync::SyncResult;
use satchel_core::notify::sink_from_config;
use satchel_core::platforms::registry::AdapterRegistry;
use satchel_core::sync::SyncOrchestrator;
use tracing::error;

/// Run the `sync` command. With no `--cred` pairs the stored credentials are used.
pub async fn run(
    config_path: &str,
    user_id: i64,
    platform: &str,
    creds: &[String],
) -> anyhow::Result<()> {
    let (config, repo) = super::open(config_path).await?;

    let registry = AdapterRegistry::from_config(&config)?;
    let notifier = sink_from_config(&config.notifications, &config.http)?;
    let orchestrator = SyncOrchestrator::new(repo, registry, notifier, config.sync.clone())
        .with_grade_updates(config.notifications.grade_updates);

    println!("Starting {platform} sync for user {user_id}...");
    let start = Instant::now();

    let outcome = if creds.is_empty() {
        orchestrator
            .sync_with_stored_credentials(user_id, platform)
            .await
    } else {
        let payload = parse_credentials(creds)?;
        orchestrator.sync(user_id, platform, &payload).await
    };

    match outcome {
        Ok(result) => {
            println!(
                "Sync completed successfully in {:.1}s",
                start.elapsed().as_secs_f64()
            );
            print_result(&result);
        }
        Err(e) => {
            error!("Sync failed: {e}");
            println!("Sync failed: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// `key=value` pairs into a credential payload. Values may contain `=`.
fn parse_credentials(pairs: &[String]) -> anyhow::Result<CredentialPayload> {
    let mut payload = CredentialPayload::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("credential {pair:?} is not key=value"))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("credential {pair:?} has an empty key");
        }
        payload.insert(key, value);
    }
    Ok(payload)
}

fn print_result(result: &SyncResult) {
    println!("  Platform:    {}", result.platform.display_name());
    println!("  Courses:     {} new", result.new_courses_count);
    println!("  Assignments: {} new", result.new_assignments_count);
    println!("  Grades:      {} new", result.new_grades_count);
    if !result.failed_items.is_empty() {
        println!("  Skipped:     {}", result.failed_items.len());
        for item in &result.failed_items {
            println!(
                "    {:?} {} ({:?}): {}",
                item.kind,
                item.platform_id.as_deref().unwrap_or("-"),
                item.stage,
                item.error
            );
        }
    }
}
