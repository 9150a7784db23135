use chrono::{Duration, Utc};
use satchel_core::db::repository::UserRepository;
use satchel_core::notify::{send_due_reminders, sink_from_config};

/// Run the `remind` command: notify a user of assignments due within `hours`.
pub async fn run(config_path: &str, user_id: i64, hours: i64) -> anyhow::Result<()> {
    let window = window(hours)?;
    let (config, repo) = super::open(config_path).await?;

    let user = repo
        .get_user(user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {user_id} not found"))?;
    let sink = sink_from_config(&config.notifications, &config.http)?;

    let sent = send_due_reminders(&repo, sink.as_ref(), &user, Utc::now(), window).await?;
    println!("Sent {sent} reminder(s) to {}", user.email);
    Ok(())
}

fn window(hours: i64) -> anyhow::Result<Duration> {
    if hours <= 0 {
        anyhow::bail!("--hours must be positive");
    }
    Duration::try_hours(hours).ok_or_else(|| anyhow::anyhow!("--hours {hours} is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_accepts_positive_hours() {
        assert_eq!(window(48).unwrap(), Duration::hours(48));
    }

    #[test]
    fn window_rejects_non_positive_hours() {
        assert!(window(0).is_err());
        assert!(window(-3).is_err());
    }

    #[test]
    fn window_rejects_huge_hours_without_panicking() {
        let err = window(i64::MAX).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
