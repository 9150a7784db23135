//! Browser abstraction used by the OWLv2 adapter.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, timeout, Instant};

use crate::error::AdapterError;
use crate::models::platform::Platform;
use crate::platforms::AdapterResult;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Starts an isolated browser with a single page.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> AdapterResult<Box<dyn BrowserSession>>;
}

/// One live browser page. Selectors are CSS.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&self, url: &str) -> AdapterResult<()>;

    /// Whether an element matching `selector` is currently rendered.
    async fn exists(&self, selector: &str) -> AdapterResult<bool>;

    async fn type_into(&self, selector: &str, text: &str) -> AdapterResult<()>;

    async fn click(&self, selector: &str) -> AdapterResult<()>;

    async fn current_url(&self) -> AdapterResult<String>;

    async fn page_source(&self) -> AdapterResult<String>;

    /// Terminate the page and the browser process behind it.
    async fn close(self: Box<Self>);
}

/// Poll until `selector` renders, or fail with [`AdapterError::Timeout`].
pub async fn wait_for_selector(
    session: &dyn BrowserSession,
    platform: Platform,
    selector: &str,
    deadline: Duration,
) -> AdapterResult<()> {
    let poll = async {
        loop {
            if session.exists(selector).await? {
                return Ok(());
            }
            sleep(POLL_INTERVAL).await;
        }
    };
    match timeout(deadline, poll).await {
        Ok(result) => result,
        Err(_) => Err(timed_out(platform, selector, deadline)),
    }
}

/// Poll until the page URL differs from `from`, returning the new URL.
pub async fn wait_for_navigation(
    session: &dyn BrowserSession,
    platform: Platform,
    from: &str,
    deadline: Duration,
) -> AdapterResult<String> {
    let started = Instant::now();
    let poll = async {
        loop {
            let url = session.current_url().await?;
            if url != from {
                tracing::debug!(
                    platform = %platform,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Navigation finished"
                );
                return Ok(url);
            }
            sleep(POLL_INTERVAL).await;
        }
    };
    match timeout(deadline, poll).await {
        Ok(result) => result,
        Err(_) => Err(timed_out(platform, "navigation", deadline)),
    }
}

fn timed_out(platform: Platform, waiting_for: &str, deadline: Duration) -> AdapterError {
    AdapterError::Timeout {
        platform,
        waiting_for: waiting_for.to_string(),
        seconds: deadline.as_secs(),
    }
}
