//! W3C WebDriver client driving a headless Chrome through chromedriver.

use std::net::TcpListener;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tokio::process::{Child, Command as TokioCommand};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::error::{AdapterError, Result};
use crate::models::platform::Platform;
use crate::platforms::AdapterResult;

use super::browser::{BrowserLauncher, BrowserSession};

const PLATFORM: Platform = Platform::Owlv2;
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const CHROME_ARGS: [&str; 3] = ["--no-sandbox", "--disable-setuid-sandbox", "--disable-gpu"];

/// Launches one chromedriver + Chrome pair per session, or attaches to `remote_url`.
pub struct WebDriverLauncher {
    config: BrowserConfig,
    http: Client,
}

impl WebDriverLauncher {
    pub fn new(config: &BrowserConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.navigation_timeout_secs.max(1) * 2))
            .build()?;
        Ok(Self {
            config: config.clone(),
            http,
        })
    }

    /// Start a driver on a port nobody else holds. Returns its endpoint and process.
    fn spawn_driver(&self) -> AdapterResult<(String, Child)> {
        let port = free_port()?;
        info!(
            driver = %self.config.driver_path,
            port,
            "Starting WebDriver process"
        );
        let child = TokioCommand::new(&self.config.driver_path)
            .arg(format!("--port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AdapterError::Fetch {
                platform: PLATFORM,
                reason: format!("failed to start {}: {e}", self.config.driver_path),
            })?;
        Ok((format!("http://127.0.0.1:{port}"), child))
    }

    /// Poll `/status` until ready. With an owned `driver`, readiness only counts
    /// while that process is alive.
    async fn wait_until_ready(
        &self,
        endpoint: &str,
        mut driver: Option<&mut Child>,
    ) -> AdapterResult<()> {
        let deadline = Duration::from_secs(self.config.navigation_timeout_secs);
        let status_url = format!("{endpoint}/status");
        let poll = async {
            loop {
                let ready = match self.http.get(&status_url).send().await {
                    Ok(resp) => resp
                        .json::<Value>()
                        .await
                        .map(|body| body["value"]["ready"].as_bool().unwrap_or(false))
                        .unwrap_or(false),
                    Err(_) => false,
                };
                if let Some(child) = driver.as_deref_mut() {
                    ensure_running(child)?;
                }
                if ready {
                    return Ok::<_, AdapterError>(());
                }
                sleep(Duration::from_millis(100)).await;
            }
        };
        timeout(deadline, poll)
            .await
            .map_err(|_| AdapterError::Timeout {
                platform: PLATFORM,
                waiting_for: "WebDriver to become ready".into(),
                seconds: deadline.as_secs(),
            })?
    }

    fn capabilities(&self) -> Value {
        let mut args: Vec<&str> = Vec::new();
        if self.config.headless {
            args.push("--headless=new");
        }
        args.extend(CHROME_ARGS);
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> AdapterResult<Box<dyn BrowserSession>> {
        let (endpoint, mut driver) = match &self.config.remote_url {
            Some(url) => (url.trim_end_matches('/').to_string(), None),
            None => {
                let (endpoint, child) = self.spawn_driver()?;
                (endpoint, Some(child))
            }
        };

        // Dropping `driver` on any early return kills the process.
        self.wait_until_ready(&endpoint, driver.as_mut()).await?;

        let value = send(
            &self.http,
            Method::POST,
            &format!("{endpoint}/session"),
            Some(self.capabilities()),
        )
        .await?;
        let session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| AdapterError::Parse {
                platform: PLATFORM,
                reason: "new session response carried no sessionId".into(),
            })?
            .to_string();

        debug!(session_id = %session_id, "Browser session started");
        Ok(Box::new(WebDriverSession {
            http: self.http.clone(),
            session_url: format!("{endpoint}/session/{session_id}"),
            driver: Mutex::new(driver),
        }))
    }
}

/// A live WebDriver session. Owns the driver process when it spawned one.
pub struct WebDriverSession {
    http: Client,
    session_url: String,
    driver: Mutex<Option<Child>>,
}

impl WebDriverSession {
    /// Attach to an existing session without owning any process.
    pub fn attach(http: Client, endpoint: &str, session_id: &str) -> Self {
        Self {
            http,
            session_url: format!("{}/session/{session_id}", endpoint.trim_end_matches('/')),
            driver: Mutex::new(None),
        }
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> AdapterResult<Value> {
        send(&self.http, method, &format!("{}{path}", self.session_url), body).await
    }

    async fn find_element(&self, selector: &str) -> AdapterResult<Option<String>> {
        let result = self
            .command(
                Method::POST,
                "/element",
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await;
        match result {
            Ok(value) => Ok(value[ELEMENT_KEY].as_str().map(str::to_string)),
            Err(AdapterError::Fetch { reason, .. }) if reason.contains("no such element") => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn element(&self, selector: &str) -> AdapterResult<String> {
        self.find_element(selector)
            .await?
            .ok_or_else(|| AdapterError::Fetch {
                platform: PLATFORM,
                reason: format!("no element matches `{selector}`"),
            })
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&self, url: &str) -> AdapterResult<()> {
        debug!(url, "Navigating");
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn exists(&self, selector: &str) -> AdapterResult<bool> {
        Ok(self.find_element(selector).await?.is_some())
    }

    async fn type_into(&self, selector: &str, text: &str) -> AdapterResult<()> {
        let id = self.element(selector).await?;
        self.command(
            Method::POST,
            &format!("/element/{id}/value"),
            Some(json!({ "text": text })),
        )
        .await
        .map(|_| ())
    }

    async fn click(&self, selector: &str) -> AdapterResult<()> {
        let id = self.element(selector).await?;
        self.command(Method::POST, &format!("/element/{id}/click"), Some(json!({})))
            .await
            .map(|_| ())
    }

    async fn current_url(&self) -> AdapterResult<String> {
        string_value(self.command(Method::GET, "/url", None).await?, "url")
    }

    async fn page_source(&self) -> AdapterResult<String> {
        string_value(self.command(Method::GET, "/source", None).await?, "source")
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.command(Method::DELETE, "", None).await {
            warn!(error = %e, "Failed to end browser session cleanly");
        }
        if let Some(mut child) = self.driver.lock().await.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to stop WebDriver process");
            }
        }
        debug!("Browser session closed");
    }
}

/// Ask the OS for an unused loopback port. The listener is dropped before the driver binds it.
fn free_port() -> AdapterResult<u16> {
    TcpListener::bind(("127.0.0.1", 0))
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .map_err(|e| AdapterError::Fetch {
            platform: PLATFORM,
            reason: format!("no free port for WebDriver: {e}"),
        })
}

/// A driver that already exited must not be mistaken for whatever answers on its port.
fn ensure_running(child: &mut Child) -> AdapterResult<()> {
    match child.try_wait() {
        Ok(None) => Ok(()),
        Ok(Some(status)) => Err(AdapterError::Fetch {
            platform: PLATFORM,
            reason: format!("WebDriver process exited early ({status})"),
        }),
        Err(e) => Err(AdapterError::Fetch {
            platform: PLATFORM,
            reason: format!("WebDriver process state unknown: {e}"),
        }),
    }
}

/// Issue one WebDriver command and unwrap its `value` envelope.
async fn send(
    http: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> AdapterResult<Value> {
    let mut request = http.request(method.clone(), url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await.map_err(|e| AdapterError::Fetch {
        platform: PLATFORM,
        reason: format!("WebDriver {method} failed: {e}"),
    })?;

    let status = response.status();
    let envelope: Value = response.json().await.map_err(|e| AdapterError::Parse {
        platform: PLATFORM,
        reason: format!("WebDriver returned a non-JSON body: {e}"),
    })?;

    if !status.is_success() {
        let error = envelope["value"]["error"].as_str().unwrap_or("unknown error");
        let message = envelope["value"]["message"].as_str().unwrap_or_default();
        return Err(AdapterError::Fetch {
            platform: PLATFORM,
            reason: format!("{error}: {message}"),
        });
    }

    Ok(envelope["value"].clone())
}

fn string_value(value: Value, what: &str) -> AdapterResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AdapterError::Parse {
            platform: PLATFORM,
            reason: format!("WebDriver {what} was not a string"),
        })
}
