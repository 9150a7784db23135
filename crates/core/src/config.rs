//! TOML-based configuration system for Satchel.

use crate::error::{Result, SatchelError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level Satchel configuration, deserialized from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatchelConfig {
    pub satchel: SatchelSection,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub platforms: PlatformUrls,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Core instance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatchelSection {
    pub instance_name: String,
    pub data_dir: String,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "/var/lib/satchel/satchel.db".into()
}

/// Where the credential encryption key lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_key_path")]
    pub key_path: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            key_path: default_key_path(),
        }
    }
}

fn default_key_path() -> String {
    "/var/lib/satchel/satchel.key".into()
}

/// Settings shared by every REST and cookie-session adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Upper bound on any single platform request.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_http_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("Satchel/{}", env!("CARGO_PKG_VERSION"))
}

/// Headless browser (WebDriver) settings for browser-driven platforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_driver_path")]
    pub driver_path: String,
    /// Already-running WebDriver endpoint. When set, no driver process is spawned.
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_login_timeout")]
    pub login_timeout_secs: u64,
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,
    #[serde(default = "default_element_timeout")]
    pub element_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            driver_path: default_driver_path(),
            remote_url: None,
            headless: true,
            login_timeout_secs: default_login_timeout(),
            navigation_timeout_secs: default_navigation_timeout(),
            element_timeout_secs: default_element_timeout(),
        }
    }
}

fn default_driver_path() -> String {
    "chromedriver".into()
}

fn default_true() -> bool {
    true
}

fn default_login_timeout() -> u64 {
    10
}

fn default_navigation_timeout() -> u64 {
    15
}

fn default_element_timeout() -> u64 {
    10
}

/// Base-URL overrides for platforms that otherwise live at a fixed address.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlatformUrls {
    #[serde(default)]
    pub webassign_url: Option<String>,
    #[serde(default)]
    pub gradescope_url: Option<String>,
    #[serde(default)]
    pub piazza_url: Option<String>,
    #[serde(default)]
    pub owlv2_url: Option<String>,
}

/// Mail relay used for sync notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default = "default_from_address")]
    pub from: String,
    /// Also send a grade-update message for every newly synced grade.
    #[serde(default)]
    pub grade_updates: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            relay_url: None,
            from: default_from_address(),
            grade_updates: false,
        }
    }
}

fn default_from_address() -> String {
    "noreply@satchel.local".into()
}

/// Orchestrator retry policy for per-course fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Total attempts for a transient per-course fetch failure; 1 disables retry.
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fetch_attempts: default_fetch_attempts(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

fn default_fetch_attempts() -> u32 {
    1
}

fn default_retry_backoff() -> u64 {
    500
}

impl SatchelConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SatchelError::Config(format!("failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Validate the configuration, returning an error for invalid combinations.
    pub fn validate(&self) -> Result<()> {
        if self.satchel.instance_name.is_empty() {
            return Err(SatchelError::Config(
                "satchel.instance_name must not be empty".into(),
            ));
        }

        if self.satchel.data_dir.is_empty() {
            return Err(SatchelError::Config(
                "satchel.data_dir must not be empty".into(),
            ));
        }

        if self.satchel.database.path.is_empty() {
            return Err(SatchelError::Config(
                "satchel.database.path must not be empty".into(),
            ));
        }

        if self.security.key_path.is_empty() {
            return Err(SatchelError::Config(
                "security.key_path must not be empty".into(),
            ));
        }

        if self.http.timeout_secs == 0 {
            return Err(SatchelError::Config(
                "http.timeout_secs must be greater than zero".into(),
            ));
        }

        if self.browser.enabled {
            if self.browser.driver_path.is_empty() && self.browser.remote_url.is_none() {
                return Err(SatchelError::Config(
                    "browser.driver_path or browser.remote_url is required \
                     when the browser is enabled"
                        .into(),
                ));
            }
            let waits = [
                self.browser.login_timeout_secs,
                self.browser.navigation_timeout_secs,
                self.browser.element_timeout_secs,
            ];
            if waits.contains(&0) {
                return Err(SatchelError::Config(
                    "browser timeouts must be greater than zero".into(),
                ));
            }
        }

        if self.notifications.enabled && self.notifications.relay_url.is_none() {
            return Err(SatchelError::Config(
                "notifications.relay_url is required when notifications are enabled".into(),
            ));
        }

        if self.sync.fetch_attempts == 0 {
            return Err(SatchelError::Config(
                "sync.fetch_attempts must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Generate a sensible default configuration.
    pub fn generate_default() -> Self {
        Self {
            satchel: SatchelSection {
                instance_name: "My Satchel".into(),
                data_dir: "/var/lib/satchel".into(),
                database: DatabaseConfig::default(),
            },
            security: SecurityConfig::default(),
            http: HttpConfig::default(),
            browser: BrowserConfig::default(),
            platforms: PlatformUrls::default(),
            notifications: NotificationConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_TOML: &str = r#"
[satchel]
instance_name = "Study Desk"
data_dir = "/var/lib/satchel"

[satchel.database]
path = "/var/lib/satchel/satchel.db"

[security]
key_path = "/var/lib/satchel/satchel.key"

[http]
timeout_secs = 20

[browser]
enabled = true
driver_path = "/usr/bin/chromedriver"
navigation_timeout_secs = 12

[platforms]
webassign_url = "https://webassign.example.test"

[notifications]
enabled = true
relay_url = "https://mail.example.test/send"
from = "sync@example.test"

[sync]
fetch_attempts = 3
retry_backoff_ms = 250
"#;

    fn parse_sample() -> SatchelConfig {
        toml::from_str(SAMPLE_TOML).expect("sample TOML should parse")
    }

    #[test]
    fn parse_full_config() {
        let cfg = parse_sample();
        assert_eq!(cfg.satchel.instance_name, "Study Desk");
        assert_eq!(cfg.satchel.database.path, "/var/lib/satchel/satchel.db");
        assert_eq!(cfg.http.timeout_secs, 20);
        assert!(cfg.browser.enabled);
        assert_eq!(cfg.browser.navigation_timeout_secs, 12);
        assert_eq!(cfg.browser.login_timeout_secs, 10);
        assert!(cfg.browser.headless);
        assert_eq!(
            cfg.platforms.webassign_url.as_deref(),
            Some("https://webassign.example.test")
        );
        assert!(cfg.platforms.gradescope_url.is_none());
        assert_eq!(cfg.notifications.from, "sync@example.test");
        assert_eq!(cfg.sync.fetch_attempts, 3);
        cfg.validate().expect("sample should validate");
    }

    #[test]
    fn minimal_config_parses() {
        let toml_str = r#"
[satchel]
instance_name = "Minimal"
data_dir = "/tmp/satchel"
"#;
        let cfg: SatchelConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.satchel.database.path, "/var/lib/satchel/satchel.db");
        assert_eq!(cfg.http.timeout_secs, 30);
        assert!(!cfg.browser.enabled);
        assert!(!cfg.notifications.enabled);
        assert_eq!(cfg.sync.fetch_attempts, 1);
    }

    #[test]
    fn roundtrip_serialization() {
        let cfg = parse_sample();
        let serialized = toml::to_string(&cfg).expect("should serialize");
        let deserialized: SatchelConfig =
            toml::from_str(&serialized).expect("should deserialize roundtrip");
        assert_eq!(deserialized.satchel.instance_name, cfg.satchel.instance_name);
        assert_eq!(deserialized.browser.driver_path, cfg.browser.driver_path);
    }

    #[test]
    fn generate_default_is_valid() {
        let cfg = SatchelConfig::generate_default();
        cfg.validate().expect("default config should be valid");
    }

    #[test]
    fn validate_requires_instance_name() {
        let mut cfg = SatchelConfig::generate_default();
        cfg.satchel.instance_name = String::new();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("instance_name"));
    }

    #[test]
    fn validate_rejects_zero_http_timeout() {
        let mut cfg = SatchelConfig::generate_default();
        cfg.http.timeout_secs = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn validate_browser_requires_driver_path() {
        let mut cfg = SatchelConfig::generate_default();
        cfg.browser.enabled = true;
        cfg.browser.driver_path = String::new();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("driver_path"));
    }

    #[test]
    fn validate_browser_rejects_zero_wait() {
        let mut cfg = SatchelConfig::generate_default();
        cfg.browser.enabled = true;
        cfg.browser.element_timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn disabled_browser_ignores_wait_settings() {
        let mut cfg = SatchelConfig::generate_default();
        cfg.browser.element_timeout_secs = 0;
        cfg.validate().unwrap();
    }

    #[test]
    fn validate_notifications_require_relay() {
        let mut cfg = SatchelConfig::generate_default();
        cfg.notifications.enabled = true;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("relay_url"));
    }

    #[test]
    fn validate_rejects_zero_fetch_attempts() {
        let mut cfg = SatchelConfig::generate_default();
        cfg.sync.fetch_attempts = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("fetch_attempts"));
    }

    #[test]
    fn load_from_file() {
        let dir = std::env::temp_dir().join("satchel_test_config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("satchel.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE_TOML.as_bytes()).unwrap();

        let cfg = SatchelConfig::load(&path).expect("should load from file");
        assert_eq!(cfg.satchel.instance_name, "Study Desk");

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(&dir).ok();
    }

    #[test]
    fn load_nonexistent_file_returns_io_error() {
        let result = SatchelConfig::load(Path::new("/nonexistent/satchel.toml"));
        assert!(matches!(result, Err(SatchelError::Io(_))));
    }

    #[test]
    fn load_invalid_toml_returns_config_error() {
        let dir = std::env::temp_dir().join("satchel_test_bad_toml");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "this is [[[not valid toml").unwrap();

        let result = SatchelConfig::load(&path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("config"));

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(&dir).ok();
    }
}
