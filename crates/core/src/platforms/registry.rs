//! Platform identifier to adapter constructor, with the credential shape each one needs.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::config::{HttpConfig, SatchelConfig};
use crate::error::{Result, SatchelError};
use crate::models::credential::CredentialPayload;
use crate::models::platform::Platform;

use super::canvas::CanvasAdapter;
use super::gradescope::{self, Gradescope};
use super::moodle::MoodleAdapter;
use super::owlv2::browser::BrowserLauncher;
use super::owlv2::webdriver::WebDriverLauncher;
use super::owlv2::{self, BrowserTimeouts, Owlv2Adapter};
use super::piazza::{self, Piazza};
use super::session::{CookieSessionAdapter, SessionSite};
use super::webassign::{self, WebAssign};
use super::{AdapterVariant, PlatformAdapter};

/// Builds an adapter from a payload that already passed the shape check.
pub type AdapterBuilder =
    Arc<dyn Fn(&CredentialPayload) -> Result<Box<dyn PlatformAdapter>> + Send + Sync>;

/// What `satchel platforms` prints for each registered platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialShape {
    pub platform: Platform,
    pub variant: AdapterVariant,
    pub required: Vec<&'static str>,
}

struct Registration {
    variant: AdapterVariant,
    required: &'static [&'static str],
    build: AdapterBuilder,
}

pub struct AdapterRegistry {
    entries: BTreeMap<Platform, Registration>,
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register every built-in platform. OWLv2 is only registered when the browser is enabled.
    pub fn from_config(config: &SatchelConfig) -> Result<Self> {
        let mut registry = Self::empty();
        let http = config.http.clone();
        let urls = &config.platforms;

        registry.register(
            Platform::Canvas,
            AdapterVariant::Token,
            &["apiKey", "baseUrl"],
            {
                let http = http.clone();
                builder(move |p| {
                    let adapter =
                        CanvasAdapter::new(field(p, "baseUrl"), field(p, "apiKey"), &http)?;
                    Ok(Box::new(adapter))
                })
            },
        );

        let base = base_url(&urls.webassign_url, webassign::DEFAULT_BASE_URL);
        registry.register(
            Platform::WebAssign,
            AdapterVariant::CookieSession,
            &["username", "password"],
            session_builder::<WebAssign>(base, "username", http.clone()),
        );

        let base = base_url(&urls.gradescope_url, gradescope::DEFAULT_BASE_URL);
        registry.register(
            Platform::Gradescope,
            AdapterVariant::CookieSession,
            &["email", "password"],
            session_builder::<Gradescope>(base, "email", http.clone()),
        );

        let base = base_url(&urls.piazza_url, piazza::DEFAULT_BASE_URL);
        registry.register(
            Platform::Piazza,
            AdapterVariant::CookieSession,
            &["email", "password"],
            session_builder::<Piazza>(base, "email", http.clone()),
        );

        registry.register(
            Platform::Moodle,
            AdapterVariant::CookieSession,
            &["username", "password", "baseUrl"],
            builder(move |p| {
                let adapter = MoodleAdapter::new(
                    field(p, "baseUrl"),
                    field(p, "username"),
                    field(p, "password"),
                    &http,
                )?;
                Ok(Box::new(adapter))
            }),
        );

        if config.browser.enabled {
            let launcher: Arc<dyn BrowserLauncher> =
                Arc::new(WebDriverLauncher::new(&config.browser)?);
            let timeouts = BrowserTimeouts::from_config(&config.browser);
            let base = base_url(&urls.owlv2_url, owlv2::DEFAULT_BASE_URL);
            registry.register(
                Platform::Owlv2,
                AdapterVariant::HeadlessBrowser,
                &["username", "password"],
                builder(move |p| {
                    Ok(Box::new(Owlv2Adapter::new(
                        &base,
                        field(p, "username"),
                        field(p, "password"),
                        launcher.clone(),
                        timeouts,
                    )))
                }),
            );
        } else {
            debug!("Browser disabled; OWLv2 not registered");
        }

        Ok(registry)
    }

    /// Add or replace the registration for `platform`.
    pub fn register(
        &mut self,
        platform: Platform,
        variant: AdapterVariant,
        required: &'static [&'static str],
        build: AdapterBuilder,
    ) {
        self.entries.insert(
            platform,
            Registration {
                variant,
                required,
                build,
            },
        );
    }

    /// Parse `platform` and build its adapter. Nothing touches the network here.
    pub fn resolve(
        &self,
        platform: &str,
        payload: &CredentialPayload,
    ) -> Result<Box<dyn PlatformAdapter>> {
        let parsed: Platform = platform.parse()?;
        self.resolve_platform(parsed, payload)
    }

    pub fn resolve_platform(
        &self,
        platform: Platform,
        payload: &CredentialPayload,
    ) -> Result<Box<dyn PlatformAdapter>> {
        let entry = self.entries.get(&platform).ok_or_else(|| {
            SatchelError::UnknownPlatform(format!("{platform} (not registered)"))
        })?;

        let missing: Vec<String> = entry
            .required
            .iter()
            .filter(|key| payload.get(key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SatchelError::InvalidCredentialShape { platform, missing });
        }

        (entry.build)(payload)
    }

    pub fn describe(&self) -> Vec<CredentialShape> {
        self.entries
            .iter()
            .map(|(platform, entry)| CredentialShape {
                platform: *platform,
                variant: entry.variant,
                required: entry.required.to_vec(),
            })
            .collect()
    }
}

fn field<'a>(payload: &'a CredentialPayload, key: &str) -> &'a str {
    payload.get(key).unwrap_or_default()
}

fn base_url(configured: &Option<String>, default: &str) -> String {
    configured
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or(default)
        .to_string()
}

pub fn builder<F>(build: F) -> AdapterBuilder
where
    F: Fn(&CredentialPayload) -> Result<Box<dyn PlatformAdapter>> + Send + Sync + 'static,
{
    Arc::new(build)
}

/// Constructor shared by the fixed-URL cookie-session platforms.
fn session_builder<S: SessionSite>(
    base: String,
    identifier_field: &'static str,
    http: HttpConfig,
) -> AdapterBuilder {
    builder(move |p| {
        let adapter = CookieSessionAdapter::<S>::new(
            &base,
            field(p, identifier_field),
            field(p, "password"),
            &http,
        )?;
        Ok(Box::new(adapter))
    })
}
