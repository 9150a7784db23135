//! Error types for the Satchel core crate.

use thiserror::Error;

use crate::models::platform::Platform;

/// Failures raised by a platform adapter.
///
/// None of these are retried inside the adapter; retry policy belongs to the
/// orchestrator.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Bad credentials, or the platform rejected the login.
    #[error("{platform} authentication failed: {reason}")]
    Authentication { platform: Platform, reason: String },

    /// A fetch was issued before a valid session existed.
    #[error("{platform} adapter is not authenticated; call authenticate() first")]
    NotAuthenticated { platform: Platform },

    /// Transport or HTTP-level failure after authentication.
    #[error("{platform} fetch failed: {reason}")]
    Fetch { platform: Platform, reason: String },

    /// The response body did not match the expected structure.
    #[error("{platform} response could not be parsed: {reason}")]
    Parse { platform: Platform, reason: String },

    /// A bounded browser wait expired.
    #[error("{platform} timed out after {seconds}s waiting for {waiting_for}")]
    Timeout {
        platform: Platform,
        waiting_for: String,
        seconds: u64,
    },
}

impl AdapterError {
    pub fn platform(&self) -> Platform {
        match self {
            AdapterError::Authentication { platform, .. }
            | AdapterError::NotAuthenticated { platform }
            | AdapterError::Fetch { platform, .. }
            | AdapterError::Parse { platform, .. }
            | AdapterError::Timeout { platform, .. } => *platform,
        }
    }

    /// Whether a repeat attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdapterError::Fetch { .. } | AdapterError::Timeout { .. }
        )
    }
}

/// Top-level error type for all Satchel core operations.
#[derive(Debug, Error)]
pub enum SatchelError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("invalid credentials for {platform}: missing {}", .missing.join(", "))]
    InvalidCredentialShape {
        platform: Platform,
        missing: Vec<String>,
    },

    #[error("user not found: {0}")]
    UserNotFound(i64),

    #[error("no stored credentials for user {user_id} on {platform}")]
    CredentialsNotFound { user_id: i64, platform: Platform },

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("notification error: {0}")]
    Notify(String),
}

impl SatchelError {
    /// True when the store rejected a write because the dedup key already exists.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            SatchelError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

/// A convenience Result alias that defaults to [`SatchelError`].
pub type Result<T> = std::result::Result<T, SatchelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = SatchelError::Config("missing field".into());
        assert_eq!(err.to_string(), "configuration error: missing field");
    }

    #[test]
    fn io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = SatchelError::from(io_err);
        assert!(matches!(err, SatchelError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn invalid_credential_shape_lists_missing_fields() {
        let err = SatchelError::InvalidCredentialShape {
            platform: Platform::Moodle,
            missing: vec!["password".into(), "baseUrl".into()],
        };
        assert_eq!(
            err.to_string(),
            "invalid credentials for moodle: missing password, baseUrl"
        );
    }

    #[test]
    fn adapter_error_is_transparent() {
        let err = SatchelError::from(AdapterError::NotAuthenticated {
            platform: Platform::Piazza,
        });
        assert_eq!(
            err.to_string(),
            "piazza adapter is not authenticated; call authenticate() first"
        );
    }

    #[test]
    fn timeout_display_and_transience() {
        let err = AdapterError::Timeout {
            platform: Platform::Owlv2,
            waiting_for: "#username".into(),
            seconds: 10,
        };
        assert_eq!(err.to_string(), "owlv2 timed out after 10s waiting for #username");
        assert!(err.is_transient());
        assert_eq!(err.platform(), Platform::Owlv2);
    }

    #[test]
    fn auth_and_parse_are_not_transient() {
        let auth = AdapterError::Authentication {
            platform: Platform::Canvas,
            reason: "401".into(),
        };
        let parse = AdapterError::Parse {
            platform: Platform::Canvas,
            reason: "eof".into(),
        };
        assert!(!auth.is_transient());
        assert!(!parse.is_transient());
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!SatchelError::Config("x".into()).is_unique_violation());
        assert!(!SatchelError::Database(sqlx::Error::RowNotFound).is_unique_violation());
    }
}
