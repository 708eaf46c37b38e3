use thiserror::Error;

/// Result type used throughout the portal client
pub type PortalResult<T> = Result<T, PortalError>;

/// Failure classes surfaced by the portal client
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum PortalError {
    /// The identity provider rejected the credentials or the sign-in call failed
    #[error("Authentication failed: {reason}")]
    Authentication { reason: String },

    /// The user aborted the federated sign-in flow
    #[error("Sign-in cancelled by user")]
    UserCancelled,

    /// The session credential could not be refreshed
    #[error("Session expired: {reason}")]
    SessionExpired { reason: String },

    /// The backend rejected the bearer token (HTTP 401/403).
    /// Callers must not retry this class; it signals re-authentication.
    #[error("Not authorized (status {status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// Network failure, malformed response body, or an unexpected status.
    /// Idempotent GETs may be retried by the caller; the client never
    /// retries on its own.
    #[error("Request failed: {message}")]
    Transport { message: String, status: Option<u16> },

    /// Missing or invalid environment configuration. Fatal at startup.
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl PortalError {
    pub fn authentication(reason: impl Into<String>) -> Self {
        Self::Authentication {
            reason: reason.into(),
        }
    }

    pub fn session_expired(reason: impl Into<String>) -> Self {
        Self::SessionExpired {
            reason: reason.into(),
        }
    }

    pub fn unauthorized(status: u16, message: impl Into<String>) -> Self {
        Self::Unauthorized {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    pub fn transport_status(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error means the backend refused the token
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        Self::Transport {
            message: err.to_string(),
            status,
        }
    }
}
