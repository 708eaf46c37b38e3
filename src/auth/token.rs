use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Bearer credential issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdToken {
    /// The ID token attached to authorized API requests
    pub access_token: String,

    /// An optional refresh token used to obtain new ID tokens
    pub refresh_token: Option<String>,

    /// When the ID token expires (if known)
    pub expires_at: Option<DateTime<Utc>>,
}

impl IdToken {
    /// Create a new credential
    pub fn new(access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: None,
        }
    }

    /// Set the expiration from a provider-reported lifetime in seconds
    pub fn with_expiry(mut self, expires_in_secs: i64) -> Self {
        self.expires_at = Some(Utc::now() + Duration::seconds(expires_in_secs));
        self
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        // If we don't know when it expires, assume it's still valid
        self.expires_at.map_or(false, |exp| exp <= Utc::now())
    }

    /// Check if the token will expire within the given threshold
    pub fn expires_soon(&self, threshold_secs: i64) -> bool {
        self.expires_at
            .map_or(false, |exp| (exp - Utc::now()).num_seconds() < threshold_secs)
    }

    /// Whether the token needs refreshing before use
    pub fn is_stale(&self) -> bool {
        self.access_token.is_empty() || self.is_expired()
    }
}
