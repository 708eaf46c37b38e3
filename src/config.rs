use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PortalError, PortalResult};

// Default configuration values
const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Main configuration for the portal client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Base URL of the portal backend API
    pub api_url: String,
    /// Identity provider configuration
    pub identity: IdentityConfig,
}

/// Identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Base URL of the identity provider REST endpoint
    pub endpoint: String,
    /// API key passed to the identity provider on each call
    pub api_key: String,
    /// Project identifier the client authenticates against
    pub project: String,
}

impl PortalConfig {
    /// Load configuration from the environment.
    ///
    /// `PORTAL_API_URL` falls back to the local development endpoint;
    /// the identity provider settings (`PORTAL_IDP_URL`, `PORTAL_IDP_API_KEY`,
    /// `PORTAL_IDP_PROJECT`) are required. Missing or malformed values fail
    /// here, before any network call is attempted.
    pub fn from_env() -> PortalResult<Self> {
        let api_url = std::env::var("PORTAL_API_URL").unwrap_or_else(|_| {
            debug!("PORTAL_API_URL not set, using development default");
            DEFAULT_API_URL.to_string()
        });

        let identity = IdentityConfig {
            endpoint: require_env("PORTAL_IDP_URL")?,
            api_key: require_env("PORTAL_IDP_API_KEY")?,
            project: require_env("PORTAL_IDP_PROJECT")?,
        };

        let config = Self { api_url, identity };
        config.validate()?;

        info!(api_url = %config.api_url, project = %config.identity.project, "Loaded portal configuration");
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> PortalResult<()> {
        validate_url("api_url", &self.api_url)?;
        validate_url("identity.endpoint", &self.identity.endpoint)?;
        if self.identity.api_key.trim().is_empty() {
            return Err(PortalError::configuration("identity.api_key is empty"));
        }
        if self.identity.project.trim().is_empty() {
            return Err(PortalError::configuration("identity.project is empty"));
        }
        Ok(())
    }
}

fn require_env(name: &str) -> PortalResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        Ok(_) => Err(PortalError::configuration(format!("{} is empty", name))),
        Err(_) => Err(PortalError::configuration(format!("{} is not set", name))),
    }
}

fn validate_url(field: &str, value: &str) -> PortalResult<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(PortalError::configuration(format!(
            "{} is not a valid http(s) URL: {}",
            field, value
        )))
    }
}
