use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::api::http::{HttpClient, HttpResponse, ReqwestHttpClient};
use crate::api::types::{BackendHealth, IamRolesPayload, RawUserProfile, ResourceBatch, UserProfile};
use crate::error::{PortalError, PortalResult};
use crate::session::SessionStore;

/// Authorized HTTP client for the portal backend.
///
/// Every authorized call obtains the bearer token from the session store at
/// call time; tokens are never cached here. The client performs no implicit
/// retry: retry policy belongs to callers so the UI can show precise
/// loading and error states.
pub struct ApiClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: Arc<SessionStore>) -> Self {
        Self::with_http(base_url, session, Arc::new(ReqwestHttpClient::new()))
    }

    /// Construct with a custom transport, for tests
    pub fn with_http(
        base_url: impl Into<String>,
        session: Arc<SessionStore>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            session,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issue an authorized GET and classify the outcome.
    ///
    /// 401/403 surface as `Unauthorized`, everything else that is not a
    /// parseable 2xx surfaces as `Transport`.
    pub async fn request(&self, path: &str) -> PortalResult<Value> {
        let token = self.session.token().await?;
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", token));

        debug!(path = %path, "Portal API request");
        let response = self.http.get(&self.url(path), headers).await?;
        classify(response)
    }

    /// Connectivity probe; the one call made without a bearer token
    pub async fn health(&self) -> PortalResult<BackendHealth> {
        let response = self.http.get(&self.url("/health"), HashMap::new()).await?;
        let value = classify(response)?;
        serde_json::from_value(value)
            .map_err(|e| PortalError::transport(format!("malformed health response: {}", e)))
    }

    /// The backend's view of the signed-in user
    pub async fn fetch_profile(&self) -> PortalResult<UserProfile> {
        let value = self.request("/api/user").await?;
        let raw: RawUserProfile = serde_json::from_value(value)
            .map_err(|e| PortalError::transport(format!("malformed user response: {}", e)))?;
        Ok(raw.into())
    }

    /// The role-scoped resource list, with the access summary when the
    /// backend provides one
    pub async fn fetch_resources(&self) -> PortalResult<ResourceBatch> {
        let value = self.request("/api/resources").await?;
        let batch: ResourceBatch = serde_json::from_value(value)
            .map_err(|e| PortalError::transport(format!("malformed resources response: {}", e)))?;
        if batch.access_summary.is_none() {
            debug!("Backend returned no access summary");
        }
        Ok(batch)
    }

    /// IAM role grants, best-effort: failures must not block resource display
    pub async fn fetch_iam_roles(&self) -> PortalResult<BTreeSet<String>> {
        let value = self.request("/api/iam-roles").await?;
        let payload: IamRolesPayload = serde_json::from_value(value)
            .map_err(|e| PortalError::transport(format!("malformed iam-roles response: {}", e)))?;
        Ok(payload.gcp_iam_roles.into_iter().collect())
    }
}

/// Map a raw response to success / unauthorized / transport
fn classify(response: HttpResponse) -> PortalResult<Value> {
    let status = response.status();
    if status == 401 || status == 403 {
        let message = error_message(response.body(), status);
        warn!(status, message = %message, "Backend rejected token");
        return Err(PortalError::unauthorized(status, message));
    }
    if !response.is_success() {
        return Err(PortalError::transport_status(
            status,
            error_message(response.body(), status),
        ));
    }
    serde_json::from_str(response.body())
        .map_err(|e| PortalError::transport(format!("malformed response body: {}", e)))
}

/// Pull the backend's `{"error": "..."}` message out of a failure body
fn error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| format!("backend returned status {}", status))
}
