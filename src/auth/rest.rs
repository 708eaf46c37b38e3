use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::auth::provider::{
    CredentialProvider, FederatedFlow, FederatedStatus, Identity, ProviderEvent, ProviderSession,
};
use crate::auth::token::IdToken;
use crate::config::IdentityConfig;
use crate::error::{PortalError, PortalResult};

const EVENT_CHANNEL_CAPACITY: usize = 16;
const FALLBACK_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Identity provider adapter speaking an identity-toolkit-style REST API.
pub struct RestIdentityProvider {
    config: IdentityConfig,
    client: reqwest::Client,
    signed_in: RwLock<Option<Identity>>,
    events: broadcast::Sender<ProviderEvent>,
}

/// Response to a password sign-in
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    local_id: String,
    email: String,
}

/// Response to a refresh-token exchange
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: Option<String>,
    expires_in: Option<String>,
}

/// Error envelope returned by the identity service
#[derive(Debug, Deserialize)]
struct IdpErrorResponse {
    error: IdpErrorBody,
}

#[derive(Debug, Deserialize)]
struct IdpErrorBody {
    message: String,
}

/// Response to starting a federated device flow
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceBeginResponse {
    flow_id: String,
    verification_uri: String,
    user_code: String,
    expires_in: u64,
    interval: u64,
}

/// Response to polling a federated device flow
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DevicePollResponse {
    status: String,
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    local_id: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

impl RestIdentityProvider {
    pub fn new(config: IdentityConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            client: reqwest::Client::new(),
            signed_in: RwLock::new(None),
            events,
        }
    }

    fn endpoint(&self, op: &str) -> String {
        format!(
            "{}/v1/{}?key={}",
            self.config.endpoint, op, self.config.api_key
        )
    }

    /// Extract the provider's error message from a failed response body
    fn error_message(body: &str, status: u16) -> String {
        match serde_json::from_str::<IdpErrorResponse>(body) {
            Ok(envelope) => envelope.error.message,
            Err(_) => format!("identity provider returned status {}", status),
        }
    }

    fn parse_lifetime(raw: Option<&str>) -> i64 {
        match raw.and_then(|v| v.parse::<i64>().ok()) {
            Some(secs) => secs,
            None => {
                debug!("Provider did not report a usable token lifetime, using fallback");
                FALLBACK_TOKEN_LIFETIME_SECS
            }
        }
    }

    async fn record_sign_in(&self, identity: &Identity) {
        *self.signed_in.write().await = Some(identity.clone());
        let _ = self.events.send(ProviderEvent::SignedIn(identity.clone()));
    }
}

#[async_trait]
impl CredentialProvider for RestIdentityProvider {
    fn name(&self) -> &str {
        "rest-idp"
    }

    async fn sign_in(&self, email: &str, password: &str) -> PortalResult<ProviderSession> {
        let request = SignInRequest {
            email,
            password,
            return_secure_token: true,
        };

        let response = self
            .client
            .post(self.endpoint("accounts:signInWithPassword"))
            .json(&request)
            .send()
            .await
            .map_err(|e| PortalError::authentication(format!("sign-in call failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| PortalError::authentication(format!("sign-in call failed: {}", e)))?;

        if !(200..300).contains(&status) {
            let message = Self::error_message(&body, status);
            debug!(email = %email, status, message = %message, "Sign-in rejected");
            return Err(PortalError::authentication(message));
        }

        let parsed: SignInResponse = serde_json::from_str(&body)
            .map_err(|e| PortalError::authentication(format!("malformed sign-in response: {}", e)))?;

        let identity = Identity {
            uid: parsed.local_id,
            email: parsed.email,
        };
        let token = IdToken::new(parsed.id_token, parsed.refresh_token)
            .with_expiry(Self::parse_lifetime(parsed.expires_in.as_deref()));

        info!(email = %identity.email, "Signed in with identity provider");
        self.record_sign_in(&identity).await;

        Ok(ProviderSession { identity, token })
    }

    async fn begin_federated(&self) -> PortalResult<FederatedFlow> {
        let response = self
            .client
            .post(self.endpoint("device:begin"))
            .json(&json!({ "project": self.config.project }))
            .send()
            .await
            .map_err(|e| PortalError::authentication(format!("federated start failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| PortalError::authentication(format!("federated start failed: {}", e)))?;

        if !(200..300).contains(&status) {
            return Err(PortalError::authentication(Self::error_message(
                &body, status,
            )));
        }

        let parsed: DeviceBeginResponse = serde_json::from_str(&body).map_err(|e| {
            PortalError::authentication(format!("malformed federated response: {}", e))
        })?;

        info!(verification_uri = %parsed.verification_uri, "Started federated sign-in flow");
        Ok(FederatedFlow {
            flow_id: parsed.flow_id,
            verification_uri: parsed.verification_uri,
            user_code: parsed.user_code,
            expires_in: parsed.expires_in,
            poll_interval: parsed.interval,
        })
    }

    async fn poll_federated(&self, flow: &FederatedFlow) -> PortalResult<FederatedStatus> {
        let response = self
            .client
            .post(self.endpoint("device:poll"))
            .json(&json!({ "flowId": flow.flow_id }))
            .send()
            .await
            .map_err(|e| PortalError::authentication(format!("federated poll failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| PortalError::authentication(format!("federated poll failed: {}", e)))?;

        if !(200..300).contains(&status) {
            return Err(PortalError::authentication(Self::error_message(
                &body, status,
            )));
        }

        let parsed: DevicePollResponse = serde_json::from_str(&body).map_err(|e| {
            PortalError::authentication(format!("malformed federated response: {}", e))
        })?;

        match parsed.status.as_str() {
            "pending" => Ok(FederatedStatus::Pending),
            "denied" => Ok(FederatedStatus::Denied),
            "expired" => Ok(FederatedStatus::Expired),
            "complete" => {
                let id_token = parsed.id_token.ok_or_else(|| {
                    PortalError::authentication("completed flow missing id token")
                })?;
                let identity = Identity {
                    uid: parsed.local_id.unwrap_or_default(),
                    email: parsed.email.unwrap_or_default(),
                };
                let token = IdToken::new(id_token, parsed.refresh_token)
                    .with_expiry(Self::parse_lifetime(parsed.expires_in.as_deref()));
                info!(email = %identity.email, "Federated sign-in completed");
                self.record_sign_in(&identity).await;
                Ok(FederatedStatus::Completed(ProviderSession {
                    identity,
                    token,
                }))
            }
            other => Err(PortalError::authentication(format!(
                "unexpected flow status: {}",
                other
            ))),
        }
    }

    async fn refresh(&self, token: &IdToken) -> PortalResult<IdToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| PortalError::session_expired("no refresh token available"))?;

        let response = self
            .client
            .post(self.endpoint("token"))
            .json(&json!({
                "grant_type": "refresh_token",
                "refresh_token": refresh_token,
            }))
            .send()
            .await
            .map_err(|e| PortalError::session_expired(format!("refresh call failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| PortalError::session_expired(format!("refresh call failed: {}", e)))?;

        if !(200..300).contains(&status) {
            let message = Self::error_message(&body, status);
            warn!(status, message = %message, "Token refresh rejected");
            return Err(PortalError::session_expired(message));
        }

        let parsed: RefreshResponse = serde_json::from_str(&body)
            .map_err(|e| PortalError::session_expired(format!("malformed refresh response: {}", e)))?;

        debug!("Refreshed identity-provider credential");
        Ok(IdToken::new(
            parsed.id_token,
            parsed
                .refresh_token
                .or_else(|| Some(refresh_token.to_string())),
        )
        .with_expiry(Self::parse_lifetime(parsed.expires_in.as_deref())))
    }

    async fn sign_out(&self, token: &IdToken) -> PortalResult<()> {
        *self.signed_in.write().await = None;
        let _ = self.events.send(ProviderEvent::SignedOut);

        let response = self
            .client
            .post(self.endpoint("accounts:revoke"))
            .json(&json!({ "token": token.access_token }))
            .send()
            .await
            .map_err(|e| PortalError::transport(format!("revocation call failed: {}", e)))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(PortalError::transport_status(
                status,
                "identity provider rejected revocation",
            ));
        }
        Ok(())
    }

    async fn current_identity(&self) -> Option<Identity> {
        self.signed_in.read().await.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
