use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::provider::{
    CredentialProvider, FederatedFlow, FederatedStatus, Identity, ProviderEvent, ProviderSession,
};
use crate::auth::token::IdToken;
use crate::error::{PortalError, PortalResult};

const EVENT_CHANNEL_CAPACITY: usize = 16;
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Outcome a scripted federated flow resolves to.
#[derive(Debug, Clone)]
pub enum FederatedOutcome {
    /// Complete as the given account email
    Approve(String),
    /// The user declines
    Deny,
    /// The flow times out
    Expire,
}

struct Account {
    uid: String,
    password: String,
}

/// In-memory credential provider with configurable accounts.
///
/// Stands in for the real identity service in tests and local demos;
/// federated flows resolve to a scripted outcome on the first poll.
pub struct MemoryCredentialProvider {
    accounts: RwLock<HashMap<String, Account>>,
    signed_in: RwLock<Option<Identity>>,
    federated_outcome: RwLock<FederatedOutcome>,
    /// Refresh tokens currently considered valid
    refreshable: RwLock<HashMap<String, String>>, // refresh_token -> email
    refresh_allowed: RwLock<bool>,
    sign_out_fails: RwLock<bool>,
    token_lifetime_secs: RwLock<i64>,
    events: broadcast::Sender<ProviderEvent>,
}

impl MemoryCredentialProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            accounts: RwLock::new(HashMap::new()),
            signed_in: RwLock::new(None),
            federated_outcome: RwLock::new(FederatedOutcome::Deny),
            refreshable: RwLock::new(HashMap::new()),
            refresh_allowed: RwLock::new(true),
            sign_out_fails: RwLock::new(false),
            token_lifetime_secs: RwLock::new(DEFAULT_TOKEN_LIFETIME_SECS),
            events,
        }
    }

    /// Register an account that `sign_in` will accept
    pub async fn add_account(&self, email: &str, password: &str) {
        let uid = Uuid::new_v4().to_string();
        self.accounts.write().await.insert(
            email.to_string(),
            Account {
                uid,
                password: password.to_string(),
            },
        );
    }

    /// Script the outcome of the next federated flow
    pub async fn set_federated_outcome(&self, outcome: FederatedOutcome) {
        *self.federated_outcome.write().await = outcome;
    }

    /// Allow or forbid refresh-token exchanges (to simulate revocation)
    pub async fn set_refresh_allowed(&self, allowed: bool) {
        *self.refresh_allowed.write().await = allowed;
    }

    /// Make the remote sign-out call fail (local teardown must not care)
    pub async fn set_sign_out_fails(&self, fails: bool) {
        *self.sign_out_fails.write().await = fails;
    }

    /// Lifetime of newly issued tokens; negative values issue tokens that
    /// are already expired
    pub async fn set_token_lifetime(&self, secs: i64) {
        *self.token_lifetime_secs.write().await = secs;
    }

    /// Push a provider-initiated sign-out event to subscribers
    pub async fn revoke_remotely(&self) {
        *self.signed_in.write().await = None;
        self.refreshable.write().await.clear();
        let _ = self.events.send(ProviderEvent::SignedOut);
    }

    async fn issue_session(&self, email: &str, uid: &str) -> ProviderSession {
        let identity = Identity {
            uid: uid.to_string(),
            email: email.to_string(),
        };
        let refresh_token = Uuid::new_v4().to_string();
        self.refreshable
            .write()
            .await
            .insert(refresh_token.clone(), email.to_string());
        let lifetime = *self.token_lifetime_secs.read().await;
        let token = IdToken::new(Uuid::new_v4().to_string(), Some(refresh_token))
            .with_expiry(lifetime);
        *self.signed_in.write().await = Some(identity.clone());
        let _ = self.events.send(ProviderEvent::SignedIn(identity.clone()));
        ProviderSession { identity, token }
    }
}

impl Default for MemoryCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for MemoryCredentialProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn sign_in(&self, email: &str, password: &str) -> PortalResult<ProviderSession> {
        let uid = {
            let accounts = self.accounts.read().await;
            match accounts.get(email) {
                Some(account) if account.password == password => account.uid.clone(),
                Some(_) => {
                    debug!(email = %email, "Password mismatch");
                    return Err(PortalError::authentication("invalid credentials"));
                }
                None => {
                    debug!(email = %email, "Unknown account");
                    return Err(PortalError::authentication("invalid credentials"));
                }
            }
        };

        info!(email = %email, "Memory provider sign-in");
        Ok(self.issue_session(email, &uid).await)
    }

    async fn begin_federated(&self) -> PortalResult<FederatedFlow> {
        Ok(FederatedFlow {
            flow_id: Uuid::new_v4().to_string(),
            verification_uri: "https://example.invalid/device".to_string(),
            user_code: "TEST-CODE".to_string(),
            expires_in: 300,
            poll_interval: 0,
        })
    }

    async fn poll_federated(&self, _flow: &FederatedFlow) -> PortalResult<FederatedStatus> {
        let outcome = self.federated_outcome.read().await.clone();
        match outcome {
            FederatedOutcome::Approve(email) => {
                let uid = {
                    let accounts = self.accounts.read().await;
                    accounts
                        .get(&email)
                        .map(|a| a.uid.clone())
                        .unwrap_or_else(|| Uuid::new_v4().to_string())
                };
                Ok(FederatedStatus::Completed(
                    self.issue_session(&email, &uid).await,
                ))
            }
            FederatedOutcome::Deny => Ok(FederatedStatus::Denied),
            FederatedOutcome::Expire => Ok(FederatedStatus::Expired),
        }
    }

    async fn refresh(&self, token: &IdToken) -> PortalResult<IdToken> {
        if !*self.refresh_allowed.read().await {
            return Err(PortalError::session_expired("refresh token revoked"));
        }
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| PortalError::session_expired("no refresh token"))?;
        let known = self
            .refreshable
            .read()
            .await
            .contains_key(refresh_token);
        if !known {
            return Err(PortalError::session_expired("unknown refresh token"));
        }
        debug!("Memory provider refreshed credential");
        Ok(
            IdToken::new(Uuid::new_v4().to_string(), Some(refresh_token.to_string()))
                .with_expiry(DEFAULT_TOKEN_LIFETIME_SECS),
        )
    }

    async fn sign_out(&self, token: &IdToken) -> PortalResult<()> {
        if *self.sign_out_fails.read().await {
            return Err(PortalError::transport("provider sign-out unavailable"));
        }
        if let Some(refresh_token) = &token.refresh_token {
            self.refreshable.write().await.remove(refresh_token);
        }
        *self.signed_in.write().await = None;
        let _ = self.events.send(ProviderEvent::SignedOut);
        Ok(())
    }

    async fn current_identity(&self) -> Option<Identity> {
        self.signed_in.read().await.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
