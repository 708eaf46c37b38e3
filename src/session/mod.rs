use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::auth::provider::{
    CredentialProvider, FederatedStatus, Identity, ProviderEvent, ProviderSession,
};
use crate::auth::token::IdToken;
use crate::error::{PortalError, PortalResult};

/// Refresh the credential this many seconds before its reported expiry
const TOKEN_REFRESH_SKEW_SECS: i64 = 60;

/// Authentication state of the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Unauthenticated,
    Authenticating,
    Authenticated,
    /// Unrecoverable provider failure; leaves only via a new login
    Error { reason: String },
}

/// Snapshot of the current session.
///
/// Identity and token are populated together in a single update, so
/// observers never see one without the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub identity: Option<Identity>,
    pub token: Option<String>,
    pub status: SessionStatus,
}

impl Session {
    fn unauthenticated() -> Self {
        Self {
            identity: None,
            token: None,
            status: SessionStatus::Unauthenticated,
        }
    }

    fn authenticating() -> Self {
        Self {
            identity: None,
            token: None,
            status: SessionStatus::Authenticating,
        }
    }

    fn errored(reason: impl Into<String>) -> Self {
        Self {
            identity: None,
            token: None,
            status: SessionStatus::Error {
                reason: reason.into(),
            },
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

/// Owns authentication state and mediates every credential operation.
///
/// One store exists per client instance; collaborators receive it by
/// injection rather than through a global, so tests can run isolated
/// sessions in parallel.
pub struct SessionStore {
    provider: Arc<dyn CredentialProvider>,
    state: watch::Sender<Session>,
    /// Full credential, including the refresh token the Session never exposes
    credential: RwLock<Option<IdToken>>,
    /// Serializes session mutation so no two login/logout calls interleave
    transition: Mutex<()>,
    /// Bumped on every login/logout/expiry; fetch results captured under an
    /// older generation must be discarded, not applied
    generation: AtomicU64,
}

impl SessionStore {
    /// Create a store bound to a credential provider and start listening
    /// for provider-initiated sign-outs (e.g. remote revocation).
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Arc<Self> {
        let (state, _) = watch::channel(Session::unauthenticated());
        let store = Arc::new(Self {
            provider,
            state,
            credential: RwLock::new(None),
            transition: Mutex::new(()),
            generation: AtomicU64::new(0),
        });
        Self::listen_for_provider_events(&store);
        store
    }

    fn listen_for_provider_events(store: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(store);
        let mut events = store.provider.subscribe();
        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(store) = weak.upgrade() else { break };
                if let ProviderEvent::SignedOut = event {
                    if store.current().is_authenticated() {
                        info!("Provider reported sign-out, clearing session");
                        store.clear_locally(Session::unauthenticated()).await;
                    }
                }
            }
        });
    }

    /// Lazily observable session snapshots. New subscribers immediately see
    /// the most recent value, then every change.
    pub fn observe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// The current session snapshot
    pub fn current(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Current session generation, for stale-response guards
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Sign in with email and password.
    ///
    /// On success the session moves Unauthenticated -> Authenticating ->
    /// Authenticated with identity and token visible in one update. On
    /// failure the session returns to Unauthenticated and the provider's
    /// authentication error is surfaced.
    pub async fn login(&self, email: &str, password: &str) -> PortalResult<Identity> {
        let _guard = self.transition.lock().await;
        self.state.send_replace(Session::authenticating());

        match self.provider.sign_in(email, password).await {
            Ok(session) => Ok(self.install(session).await),
            Err(err) => {
                warn!(email = %email, error = %err, "Login failed");
                self.state.send_replace(Session::unauthenticated());
                Err(err)
            }
        }
    }

    /// Sign in through the provider's federated flow.
    ///
    /// Polls until the user completes, declines (`UserCancelled`) or the
    /// flow expires.
    pub async fn login_federated(&self) -> PortalResult<Identity> {
        let _guard = self.transition.lock().await;
        self.state.send_replace(Session::authenticating());

        let result = self.drive_federated_flow().await;
        match result {
            Ok(session) => Ok(self.install(session).await),
            Err(err) => {
                warn!(error = %err, "Federated login failed");
                self.state.send_replace(Session::unauthenticated());
                Err(err)
            }
        }
    }

    async fn drive_federated_flow(&self) -> PortalResult<ProviderSession> {
        let flow = self.provider.begin_federated().await?;
        info!(
            verification_uri = %flow.verification_uri,
            user_code = %flow.user_code,
            "Waiting for federated sign-in"
        );

        let deadline = Instant::now() + Duration::from_secs(flow.expires_in);
        loop {
            match self.provider.poll_federated(&flow).await? {
                FederatedStatus::Completed(session) => return Ok(session),
                FederatedStatus::Denied => return Err(PortalError::UserCancelled),
                FederatedStatus::Expired => {
                    return Err(PortalError::authentication("federated sign-in flow expired"))
                }
                FederatedStatus::Pending => {
                    if Instant::now() >= deadline {
                        return Err(PortalError::authentication(
                            "federated sign-in flow expired",
                        ));
                    }
                    sleep(Duration::from_secs(flow.poll_interval)).await;
                }
            }
        }
    }

    /// Clear the session. Local invalidation is unconditional: the remote
    /// sign-out may fail and is only logged. Idempotent.
    pub async fn logout(&self) {
        let _guard = self.transition.lock().await;
        let credential = self.credential.write().await.take();

        if self.current().status != SessionStatus::Unauthenticated {
            self.bump_generation();
            self.state.send_replace(Session::unauthenticated());
            info!("Session cleared");
        }

        if let Some(token) = credential {
            if let Err(err) = self.provider.sign_out(&token).await {
                warn!(error = %err, "Remote sign-out failed; local session already cleared");
            }
        }
    }

    /// The bearer token for the current session.
    ///
    /// Refreshes silently when the credential is stale; a failed refresh
    /// moves the session to `Error` and surfaces `SessionExpired`. The
    /// returned token is never a previously-expired one.
    pub async fn token(&self) -> PortalResult<String> {
        if !self.current().is_authenticated() {
            return Err(PortalError::session_expired("not authenticated"));
        }

        {
            let credential = self.credential.read().await;
            match credential.as_ref() {
                Some(token) if !token.is_stale() && !token.expires_soon(TOKEN_REFRESH_SKEW_SECS) => {
                    return Ok(token.access_token.clone());
                }
                _ => {}
            }
        }

        // Slow path: refresh under the transition lock so a concurrent
        // login/logout cannot interleave with the credential swap.
        let _guard = self.transition.lock().await;

        if !self.current().is_authenticated() {
            return Err(PortalError::session_expired("not authenticated"));
        }
        let current = match self.credential.read().await.clone() {
            Some(token) => token,
            None => return Err(PortalError::session_expired("no credential held")),
        };
        if !current.is_stale() && !current.expires_soon(TOKEN_REFRESH_SKEW_SECS) {
            // Another caller refreshed while we waited for the lock
            return Ok(current.access_token);
        }

        debug!("Credential stale, refreshing");
        match self.provider.refresh(&current).await {
            Ok(fresh) => {
                let access_token = fresh.access_token.clone();
                *self.credential.write().await = Some(fresh);
                self.state.send_modify(|session| {
                    session.token = Some(access_token.clone());
                });
                Ok(access_token)
            }
            Err(err) => {
                let reason = match &err {
                    PortalError::SessionExpired { reason } => reason.clone(),
                    other => other.to_string(),
                };
                warn!(reason = %reason, "Credential refresh failed, expiring session");
                self.credential.write().await.take();
                self.bump_generation();
                self.state.send_replace(Session::errored(reason.clone()));
                Err(PortalError::session_expired(reason))
            }
        }
    }

    /// Force the session out of Authenticated after the backend rejected the
    /// token. No remote call; the next login starts fresh.
    pub async fn expire(&self, reason: &str) {
        let _guard = self.transition.lock().await;
        if !self.current().is_authenticated() {
            return;
        }
        warn!(reason = %reason, "Expiring session");
        self.credential.write().await.take();
        self.bump_generation();
        self.state.send_replace(Session::errored(reason));
    }

    async fn install(&self, session: ProviderSession) -> Identity {
        let ProviderSession { identity, token } = session;
        let access_token = token.access_token.clone();
        *self.credential.write().await = Some(token);
        self.bump_generation();
        self.state.send_replace(Session {
            identity: Some(identity.clone()),
            token: Some(access_token),
            status: SessionStatus::Authenticated,
        });
        info!(email = %identity.email, "Session authenticated");
        identity
    }

    async fn clear_locally(&self, next: Session) {
        let _guard = self.transition.lock().await;
        self.credential.write().await.take();
        self.bump_generation();
        self.state.send_replace(next);
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
