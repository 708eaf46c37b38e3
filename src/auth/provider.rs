use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::auth::token::IdToken;
use crate::error::PortalResult;

/// External-provider user handle. Read-only downstream of the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque provider-assigned user id
    pub uid: String,
    /// Email address the user signed in with
    pub email: String,
}

/// A completed sign-in: who the user is plus the credential to act as them.
#[derive(Debug, Clone)]
pub struct ProviderSession {
    pub identity: Identity,
    pub token: IdToken,
}

/// Auth-state change pushed by the provider outside of an explicit call,
/// e.g. remote revocation.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    SignedIn(Identity),
    SignedOut,
}

/// Handle for an in-progress federated sign-in.
///
/// The provider hands the user a verification URL and a short code; the
/// client polls until the user completes or abandons the flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedFlow {
    /// Identifier used when polling for the outcome
    pub flow_id: String,
    /// URL the user must visit to complete sign-in
    pub verification_uri: String,
    /// Code the user enters on the verification page
    pub user_code: String,
    /// Seconds until the flow expires
    pub expires_in: u64,
    /// Seconds to wait between polling attempts
    pub poll_interval: u64,
}

/// Outcome of a single federated-flow poll.
#[derive(Debug, Clone)]
pub enum FederatedStatus {
    /// Still waiting on the user
    Pending,
    /// Sign-in completed
    Completed(ProviderSession),
    /// The user declined the sign-in
    Denied,
    /// The flow timed out before the user finished
    Expired,
}

/// Capability interface over the external identity service.
///
/// The session store depends only on this trait, so a different identity
/// backend can be substituted without touching session logic.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Provider name, for logging
    fn name(&self) -> &str;

    /// Sign in with email and password
    async fn sign_in(&self, email: &str, password: &str) -> PortalResult<ProviderSession>;

    /// Start a federated sign-in flow
    async fn begin_federated(&self) -> PortalResult<FederatedFlow>;

    /// Poll an in-progress federated flow
    async fn poll_federated(&self, flow: &FederatedFlow) -> PortalResult<FederatedStatus>;

    /// Exchange a refresh token for a fresh credential
    async fn refresh(&self, token: &IdToken) -> PortalResult<IdToken>;

    /// Revoke the credential with the provider. Failure here is tolerated
    /// by callers; local session teardown never depends on it.
    async fn sign_out(&self, token: &IdToken) -> PortalResult<()>;

    /// The identity the provider currently considers signed in, if any
    async fn current_identity(&self) -> Option<Identity>;

    /// Subscribe to provider-initiated auth-state changes
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}
