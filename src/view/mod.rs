use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::types::{AccessSummary, Resource, UserProfile};
use crate::api::ApiClient;
use crate::error::{PortalError, PortalResult};
use crate::session::SessionStore;

/// Set of IAM role identifier strings, displayed but never managed by this
/// client
pub type IamRoleSet = BTreeSet<String>;

/// Presentation-ready projection of the fetched data, free of transport
/// and authentication detail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewModel {
    /// Absent when the profile fetch failed; resources are still shown
    pub profile: Option<UserProfile>,
    pub resources: Vec<Resource>,
    pub summary: Option<AccessSummary>,
    /// Local projection of IAM role grants. See [`ViewModel::remove_role`].
    pub iam_roles: IamRoleSet,
}

impl ViewModel {
    /// Remove a role from the local projection only.
    ///
    /// This is a display-side edit: it has zero effect on backend-held IAM
    /// grants, and the role reappears on the next refresh. Returns whether
    /// the role was present.
    pub fn remove_role(&mut self, role: &str) -> bool {
        self.iam_roles.remove(role)
    }

    /// An empty-but-successful view: the backend answered and granted
    /// access to nothing
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Combine the independently fetched pieces into a `ViewModel`.
///
/// Pure function, no I/O. The resource list passes through untouched: the
/// backend is the sole authority on visibility and the client never
/// re-derives it from the summary or the roles.
pub fn build_view(
    profile: Option<UserProfile>,
    resources: Vec<Resource>,
    summary: Option<AccessSummary>,
    iam_roles: IamRoleSet,
) -> ViewModel {
    ViewModel {
        profile,
        resources,
        summary,
        iam_roles,
    }
}

/// Observable dashboard state. Every variant is programmatically
/// distinguishable: an empty successful load is `Ready` with an empty
/// resource list, never `TransportFailed` or `Unauthorized`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DashboardState {
    /// No authenticated session
    SignedOut,
    /// A fetch sequence is in flight
    Loading,
    /// Data arrived; covers the empty-but-successful case
    Ready(ViewModel),
    /// The backend rejected the session token
    Unauthorized,
    /// The backend was unreachable or answered garbage
    TransportFailed(String),
}

/// Drives the fetch sequence and owns the latest dashboard state.
///
/// Results are applied only when the session generation captured before the
/// fetches still matches at completion; a logout or re-login in between
/// causes them to be discarded.
pub struct Dashboard {
    session: Arc<SessionStore>,
    api: Arc<ApiClient>,
    state: watch::Sender<DashboardState>,
}

impl Dashboard {
    pub fn new(session: Arc<SessionStore>, api: Arc<ApiClient>) -> Self {
        let (state, _) = watch::channel(DashboardState::SignedOut);
        Self {
            session,
            api,
            state,
        }
    }

    /// Replay-latest dashboard snapshots
    pub fn observe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    /// The current dashboard state
    pub fn state(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    /// Fetch profile, resources and IAM roles, then publish the built view.
    ///
    /// Profile and IAM roles are best-effort; the resource fetch is
    /// authoritative and its failure class decides the published state.
    pub async fn refresh(&self) {
        if !self.session.current().is_authenticated() {
            self.state.send_replace(DashboardState::SignedOut);
            return;
        }

        let generation = self.session.generation();
        self.state.send_replace(DashboardState::Loading);

        let outcome = self.load().await;

        if self.session.generation() != generation {
            debug!("Discarding fetch results from a superseded session");
            if !self.session.current().is_authenticated() {
                self.state.send_replace(DashboardState::SignedOut);
            }
            return;
        }

        match outcome {
            Ok(view) => {
                self.state.send_replace(DashboardState::Ready(view));
            }
            Err(err) if err.is_unauthorized() => {
                self.session.expire("backend rejected the session token").await;
                self.state.send_replace(DashboardState::Unauthorized);
            }
            Err(PortalError::SessionExpired { .. }) => {
                // The session store already transitioned; reflect it
                self.state.send_replace(DashboardState::Unauthorized);
            }
            Err(err) => {
                warn!(error = %err, "Dashboard load failed");
                self.state.send_replace(DashboardState::TransportFailed(err.to_string()));
            }
        }
    }

    async fn load(&self) -> PortalResult<ViewModel> {
        let profile = match self.api.fetch_profile().await {
            Ok(profile) => Some(profile),
            Err(err) if err.is_unauthorized() => return Err(err),
            Err(err) => {
                warn!(error = %err, "Profile fetch failed, rendering without badge");
                None
            }
        };

        let batch = self.api.fetch_resources().await?;

        let iam_roles = match self.api.fetch_iam_roles().await {
            Ok(roles) => roles,
            Err(err) => {
                warn!(error = %err, "IAM role fetch failed, continuing without roles");
                BTreeSet::new()
            }
        };

        Ok(build_view(
            profile,
            batch.resources,
            batch.access_summary,
            iam_roles,
        ))
    }

    /// Remove a role from the currently displayed view. Local projection
    /// edit only; no request is issued and backend grants are untouched.
    pub fn remove_role(&self, role: &str) -> bool {
        let mut removed = false;
        self.state.send_if_modified(|state| {
            if let DashboardState::Ready(view) = state {
                removed = view.remove_role(role);
                removed
            } else {
                false
            }
        });
        removed
    }
}
