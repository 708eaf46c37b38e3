// Session- and authorization-aware data-access layer for the internal
// resource-access portal. Presentation, routing and styling live elsewhere
// and consume this crate's observable state.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod session;
pub mod view;

pub use api::{
    AccessLevel, AccessSummary, ApiClient, BackendHealth, Resource, ResourceBatch, UserProfile,
};
pub use auth::{
    CredentialProvider, FederatedFlow, FederatedStatus, IdToken, Identity,
    MemoryCredentialProvider, ProviderEvent, ProviderSession, RestIdentityProvider,
};
pub use config::{IdentityConfig, PortalConfig};
pub use error::{PortalError, PortalResult};
pub use session::{Session, SessionStatus, SessionStore};
pub use view::{build_view, Dashboard, DashboardState, IamRoleSet, ViewModel};

#[cfg(test)]
mod tests;
