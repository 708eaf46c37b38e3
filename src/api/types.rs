use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Backend-assigned sensitivity tier of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessLevel {
    #[serde(alias = "General Access")]
    General,
    #[serde(alias = "Editor Access")]
    Editor,
    #[serde(alias = "Highly Sensitive")]
    HighlySensitive,
}

/// A backend resource visible to the current user.
///
/// Immutable snapshot; the list is replaced wholesale on each refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub access_level: AccessLevel,
    /// Wire name kept for the backend's benefit
    #[serde(rename = "sensitive_data")]
    pub sensitive: bool,
}

/// Server-derived summary of the user's effective access.
///
/// Fetched separately from the resource list and only eventually consistent
/// with it; the client never re-derives one from the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessSummary {
    pub access_level: String,
    pub total_resources: u64,
    pub has_sensitive_access: bool,
}

/// Canonical profile of the signed-in user, as the backend sees them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub email: String,
    pub environment: String,
    pub roles: BTreeSet<String>,
}

/// The `/api/user` payload as it appears on the wire. Both the flat shape
/// and the nested `{user: {...}}` shape have been observed; normalization
/// happens here, once, instead of branching downstream.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawUserProfile {
    Nested { user: FlatUserProfile },
    Flat(FlatUserProfile),
}

#[derive(Debug, Deserialize)]
pub(crate) struct FlatUserProfile {
    email: String,
    environment: String,
    #[serde(default)]
    roles: Vec<String>,
}

impl From<RawUserProfile> for UserProfile {
    fn from(raw: RawUserProfile) -> Self {
        let flat = match raw {
            RawUserProfile::Nested { user } => user,
            RawUserProfile::Flat(user) => user,
        };
        Self {
            email: flat.email,
            environment: flat.environment,
            roles: flat.roles.into_iter().collect(),
        }
    }
}

/// The `/api/resources` payload. `access_summary` is absent on older
/// backend versions and must be tolerated.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceBatch {
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub access_summary: Option<AccessSummary>,
}

/// The `/api/iam-roles` payload
#[derive(Debug, Deserialize)]
pub(crate) struct IamRolesPayload {
    #[serde(default)]
    pub gcp_iam_roles: Vec<String>,
}

/// The `/health` payload, used only for a connectivity indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendHealth {
    pub status: String,
    #[serde(default)]
    pub environment: Option<String>,
}

impl BackendHealth {
    /// Whether the backend reports itself usable
    pub fn is_ok(&self) -> bool {
        matches!(self.status.as_str(), "ok" | "healthy")
    }
}
