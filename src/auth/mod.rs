pub mod memory;
pub mod provider;
pub mod rest;
pub mod token;

pub use memory::{FederatedOutcome, MemoryCredentialProvider};
pub use provider::{
    CredentialProvider, FederatedFlow, FederatedStatus, Identity, ProviderEvent, ProviderSession,
};
pub use rest::RestIdentityProvider;
pub use token::IdToken;
