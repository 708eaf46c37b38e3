//! Unit tests for the portal client core
//!
//! Covers the session state machine, the authorized API client's response
//! classification, and the view builder/dashboard coordination.

pub mod config_test;

use std::sync::Arc;

use crate::auth::MemoryCredentialProvider;
use crate::session::SessionStore;

/// A session store over a memory provider with one known account
pub async fn store_with_account(
    email: &str,
    password: &str,
) -> (Arc<MemoryCredentialProvider>, Arc<SessionStore>) {
    let provider = Arc::new(MemoryCredentialProvider::new());
    provider.add_account(email, password).await;
    let session = SessionStore::new(provider.clone() as Arc<dyn crate::auth::CredentialProvider>);
    (provider, session)
}
