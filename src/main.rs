use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use portal_client::{
    ApiClient, Dashboard, DashboardState, PortalConfig, RestIdentityProvider, SessionStore,
};

/// Smoke client: load config, probe the backend, sign in from the
/// environment and print one dashboard refresh.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration problems are fatal before any network call
    let config = match PortalConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Invalid configuration, refusing to start");
            return Err(err.into());
        }
    };

    let provider = Arc::new(RestIdentityProvider::new(config.identity.clone()));
    let session = SessionStore::new(provider);
    let api = Arc::new(ApiClient::new(config.api_url.clone(), Arc::clone(&session)));

    match api.health().await {
        Ok(health) if health.is_ok() => info!(status = %health.status, "Backend connected"),
        Ok(health) => warn!(status = %health.status, "Backend reachable but not healthy"),
        Err(err) => warn!(error = %err, "Backend unreachable"),
    }

    let email = std::env::var("PORTAL_EMAIL").ok();
    let password = std::env::var("PORTAL_PASSWORD").ok();
    let (email, password) = match (email, password) {
        (Some(email), Some(password)) => (email, password),
        _ => {
            info!("PORTAL_EMAIL/PORTAL_PASSWORD not set, stopping after health probe");
            return Ok(());
        }
    };

    let identity = session.login(&email, &password).await?;
    info!(email = %identity.email, "Signed in");

    let dashboard = Dashboard::new(Arc::clone(&session), api);
    dashboard.refresh().await;

    match dashboard.state() {
        DashboardState::Ready(view) => {
            if let Some(profile) = &view.profile {
                info!(
                    email = %profile.email,
                    environment = %profile.environment,
                    roles = ?profile.roles,
                    "Profile"
                );
            }
            if let Some(summary) = &view.summary {
                info!(
                    access_level = %summary.access_level,
                    total = summary.total_resources,
                    sensitive = summary.has_sensitive_access,
                    "Access summary"
                );
            }
            if view.is_empty() {
                info!("No resources available for your access level");
            }
            for resource in &view.resources {
                info!(
                    id = %resource.id,
                    name = %resource.name,
                    access_level = ?resource.access_level,
                    sensitive = resource.sensitive,
                    "Resource"
                );
            }
            for role in &view.iam_roles {
                info!(role = %role, "IAM role");
            }
        }
        DashboardState::Unauthorized => warn!("Backend rejected the session"),
        DashboardState::TransportFailed(message) => warn!(message = %message, "Fetch failed"),
        other => info!(state = ?other, "Dashboard not ready"),
    }

    session.logout().await;
    Ok(())
}
