use crate::config::{IdentityConfig, PortalConfig};
use crate::error::PortalError;

fn valid_config() -> PortalConfig {
    PortalConfig {
        api_url: "http://localhost:8080".to_string(),
        identity: IdentityConfig {
            endpoint: "https://idp.example.com".to_string(),
            api_key: "test-key".to_string(),
            project: "portal-dev".to_string(),
        },
    }
}

#[test]
fn test_valid_config_passes_validation() {
    valid_config().validate().unwrap();
}

#[test]
fn test_malformed_api_url_is_fatal() {
    let mut config = valid_config();
    config.api_url = "localhost:8080".to_string();
    let err = config.validate().unwrap_err();
    assert!(matches!(err, PortalError::Configuration { .. }));
}

#[test]
fn test_empty_api_key_is_fatal() {
    let mut config = valid_config();
    config.identity.api_key = "  ".to_string();
    let err = config.validate().unwrap_err();
    assert!(matches!(err, PortalError::Configuration { .. }));
}

#[test]
fn test_empty_project_is_fatal() {
    let mut config = valid_config();
    config.identity.project = String::new();
    assert!(config.validate().is_err());
}

// Environment-variable scenarios run in one test because they mutate
// process-wide state.
#[test]
fn test_from_env_scenarios() {
    let clear = || {
        for name in [
            "PORTAL_API_URL",
            "PORTAL_IDP_URL",
            "PORTAL_IDP_API_KEY",
            "PORTAL_IDP_PROJECT",
        ] {
            std::env::remove_var(name);
        }
    };

    // Missing identity configuration fails fast
    clear();
    let err = PortalConfig::from_env().unwrap_err();
    assert!(matches!(err, PortalError::Configuration { .. }));

    // Full configuration loads; unset API URL falls back to the
    // development default
    clear();
    std::env::set_var("PORTAL_IDP_URL", "https://idp.example.com");
    std::env::set_var("PORTAL_IDP_API_KEY", "test-key");
    std::env::set_var("PORTAL_IDP_PROJECT", "portal-dev");
    let config = PortalConfig::from_env().unwrap();
    assert_eq!(config.api_url, "http://localhost:8080");
    assert_eq!(config.identity.project, "portal-dev");

    // A malformed identity endpoint is rejected at load time
    std::env::set_var("PORTAL_IDP_URL", "not-a-url");
    let err = PortalConfig::from_env().unwrap_err();
    assert!(matches!(err, PortalError::Configuration { .. }));

    clear();
}
