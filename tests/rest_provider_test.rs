//! Integration tests for the REST identity-provider adapter against a
//! local mock identity service.

use std::sync::Arc;

use mockito::Matcher;
use serde_json::json;

use portal_client::{
    CredentialProvider, IdToken, IdentityConfig, PortalError, RestIdentityProvider, SessionStatus,
    SessionStore,
};

fn provider_for(server: &mockito::ServerGuard) -> RestIdentityProvider {
    RestIdentityProvider::new(IdentityConfig {
        endpoint: server.url(),
        api_key: "test-key".to_string(),
        project: "portal-dev".to_string(),
    })
}

#[tokio::test]
async fn test_password_sign_in_round_trip() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/accounts:signInWithPassword")
        .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
        .match_body(Matcher::PartialJson(json!({
            "email": "user@example.com",
            "password": "validpw",
            "returnSecureToken": true,
        })))
        .with_status(200)
        .with_body(
            json!({
                "idToken": "id-token-1",
                "refreshToken": "refresh-1",
                "expiresIn": "3600",
                "localId": "uid-1",
                "email": "user@example.com",
            })
            .to_string(),
        )
        .create_async()
        .await;

    let provider = provider_for(&server);
    let session = provider.sign_in("user@example.com", "validpw").await.unwrap();

    assert_eq!(session.identity.uid, "uid-1");
    assert_eq!(session.identity.email, "user@example.com");
    assert_eq!(session.token.access_token, "id-token-1");
    assert_eq!(session.token.refresh_token.as_deref(), Some("refresh-1"));
    assert!(!session.token.is_expired());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_sign_in_surfaces_provider_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/accounts:signInWithPassword")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(json!({"error": {"message": "INVALID_PASSWORD"}}).to_string())
        .create_async()
        .await;

    let provider = provider_for(&server);
    let err = provider
        .sign_in("user@example.com", "wrong")
        .await
        .unwrap_err();

    match err {
        PortalError::Authentication { reason } => assert_eq!(reason, "INVALID_PASSWORD"),
        other => panic!("expected Authentication, got {:?}", other),
    }
}

#[tokio::test]
async fn test_refresh_exchanges_the_refresh_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/token")
        .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
        .match_body(Matcher::PartialJson(json!({
            "grant_type": "refresh_token",
            "refresh_token": "refresh-1",
        })))
        .with_status(200)
        .with_body(
            json!({
                "id_token": "id-token-2",
                "refresh_token": "refresh-2",
                "expires_in": "3600",
            })
            .to_string(),
        )
        .create_async()
        .await;

    let provider = provider_for(&server);
    let stale = IdToken::new("id-token-1".to_string(), Some("refresh-1".to_string()));
    let fresh = provider.refresh(&stale).await.unwrap();

    assert_eq!(fresh.access_token, "id-token-2");
    assert_eq!(fresh.refresh_token.as_deref(), Some("refresh-2"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_failed_refresh_is_session_expired() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/token")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(json!({"error": {"message": "TOKEN_EXPIRED"}}).to_string())
        .create_async()
        .await;

    let provider = provider_for(&server);
    let stale = IdToken::new("id-token-1".to_string(), Some("refresh-1".to_string()));
    let err = provider.refresh(&stale).await.unwrap_err();

    assert!(matches!(err, PortalError::SessionExpired { .. }));
}

#[tokio::test]
async fn test_federated_denial_maps_to_user_cancelled() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/device:begin")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "flowId": "flow-1",
                "verificationUri": "https://idp.example.com/device",
                "userCode": "ABCD-1234",
                "expiresIn": 300,
                "interval": 0,
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("POST", "/v1/device:poll")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({"status": "denied"}).to_string())
        .create_async()
        .await;

    let provider = Arc::new(provider_for(&server));
    let session = SessionStore::new(provider);
    let err = session.login_federated().await.unwrap_err();

    assert!(matches!(err, PortalError::UserCancelled));
    assert_eq!(session.current().status, SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn test_federated_completion_authenticates_the_session() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/device:begin")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "flowId": "flow-2",
                "verificationUri": "https://idp.example.com/device",
                "userCode": "ABCD-1234",
                "expiresIn": 300,
                "interval": 0,
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("POST", "/v1/device:poll")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "status": "complete",
                "idToken": "id-token-9",
                "refreshToken": "refresh-9",
                "expiresIn": "3600",
                "localId": "uid-9",
                "email": "fed@example.com",
            })
            .to_string(),
        )
        .create_async()
        .await;

    let provider = Arc::new(provider_for(&server));
    let session = SessionStore::new(provider);
    let identity = session.login_federated().await.unwrap();

    assert_eq!(identity.email, "fed@example.com");
    assert_eq!(session.current().status, SessionStatus::Authenticated);
    assert_eq!(session.current().token.as_deref(), Some("id-token-9"));
}

#[tokio::test]
async fn test_logout_survives_failed_revocation() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/accounts:signInWithPassword")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "idToken": "id-token-1",
                "refreshToken": "refresh-1",
                "expiresIn": "3600",
                "localId": "uid-1",
                "email": "user@example.com",
            })
            .to_string(),
        )
        .create_async()
        .await;
    // Revocation endpoint is down
    server
        .mock("POST", "/v1/accounts:revoke")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body(json!({"error": {"message": "UNAVAILABLE"}}).to_string())
        .create_async()
        .await;

    let provider = Arc::new(provider_for(&server));
    let session = SessionStore::new(provider);
    session.login("user@example.com", "validpw").await.unwrap();

    session.logout().await;
    assert_eq!(session.current().status, SessionStatus::Unauthenticated);
}
