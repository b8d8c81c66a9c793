//! End-to-end verification through `FeatherClient` against a mock Feather API

mod common;

use common::*;
use feather_auth::{FeatherClient, FeatherError, SessionStatus, SessionVerdict};
use serde_json::json;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// `Basic base64("sk_test:")`
const AUTHORIZATION: &str = "Basic c2tfdGVzdDo=";

fn client_for(server: &MockServer) -> FeatherClient {
    FeatherClient::new("sk_test", local_config(server.address())).unwrap()
}

async fn mount_public_key(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/publicKeys/{KEY_ID}")))
        .and(header("authorization", AUTHORIZATION))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": KEY_ID,
            "object": "publicKey",
            "pem": PUBLIC_PEM,
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_active_session_fetches_key_once_and_never_validates() {
    let server = MockServer::start().await;
    mount_public_key(&server, 1).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let token = sign(&session_claims());

    for _ in 0..2 {
        let verdict = client.sessions().validate_at(&token, NOW).await.unwrap();
        assert!(matches!(verdict, SessionVerdict::Active(_)));
    }
}

#[tokio::test]
async fn test_stale_session_posts_token_to_validate() {
    let server = MockServer::start().await;
    mount_public_key(&server, 1).await;

    let token = sign(&session_claims());
    Mock::given(method("POST"))
        .and(path(format!("/v1/sessions/{SESSION_ID}/validate")))
        .and(header("authorization", AUTHORIZATION))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string(format!("session_token={token}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": SESSION_ID,
            "object": "session",
            "type": "authenticated",
            "status": "revoked",
            "token": null,
            "user_id": USER_ID,
            "created_at": "2020-05-13T13:43:14Z",
            "revoked_at": "2020-05-13T14:00:00Z",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let verdict = client.sessions().validate_at(&token, NOW + 3600).await.unwrap();

    let SessionVerdict::Reconciled(session) = verdict else {
        panic!("expected a reconciled session");
    };
    assert_eq!(session.id, SESSION_ID);
    assert_eq!(session.status, SessionStatus::Revoked);
    assert_eq!(session.user_id.as_deref(), Some(USER_ID));
    assert!(session.revoked_at.is_some());
}

#[tokio::test]
async fn test_id_token_uses_jwks_and_audience_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/.well-known/jwks/{KEY_ID}.json")))
        .and(header("authorization", AUTHORIZATION))
        .respond_with(ResponseTemplate::new(200).set_body_json(public_jwk()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/.well-known/aud"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"aud": PROJECT_ID})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let token = sign(&id_claims());

    for _ in 0..2 {
        let user = client.id_tokens().verify_at(&token, NOW).await.unwrap();
        assert_eq!(user.id, USER_ID);
    }
}

#[tokio::test]
async fn test_rejected_api_key_maps_to_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid API key"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .sessions()
        .validate_at(&sign(&session_claims()), NOW)
        .await
        .unwrap_err();

    assert_eq!(err, FeatherError::ApiAuthentication("Invalid API key".to_string()));
    assert_eq!(err.error_type().as_str(), "api_authentication_error");
}

#[tokio::test]
async fn test_api_errors_keep_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/publicKeys/{KEY_ID}")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "object": "error",
            "type": "api_error",
            "message": "Public key not found",
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .sessions()
        .validate_at(&sign(&session_claims()), NOW)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        FeatherError::Api {
            status: Some(404),
            message: "Public key not found".to_string(),
        }
    );
}

#[tokio::test]
async fn test_unparseable_success_body_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/.well-known/aud"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/.well-known/jwks/{KEY_ID}.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(public_jwk()))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .id_tokens()
        .verify_at(&sign(&id_claims()), NOW)
        .await
        .unwrap_err();

    assert!(matches!(err, FeatherError::Api { status: Some(200), .. }));
}

#[tokio::test]
async fn test_unreachable_api_is_a_connection_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let client = FeatherClient::new("sk_test", local_config(&address)).unwrap();
    let err = client
        .sessions()
        .validate_at(&sign(&session_claims()), NOW)
        .await
        .unwrap_err();

    assert!(matches!(err, FeatherError::ApiConnection(_)));
}
