//! Shared fixtures for integration tests
//!
//! Tokens are signed with the fixture RSA keys under `tests/fixtures/`.
//! Collaborator doubles count their calls so tests can assert on network use.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use feather_auth::{
    AudienceSource, FeatherConfig, FeatherError, KeyMaterial, KeySource, Protocol, Result,
    Session, SessionAuthority, SessionStatus, SessionType,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

pub const PRIVATE_PEM: &str = include_str!("../fixtures/signing_private.pem");
pub const PUBLIC_PEM: &str = include_str!("../fixtures/signing_public.pem");
pub const OTHER_PRIVATE_PEM: &str = include_str!("../fixtures/other_private.pem");
pub const PUBLIC_JWK: &str = include_str!("../fixtures/signing_jwk.json");

pub const KEY_ID: &str = "KEY_test";
pub const USER_ID: &str = "USR_a6875b34-46ea-429d-858c-3aa6a343b534";
pub const PROJECT_ID: &str = "PRJ_cdbcc986-ae66-4666-b946-1826cf0b2b57";
pub const SESSION_ID: &str = "SES_10836cb6-994d-40f6-950c-3617be17b7c3";

/// Fixed "current time" for deterministic tests.
pub const NOW: i64 = 1_589_377_400;

/// Claims of a valid session token issued 6 seconds before [`NOW`].
pub fn session_claims() -> Value {
    json!({
        "jti": "UCszrnqSxhs6Ffx50tZzdupNjlZf",
        "iss": "feather.id",
        "sub": USER_ID,
        "aud": PROJECT_ID,
        "ses": SESSION_ID,
        "typ": "authenticated",
        "iat": NOW - 6,
        "cat": NOW - 6,
        "exp": NOW + 594,
    })
}

/// Claims of a valid ID token issued 6 seconds before [`NOW`].
pub fn id_claims() -> Value {
    json!({
        "iss": "feather",
        "sub": USER_ID,
        "aud": PROJECT_ID,
        "iat": NOW - 6,
        "exp": NOW + 3594,
    })
}

/// `claims` with `name` set to `value`.
pub fn with_claim(mut claims: Value, name: &str, value: Value) -> Value {
    claims[name] = value;
    claims
}

/// Sign `claims` with the fixture key under [`KEY_ID`].
pub fn sign(claims: &Value) -> String {
    sign_with(claims, PRIVATE_PEM, Some(KEY_ID))
}

pub fn sign_with(claims: &Value, private_pem: &str, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

/// A token with an arbitrary header and a meaningless signature.
pub fn forge(header: &Value, claims: &Value) -> String {
    let encode = |value: &Value| URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap());
    format!("{}.{}.c2lnbmF0dXJl", encode(header), encode(claims))
}

/// Replace the payload of a signed token, keeping its signature.
pub fn tamper(token: &str, claims: &Value) -> String {
    let segments: Vec<&str> = token.split('.').collect();
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
    format!("{}.{}.{}", segments[0], payload, segments[2])
}

pub fn public_jwk() -> Value {
    serde_json::from_str(PUBLIC_JWK).unwrap()
}

/// Serves the fixture key for [`KEY_ID`] and 404s for anything else.
pub struct StaticKeys {
    jwk: bool,
    fetches: AtomicUsize,
}

impl StaticKeys {
    pub fn pem() -> Self {
        Self {
            jwk: false,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn jwk() -> Self {
        Self {
            jwk: true,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for StaticKeys {
    async fn fetch_key(&self, key_id: &str) -> Result<KeyMaterial> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if key_id != KEY_ID {
            return Err(FeatherError::Api {
                status: Some(404),
                message: "Public key not found".to_string(),
            });
        }
        if self.jwk {
            Ok(KeyMaterial::jwk(key_id, public_jwk()))
        } else {
            Ok(KeyMaterial::pem(key_id, PUBLIC_PEM))
        }
    }
}

/// Records reconciliation calls and answers with a fixed result.
pub struct RecordingAuthority {
    response: Result<Session>,
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingAuthority {
    pub fn answering(response: Result<Session>) -> Self {
        Self {
            response,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionAuthority for RecordingAuthority {
    async fn validate_session(&self, session_id: &str, token: &str) -> Result<Session> {
        self.calls
            .lock()
            .unwrap()
            .push((session_id.to_string(), token.to_string()));
        self.response.clone()
    }
}

/// Answers with a fixed audience.
pub struct FixedAudience {
    audience: String,
    fetches: AtomicUsize,
}

impl FixedAudience {
    pub fn new(audience: &str) -> Self {
        Self {
            audience: audience.to_string(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudienceSource for FixedAudience {
    async fn fetch_audience(&self) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.audience.clone())
    }
}

/// The session an authority reports after revoking [`SESSION_ID`].
pub fn revoked_session() -> Session {
    Session {
        id: SESSION_ID.to_string(),
        object: "session".to_string(),
        session_type: Some(SessionType::Authenticated),
        status: SessionStatus::Revoked,
        token: None,
        user_id: Some(USER_ID.to_string()),
        created_at: chrono::DateTime::from_timestamp(NOW - 6, 0),
        revoked_at: chrono::DateTime::from_timestamp(NOW + 600, 0),
        extra: Default::default(),
    }
}

/// Config pointing at a local mock server.
pub fn local_config(address: &std::net::SocketAddr) -> FeatherConfig {
    FeatherConfig {
        host: address.ip().to_string(),
        port: address.port(),
        protocol: Protocol::Http,
        request_timeout_secs: 5,
    }
}
