//! HTTP gateway to the Feather API
//!
//! Implements the collaborator traits the verification engine depends on:
//!
//! | capability | route |
//! |------------|-------|
//! | [`PublicKeyEndpoint`] ([`KeySource`]) | `GET /publicKeys/{id}` |
//! | [`JwksEndpoint`] ([`KeySource`]) | `GET /.well-known/jwks/{id}.json` |
//! | [`Gateway`] ([`SessionAuthority`]) | `POST /sessions/{id}/validate` |
//! | [`Gateway`] ([`AudienceSource`]) | `GET /.well-known/aud` |
//!
//! Every request authenticates with HTTP Basic auth using the API key as the
//! user name and an empty password. Requests are never retried.

use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::authority::{AudienceSource, KeySource, SessionAuthority};
use crate::config::FeatherConfig;
use crate::error::{FeatherError, Result};
use crate::jwt::KeyMaterial;
use crate::session::Session;

/// Characters escaped in caller-supplied path segments.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encode `segment` for use as a single path segment.
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Deserialize)]
struct PublicKeyResponse {
    pem: String,
}

#[derive(Deserialize)]
struct AudienceResponse {
    aud: String,
}

/// Authenticated JSON client for the Feather API.
pub struct Gateway {
    http_client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("http_client", &"<reqwest::Client>")
            .finish()
    }
}

impl Gateway {
    /// Create a gateway for the API described by `config`.
    ///
    /// # Errors
    ///
    /// - [`FeatherError::ParameterInvalid`] if `config` is invalid
    /// - [`FeatherError::ApiConnection`] if the HTTP client cannot be built
    pub fn new(api_key: SecretString, config: &FeatherConfig) -> Result<Self> {
        config.validate()?;
        let base_url = config.base_url()?.as_str().trim_end_matches('/').to_string();

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| FeatherError::ApiConnection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
        })
    }

    /// Base URL every route is appended to, e.g. `https://api.feather.id/v1`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base}{path}` and parse the JSON response.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.http_client.get(self.url(path));
        self.send("GET", path, request).await
    }

    /// `POST {base}{path}` with a form-encoded body and parse the JSON response.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn post<T: DeserializeOwned>(&self, path: &str, form: &[(&str, &str)]) -> Result<T> {
        let request = self.http_client.post(self.url(path)).form(form);
        self.send("POST", path, request).await
    }

    /// Authenticate, send and map the response.
    ///
    /// # Errors
    ///
    /// - [`FeatherError::ApiConnection`] if the request could not be completed
    /// - [`FeatherError::ApiAuthentication`] on 401 or 403
    /// - [`FeatherError::Api`] on any other non-success status or an unparseable body
    async fn send<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        request: RequestBuilder,
    ) -> Result<T> {
        debug!(method, path, "Sending Feather API request");

        let response = request
            .basic_auth(self.api_key.expose_secret(), None::<&str>)
            .send()
            .await
            .map_err(|e| FeatherError::ApiConnection(e.to_string()))?;

        let status = response.status();
        debug!(method, path, status = status.as_u16(), "Feather API responded");

        match status {
            StatusCode::OK | StatusCode::CREATED => {
                response.json::<T>().await.map_err(|e| FeatherError::Api {
                    status: Some(status.as_u16()),
                    message: format!("failed to parse response body: {e}"),
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                FeatherError::ApiAuthentication(error_message(status, response).await),
            ),
            _ => Err(FeatherError::Api {
                status: Some(status.as_u16()),
                message: error_message(status, response).await,
            }),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// The `message` of a Feather error body, falling back to the raw body or status.
async fn error_message(status: StatusCode, response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    if let Ok(ApiErrorBody {
        message: Some(message),
    }) = serde_json::from_str(&body)
    {
        return message;
    }
    if body.trim().is_empty() {
        status.to_string()
    } else {
        body
    }
}

#[async_trait]
impl SessionAuthority for Gateway {
    async fn validate_session(&self, session_id: &str, token: &str) -> Result<Session> {
        let path = format!("/sessions/{}/validate", encode_segment(session_id));
        self.post(&path, &[("session_token", token)]).await
    }
}

#[async_trait]
impl AudienceSource for Gateway {
    async fn fetch_audience(&self) -> Result<String> {
        let response: AudienceResponse = self.get("/.well-known/aud").await?;
        Ok(response.aud)
    }
}

/// Session-token keys, published as PEM.
#[derive(Debug, Clone)]
pub struct PublicKeyEndpoint {
    gateway: Arc<Gateway>,
}

impl PublicKeyEndpoint {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl KeySource for PublicKeyEndpoint {
    async fn fetch_key(&self, key_id: &str) -> Result<KeyMaterial> {
        let path = format!("/publicKeys/{}", encode_segment(key_id));
        let response: PublicKeyResponse = self.gateway.get(&path).await?;
        Ok(KeyMaterial::pem(key_id, response.pem))
    }
}

/// ID-token keys, published as JWKs.
#[derive(Debug, Clone)]
pub struct JwksEndpoint {
    gateway: Arc<Gateway>,
}

impl JwksEndpoint {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl KeySource for JwksEndpoint {
    async fn fetch_key(&self, key_id: &str) -> Result<KeyMaterial> {
        let path = format!("/.well-known/jwks/{}.json", encode_segment(key_id));
        let jwk: serde_json::Value = self.gateway.get(&path).await?;
        Ok(KeyMaterial::jwk(key_id, jwk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;

    #[test]
    fn test_encode_segment_keeps_ids_readable() {
        assert_eq!(
            encode_segment("SES_10836cb6-994d-40f6-950c-3617be17b7c3"),
            "SES_10836cb6-994d-40f6-950c-3617be17b7c3"
        );
        assert_eq!(encode_segment("../admin"), "..%2Fadmin");
        assert_eq!(encode_segment("a b?c#d"), "a%20b%3Fc%23d");
    }

    #[test]
    fn test_base_url_from_config() {
        let config = FeatherConfig {
            host: "localhost".to_string(),
            port: 8080,
            protocol: Protocol::Http,
            ..Default::default()
        };
        let gateway = Gateway::new(SecretString::new("sk_test".to_string()), &config).unwrap();
        assert_eq!(gateway.base_url(), "http://localhost:8080/v1");
        assert_eq!(gateway.url("/.well-known/aud"), "http://localhost:8080/v1/.well-known/aud");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let gateway =
            Gateway::new(SecretString::new("sk_live_secret".to_string()), &FeatherConfig::default())
                .unwrap();
        let debug = format!("{gateway:?}");
        assert!(!debug.contains("sk_live_secret"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = FeatherConfig {
            host: String::new(),
            ..Default::default()
        };
        let err = Gateway::new(SecretString::new("sk_test".to_string()), &config).unwrap_err();
        assert!(matches!(err, FeatherError::ParameterInvalid(_)));
    }
}
