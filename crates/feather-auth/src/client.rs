//! Ready-wired verifiers for the live Feather API.

use std::sync::Arc;

use secrecy::SecretString;

use crate::config::FeatherConfig;
use crate::error::{FeatherError, Result};
use crate::gateway::{Gateway, JwksEndpoint, PublicKeyEndpoint};
use crate::identity::{AudienceCache, IdTokenVerifier};
use crate::jwt::{ClaimPolicy, KeyCache};
use crate::session::SessionTokenVerifier;

/// Entry point: one gateway shared by a session-token and an ID-token verifier.
///
/// Each verifier has its own key cache, since the two token kinds are signed
/// with keys published under different routes.
///
/// ```no_run
/// use feather_auth::{FeatherClient, FeatherConfig};
///
/// # async fn example() -> feather_auth::Result<()> {
/// let client = FeatherClient::new("sk_live_...", FeatherConfig::default())?;
/// let verdict = client.sessions().validate("eyJhbGciOiJSUzI1NiIs...").await?;
/// println!("session {} is {}", verdict.session_id(), verdict.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FeatherClient {
    gateway: Arc<Gateway>,
    sessions: SessionTokenVerifier,
    id_tokens: IdTokenVerifier,
}

impl FeatherClient {
    /// Connect with `api_key` using `config` and the default claim policies.
    ///
    /// # Errors
    ///
    /// - [`FeatherError::ParameterMissing`] if `api_key` is empty
    /// - [`FeatherError::ParameterInvalid`] if `config` is invalid
    pub fn new(api_key: impl Into<String>, config: FeatherConfig) -> Result<Self> {
        Self::with_policies(
            api_key,
            config,
            ClaimPolicy::default(),
            ClaimPolicy::identity(),
        )
    }

    /// Like [`new`](Self::new), with explicit policies for session tokens
    /// and ID tokens.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_policies(
        api_key: impl Into<String>,
        config: FeatherConfig,
        session_policy: ClaimPolicy,
        identity_policy: ClaimPolicy,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(FeatherError::ParameterMissing(
                "required param not provided: 'api_key'".to_string(),
            ));
        }

        let gateway = Arc::new(Gateway::new(SecretString::new(api_key), &config)?);

        let sessions = SessionTokenVerifier::new(
            KeyCache::new(Arc::new(PublicKeyEndpoint::new(Arc::clone(&gateway)))),
            gateway.clone(),
        )
        .with_policy(session_policy);
        let id_tokens = IdTokenVerifier::new(
            KeyCache::new(Arc::new(JwksEndpoint::new(Arc::clone(&gateway)))),
            AudienceCache::new(gateway.clone()),
        )
        .with_policy(identity_policy);

        Ok(Self {
            gateway,
            sessions,
            id_tokens,
        })
    }

    /// Session-token verifier.
    pub fn sessions(&self) -> &SessionTokenVerifier {
        &self.sessions
    }

    /// ID-token verifier.
    pub fn id_tokens(&self) -> &IdTokenVerifier {
        &self.id_tokens
    }

    /// The underlying gateway.
    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }
}
