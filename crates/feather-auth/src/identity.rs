//! ID-token verification
//!
//! ID tokens are checked like session tokens, with two differences: the
//! audience must equal this deployment's own project id, and expiry is
//! terminal. An expired ID token fails with
//! [`FeatherError::TokenExpired`] and the authority is never consulted.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::authority::AudienceSource;
use crate::error::{FeatherError, Result};
use crate::jwt::{self, ClaimPolicy, KeyCache};

pub(crate) const TOKEN_EXPIRED: &str = "The ID token is expired";

/// Caches the deployment audience after the first successful fetch.
///
/// ```rust
/// # use std::sync::Arc;
/// # use async_trait::async_trait;
/// use feather_auth::{AudienceCache, AudienceSource, Result};
///
/// struct Fixed;
///
/// #[async_trait]
/// impl AudienceSource for Fixed {
///     async fn fetch_audience(&self) -> Result<String> {
///         Ok("PRJ_cdbcc986-ae66-4666-b946-1826cf0b2b57".to_string())
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let cache = AudienceCache::new(Arc::new(Fixed));
/// assert_eq!(cache.get().await?, "PRJ_cdbcc986-ae66-4666-b946-1826cf0b2b57");
/// # Ok::<(), feather_auth::FeatherError>(())
/// # }).unwrap();
/// ```
pub struct AudienceCache {
    source: Arc<dyn AudienceSource>,
    audience: OnceCell<String>,
}

impl std::fmt::Debug for AudienceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudienceCache")
            .field("audience", &self.audience.get())
            .finish_non_exhaustive()
    }
}

impl AudienceCache {
    /// Create an empty cache.
    pub fn new(source: Arc<dyn AudienceSource>) -> Self {
        Self {
            source,
            audience: OnceCell::new(),
        }
    }

    /// The audience, fetching it on first use. Failures are not cached.
    ///
    /// # Errors
    ///
    /// Any error from the [`AudienceSource`], unchanged.
    pub async fn get(&self) -> Result<&str> {
        self.audience
            .get_or_try_init(|| async {
                info!("Fetching deployment audience");
                self.source.fetch_audience().await
            })
            .await
            .map(String::as_str)
    }
}

/// The user an ID token was issued to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedUser {
    /// User id (`sub`).
    pub id: String,
    /// Always `user`.
    pub object: String,
    /// Project the token was issued for (`aud`).
    pub project_id: String,
    /// `iat`, Unix seconds.
    pub issued_at: i64,
    /// `exp`, Unix seconds.
    pub expires_at: i64,
}

/// Verifies ID tokens.
pub struct IdTokenVerifier {
    keys: KeyCache,
    audience: AudienceCache,
    policy: ClaimPolicy,
}

impl std::fmt::Debug for IdTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdTokenVerifier")
            .field("keys", &self.keys)
            .field("audience", &self.audience)
            .field("policy", &self.policy)
            .finish()
    }
}

impl IdTokenVerifier {
    /// Create a verifier with [`ClaimPolicy::identity`].
    pub fn new(keys: KeyCache, audience: AudienceCache) -> Self {
        Self {
            keys,
            audience,
            policy: ClaimPolicy::identity(),
        }
    }

    /// Replace the claim policy.
    pub fn with_policy(mut self, policy: ClaimPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The claim policy in use.
    pub fn policy(&self) -> &ClaimPolicy {
        &self.policy
    }

    /// The key cache used for signature checks.
    pub fn keys(&self) -> &KeyCache {
        &self.keys
    }

    /// Verify `token` against the current time.
    ///
    /// # Errors
    ///
    /// - [`FeatherError::ParameterMissing`] for an empty token
    /// - [`FeatherError::TokenInvalid`] when any check fails
    /// - [`FeatherError::TokenExpired`] when the token is past `exp`
    /// - key and audience fetch errors, unchanged
    pub async fn verify(&self, token: &str) -> Result<VerifiedUser> {
        self.verify_at(token, jwt::unix_now()).await
    }

    /// Verify `token` as if the current Unix time were `now`.
    ///
    /// # Errors
    ///
    /// See [`verify`](Self::verify).
    pub async fn verify_at(&self, token: &str, now: i64) -> Result<VerifiedUser> {
        let decoded = jwt::decode(token)?;
        let key_id = jwt::check_header(&decoded.header)?;
        let (key, audience) = tokio::try_join!(self.keys.resolve(key_id), self.audience.get())?;
        jwt::verify_signature(token, &key)?;

        let claims = self.policy.validate_identity(&decoded.payload, audience, now)?;
        if now > claims.expires_at {
            debug!(user_id = %claims.user_id, expired_at = claims.expires_at, "ID token expired");
            return Err(FeatherError::token_expired(TOKEN_EXPIRED));
        }

        Ok(VerifiedUser {
            id: claims.user_id,
            object: "user".to_string(),
            project_id: claims.project_id,
            issued_at: claims.issued_at,
            expires_at: claims.expires_at,
        })
    }
}
