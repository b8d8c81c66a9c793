//! Session-token verification with stale-session reconciliation
//!
//! A session token is verified entirely offline while it is fresh. Once it is
//! past `exp` the local result can no longer tell whether the session was
//! revoked, so exactly one call is made to the [`SessionAuthority`] and its
//! answer replaces the local one.
//!
//! ```text
//! decode -> check alg/kid -> resolve key -> verify signature -> claims -> status
//!                                                                          |
//!                                            Active: done <----------------+
//!                                            Stale:  POST /sessions/{id}/validate
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::authority::SessionAuthority;
use crate::error::Result;
use crate::jwt::{self, ClaimPolicy, KeyCache, SessionClaims, SessionType};

/// Lifecycle status of a session.
///
/// Serialized as its wire name. Statuses this crate does not model are kept
/// verbatim in [`SessionStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// The token is within its lifetime.
    Active,
    /// The token is past `exp`; only the authority knows the real state.
    Stale,
    /// The authority revoked the session.
    Revoked,
    /// Any other status reported by the authority.
    Other(String),
}

impl SessionStatus {
    /// Status of a token expiring at `expires_at`, observed at `now`.
    ///
    /// A token is still active in the second it expires.
    pub fn derive(expires_at: i64, now: i64) -> Self {
        if now <= expires_at {
            Self::Active
        } else {
            Self::Stale
        }
    }

    /// Wire name of this status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Stale => "stale",
            Self::Revoked => "revoked",
            Self::Other(status) => status,
        }
    }
}

impl From<String> for SessionStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "active" => Self::Active,
            "stale" => Self::Stale,
            "revoked" => Self::Revoked,
            _ => Self::Other(status),
        }
    }
}

impl Serialize for SessionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SessionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A session as reported by the Feather API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session id (`SES_...`).
    pub id: String,
    /// Always `session`.
    #[serde(default = "session_object")]
    pub object: String,
    /// Anonymous or authenticated.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub session_type: Option<SessionType>,
    /// Status as reported.
    pub status: SessionStatus,
    /// The session token, when the API returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Owning user id (`USR_...`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// When the session was created.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// When the session was revoked, if it was.
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
    /// Fields not modelled above, kept for re-serialization.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn session_object() -> String {
    "session".to_string()
}

/// A session established from a token that passed every local check.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    /// Session id (`ses`).
    pub id: String,
    /// User id (`sub`).
    pub user_id: String,
    /// Project id (`aud`).
    pub project_id: String,
    /// Session type (`typ`).
    pub session_type: SessionType,
    /// Always [`SessionStatus::Active`] or [`SessionStatus::Stale`].
    pub status: SessionStatus,
    /// Token id (`jti`).
    pub token_id: String,
    /// `iat`, Unix seconds.
    pub issued_at: i64,
    /// `cat`, Unix seconds.
    pub created_at: i64,
    /// `exp`, Unix seconds.
    pub expires_at: i64,
    /// The verified token.
    pub token: String,
}

impl std::fmt::Debug for VerifiedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifiedSession")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("project_id", &self.project_id)
            .field("session_type", &self.session_type)
            .field("status", &self.status)
            .field("token_id", &self.token_id)
            .field("issued_at", &self.issued_at)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl VerifiedSession {
    fn new(claims: SessionClaims, status: SessionStatus, token: &str) -> Self {
        Self {
            id: claims.session_id,
            user_id: claims.user_id,
            project_id: claims.project_id,
            session_type: claims.session_type,
            status,
            token_id: claims.token_id,
            issued_at: claims.issued_at,
            created_at: claims.created_at,
            expires_at: claims.expires_at,
            token: token.to_string(),
        }
    }

    /// The same session in API shape.
    pub fn into_session(self) -> Session {
        Session {
            id: self.id,
            object: session_object(),
            session_type: Some(self.session_type),
            status: self.status,
            token: Some(self.token),
            user_id: Some(self.user_id),
            created_at: DateTime::from_timestamp(self.created_at, 0),
            revoked_at: None,
            extra: Map::new(),
        }
    }
}

/// Outcome of [`SessionTokenVerifier::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionVerdict {
    /// Fresh token, trusted on local verification alone.
    Active(VerifiedSession),
    /// Stale token; the authority's answer, unchanged.
    Reconciled(Session),
}

impl SessionVerdict {
    /// Final session status.
    pub fn status(&self) -> &SessionStatus {
        match self {
            Self::Active(session) => &session.status,
            Self::Reconciled(session) => &session.status,
        }
    }

    /// Session id.
    pub fn session_id(&self) -> &str {
        match self {
            Self::Active(session) => &session.id,
            Self::Reconciled(session) => &session.id,
        }
    }

    /// Whether the authority was consulted.
    pub fn is_reconciled(&self) -> bool {
        matches!(self, Self::Reconciled(_))
    }

    /// The final session in API shape.
    pub fn into_session(self) -> Session {
        match self {
            Self::Active(session) => session.into_session(),
            Self::Reconciled(session) => session,
        }
    }
}

/// Verifies session tokens and reconciles stale ones.
pub struct SessionTokenVerifier {
    keys: KeyCache,
    authority: Arc<dyn SessionAuthority>,
    policy: ClaimPolicy,
}

impl std::fmt::Debug for SessionTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokenVerifier")
            .field("keys", &self.keys)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SessionTokenVerifier {
    /// Create a verifier with the default [`ClaimPolicy`].
    pub fn new(keys: KeyCache, authority: Arc<dyn SessionAuthority>) -> Self {
        Self {
            keys,
            authority,
            policy: ClaimPolicy::default(),
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

    /// Validate `token` against the current time.
    ///
    /// # Errors
    ///
    /// - [`FeatherError::ParameterMissing`](crate::FeatherError::ParameterMissing) for an empty token
    /// - [`FeatherError::TokenInvalid`](crate::FeatherError::TokenInvalid) when any local check fails
    /// - key fetch and reconciliation errors, unchanged
    pub async fn validate(&self, token: &str) -> Result<SessionVerdict> {
        self.validate_at(token, jwt::unix_now()).await
    }

    /// Validate `token` as if the current Unix time were `now`.
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub async fn validate_at(&self, token: &str, now: i64) -> Result<SessionVerdict> {
        let session = self.verify_locally(token, now).await?;
        if session.status == SessionStatus::Active {
            debug!(session_id = %session.id, "Session token verified locally");
            return Ok(SessionVerdict::Active(session));
        }

        debug!(
            session_id = %session.id,
            expired_at = session.expires_at,
            "Session token is stale, reconciling"
        );
        let reconciled = self.authority.validate_session(&session.id, token).await?;
        debug!(session_id = %reconciled.id, status = %reconciled.status, "Session reconciled");
        Ok(SessionVerdict::Reconciled(reconciled))
    }

    /// Run every local check and derive the status, without reconciling.
    ///
    /// # Errors
    ///
    /// As [`validate`](Self::validate), minus reconciliation errors.
    pub async fn verify_locally(&self, token: &str, now: i64) -> Result<VerifiedSession> {
        let decoded = jwt::decode(token)?;
        let key_id = jwt::check_header(&decoded.header)?;
        let key = self.keys.resolve(key_id).await?;
        jwt::verify_signature(token, &key)?;

        let claims = self.policy.validate_session(&decoded.payload, now)?;
        let status = SessionStatus::derive(claims.expires_at, now);
        Ok(VerifiedSession::new(claims, status, token))
    }
}
