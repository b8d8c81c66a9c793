//! Fixed claim rules for Feather tokens
//!
//! Claims are checked in a fixed order and the first failure wins, so the
//! error always names exactly one claim (`Invalid claim: sub`, ...).
//!
//! | claim | session token | ID token |
//! |-------|---------------|----------|
//! | `jti` | string, at least 10 chars | - |
//! | `iss` | `feather.id` | `feather` |
//! | `sub` | 40 chars, user prefix | 40 chars, user prefix |
//! | `aud` | 40 chars, project prefix | 40 chars, project prefix, equals deployment audience |
//! | `ses` | 40 chars, session prefix | - |
//! | `typ` | `anonymous` or `authenticated` | - |
//! | `iat` | number, not in the future | number, not in the future |
//! | `cat` | number | - |
//! | `exp` | number | number |
//!
//! No clock skew tolerance is applied to `iat`. `exp` is only type-checked
//! here; what expiry means is decided by each token flavor.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::decode::Payload;
use crate::error::{FeatherError, Result};

/// Issuer of session tokens.
pub const FEATHER_ISSUER: &str = "feather.id";
/// Issuer of ID tokens.
pub const ID_TOKEN_ISSUER: &str = "feather";
/// Prefix of user ids.
pub const USER_ID_PREFIX: &str = "USR_";
/// Prefix of project ids.
pub const PROJECT_ID_PREFIX: &str = "PRJ_";
/// Prefix of session ids.
pub const SESSION_ID_PREFIX: &str = "SES_";
/// Length of every prefixed id.
pub const ID_LENGTH: usize = 40;
/// Minimum length of a token id.
pub const MIN_TOKEN_ID_LENGTH: usize = 10;

/// A validated claim, named by its registered short name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Claim {
    /// Token id.
    Jti,
    /// Issuer.
    Iss,
    /// Subject (user id).
    Sub,
    /// Audience (project id).
    Aud,
    /// Session id.
    Ses,
    /// Session type.
    Typ,
    /// Issued at.
    Iat,
    /// Session created at.
    Cat,
    /// Expires at.
    Exp,
}

impl Claim {
    /// Registered claim name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Jti => "jti",
            Self::Iss => "iss",
            Self::Sub => "sub",
            Self::Aud => "aud",
            Self::Ses => "ses",
            Self::Typ => "typ",
            Self::Iat => "iat",
            Self::Cat => "cat",
            Self::Exp => "exp",
        }
    }
}

impl std::fmt::Display for Claim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of session a token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    /// Session without a credential.
    Anonymous,
    /// Session backed by a verified credential.
    Authenticated,
}

impl SessionType {
    /// Parse the `typ` claim value.
    pub fn from_claim(value: &str) -> Option<Self> {
        match value {
            "anonymous" => Some(Self::Anonymous),
            "authenticated" => Some(Self::Authenticated),
            _ => None,
        }
    }

    /// Claim value of this type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Authenticated => "authenticated",
        }
    }
}

/// Claims of a session token that passed every rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// `jti`
    pub token_id: String,
    /// `iss`
    pub issuer: String,
    /// `sub`, a user id
    pub user_id: String,
    /// `aud`, a project id
    pub project_id: String,
    /// `ses`, a session id
    pub session_id: String,
    /// `typ`
    pub session_type: SessionType,
    /// `iat`, Unix seconds
    pub issued_at: i64,
    /// `cat`, when the session was created, Unix seconds
    pub created_at: i64,
    /// `exp`, Unix seconds
    pub expires_at: i64,
}

/// Claims of an ID token that passed every rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    /// `iss`
    pub issuer: String,
    /// `sub`, a user id
    pub user_id: String,
    /// `aud`, the deployment's project id
    pub project_id: String,
    /// `iat`, Unix seconds
    pub issued_at: i64,
    /// `exp`, Unix seconds
    pub expires_at: i64,
}

/// The constants claims are checked against.
///
/// [`Default`] is the session-token policy; [`ClaimPolicy::identity`] differs
/// only in the issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimPolicy {
    /// Exact `iss` value required.
    pub issuer: String,
    /// Prefix of `sub`.
    pub user_prefix: String,
    /// Prefix of `aud`.
    pub project_prefix: String,
    /// Prefix of `ses`.
    pub session_prefix: String,
    /// Exact length, in characters, of every prefixed id.
    pub id_length: usize,
    /// Minimum length of `jti`.
    pub min_token_id_length: usize,
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self {
            issuer: FEATHER_ISSUER.to_string(),
            user_prefix: USER_ID_PREFIX.to_string(),
            project_prefix: PROJECT_ID_PREFIX.to_string(),
            session_prefix: SESSION_ID_PREFIX.to_string(),
            id_length: ID_LENGTH,
            min_token_id_length: MIN_TOKEN_ID_LENGTH,
        }
    }
}

impl ClaimPolicy {
    /// Policy for ID tokens, which are issued as `feather`.
    pub fn identity() -> Self {
        Self::default().with_issuer(ID_TOKEN_ISSUER)
    }

    /// Override the expected issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Validate session-token claims at Unix time `now`.
    ///
    /// # Errors
    ///
    /// [`FeatherError::TokenInvalid`] naming the first claim that fails.
    pub fn validate_session(&self, payload: &Payload, now: i64) -> Result<SessionClaims> {
        let token_id = string_claim(payload, Claim::Jti)?;
        if token_id.chars().count() < self.min_token_id_length {
            return Err(FeatherError::invalid_claim(Claim::Jti));
        }
        let issuer = self.issuer(payload)?;
        let user_id = self.prefixed_id(payload, Claim::Sub, &self.user_prefix)?;
        let project_id = self.prefixed_id(payload, Claim::Aud, &self.project_prefix)?;
        let session_id = self.prefixed_id(payload, Claim::Ses, &self.session_prefix)?;
        let session_type = SessionType::from_claim(string_claim(payload, Claim::Typ)?)
            .ok_or_else(|| FeatherError::invalid_claim(Claim::Typ))?;
        let issued_at = issued_at(payload, now)?;
        let created_at = number_claim(payload, Claim::Cat)?;
        let expires_at = number_claim(payload, Claim::Exp)?;

        Ok(SessionClaims {
            token_id: token_id.to_string(),
            issuer: issuer.to_string(),
            user_id: user_id.to_string(),
            project_id: project_id.to_string(),
            session_id: session_id.to_string(),
            session_type,
            issued_at,
            created_at,
            expires_at,
        })
    }

    /// Validate ID-token claims at Unix time `now`.
    ///
    /// `audience` is this deployment's own project id. A token issued for
    /// any other project is rejected even if it is otherwise well formed.
    ///
    /// # Errors
    ///
    /// [`FeatherError::TokenInvalid`] naming the first claim that fails.
    pub fn validate_identity(
        &self,
        payload: &Payload,
        audience: &str,
        now: i64,
    ) -> Result<IdentityClaims> {
        let issuer = self.issuer(payload)?;
        let user_id = self.prefixed_id(payload, Claim::Sub, &self.user_prefix)?;
        let project_id = self.prefixed_id(payload, Claim::Aud, &self.project_prefix)?;
        if project_id != audience {
            return Err(FeatherError::invalid_claim(Claim::Aud));
        }
        let issued_at = issued_at(payload, now)?;
        let expires_at = number_claim(payload, Claim::Exp)?;

        Ok(IdentityClaims {
            issuer: issuer.to_string(),
            user_id: user_id.to_string(),
            project_id: project_id.to_string(),
            issued_at,
            expires_at,
        })
    }

    fn issuer<'a>(&self, payload: &'a Payload) -> Result<&'a str> {
        string_claim(payload, Claim::Iss)
            .ok()
            .filter(|issuer| *issuer == self.issuer)
            .ok_or_else(|| FeatherError::invalid_claim(Claim::Iss))
    }

    fn prefixed_id<'a>(&self, payload: &'a Payload, claim: Claim, prefix: &str) -> Result<&'a str> {
        string_claim(payload, claim)
            .ok()
            .filter(|id| id.chars().count() == self.id_length && id.starts_with(prefix))
            .ok_or_else(|| FeatherError::invalid_claim(claim))
    }
}

fn string_claim(payload: &Payload, claim: Claim) -> Result<&str> {
    payload
        .get(claim.name())
        .and_then(Value::as_str)
        .ok_or_else(|| FeatherError::invalid_claim(claim))
}

/// Numeric claims are whole seconds; fractional values are truncated.
fn number_claim(payload: &Payload, claim: Claim) -> Result<i64> {
    let Some(Value::Number(number)) = payload.get(claim.name()) else {
        return Err(FeatherError::invalid_claim(claim));
    };
    number
        .as_i64()
        .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
        .ok_or_else(|| FeatherError::invalid_claim(claim))
}

fn issued_at(payload: &Payload, now: i64) -> Result<i64> {
    let issued_at = number_claim(payload, Claim::Iat)?;
    if issued_at > now {
        return Err(FeatherError::invalid_claim(Claim::Iat));
    }
    Ok(issued_at)
}
