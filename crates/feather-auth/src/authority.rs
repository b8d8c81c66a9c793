//! Capabilities the verification engine needs from the Feather API.
//!
//! The engine never talks HTTP itself. It is constructed with implementations
//! of these traits; [`Gateway`](crate::gateway::Gateway) provides the real
//! ones, tests provide in-memory doubles.

use async_trait::async_trait;

use crate::error::Result;
use crate::jwt::KeyMaterial;
use crate::session::Session;

/// Fetches verification key material by key id.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Fetch the key identified by `key_id`.
    ///
    /// # Errors
    ///
    /// Transport and API failures are returned as-is and are not retried by
    /// the caller.
    async fn fetch_key(&self, key_id: &str) -> Result<KeyMaterial>;
}

/// Authoritative session status, used once a token is past its expiry.
#[async_trait]
pub trait SessionAuthority: Send + Sync {
    /// Ask the authority for the current state of `session_id`, presenting `token`.
    ///
    /// # Errors
    ///
    /// Transport and API failures are returned as-is.
    async fn validate_session(&self, session_id: &str, token: &str) -> Result<Session>;
}

/// Source of this deployment's expected ID-token audience.
#[async_trait]
pub trait AudienceSource: Send + Sync {
    /// Fetch the audience value.
    ///
    /// # Errors
    ///
    /// Transport and API failures are returned as-is.
    async fn fetch_audience(&self) -> Result<String>;
}
