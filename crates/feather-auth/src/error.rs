//! Error types for token verification and Feather API calls.
//!
//! Every failure carries a wire-compatible [`ErrorType`] and, for validation
//! failures, an [`ErrorCode`]. Errors coming back from the API collaborators
//! are passed through unchanged; the engine never retries or swallows them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::jwt::claims::Claim;

/// Result type for Feather operations.
pub type Result<T> = std::result::Result<T, FeatherError>;

/// Broad error category, matching the `type` field of Feather API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorType {
    /// The API answered with an error.
    #[serde(rename = "api_error")]
    Api,
    /// The API could not be reached.
    #[serde(rename = "api_connection")]
    ApiConnection,
    /// The API rejected our credentials.
    #[serde(rename = "api_authentication_error")]
    ApiAuthentication,
    /// Caller input or a token failed validation.
    #[serde(rename = "validation_error")]
    Validation,
}

impl ErrorType {
    /// Wire name of this error type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api_error",
            Self::ApiConnection => "api_connection",
            Self::ApiAuthentication => "api_authentication_error",
            Self::Validation => "validation_error",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained validation error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The token failed decoding, signature, or claim checks.
    TokenInvalid,
    /// The ID token is past its expiry.
    TokenExpired,
    /// A parameter had the wrong shape.
    ParameterInvalid,
    /// A required parameter was not provided.
    ParameterMissing,
}

/// Errors produced by token verification and the Feather API gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatherError {
    /// Structural, algorithm, key id, signature, or claim failure.
    #[error("{message}")]
    TokenInvalid {
        /// Human-readable reason, e.g. `Invalid claim: sub`.
        message: String,
        /// The claim that failed, when the failure is claim-specific.
        claim: Option<Claim>,
    },

    /// The token is expired and the flavor treats expiry as terminal.
    #[error("{message}")]
    TokenExpired {
        /// Human-readable reason.
        message: String,
    },

    /// A parameter had the wrong shape.
    #[error("{0}")]
    ParameterInvalid(String),

    /// A required parameter was empty or absent.
    #[error("{0}")]
    ParameterMissing(String),

    /// The API rejected the configured API key.
    #[error("Feather API authentication failed: {0}")]
    ApiAuthentication(String),

    /// The API could not be reached.
    #[error("Feather API connection failed: {0}")]
    ApiConnection(String),

    /// The API answered with an unexpected status or body.
    #[error("Feather API error: {message}")]
    Api {
        /// HTTP status, when one was received.
        status: Option<u16>,
        /// Message from the API error body, or a description of the failure.
        message: String,
    },
}

impl FeatherError {
    /// Token failure that is not tied to a single claim.
    pub fn token_invalid(message: impl Into<String>) -> Self {
        Self::TokenInvalid {
            message: message.into(),
            claim: None,
        }
    }

    /// Token failure caused by `claim`.
    pub fn invalid_claim(claim: Claim) -> Self {
        Self::TokenInvalid {
            message: format!("Invalid claim: {claim}"),
            claim: Some(claim),
        }
    }

    /// Terminal expiry failure.
    pub fn token_expired(message: impl Into<String>) -> Self {
        Self::TokenExpired {
            message: message.into(),
        }
    }

    /// Category of this error.
    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::TokenInvalid { .. }
            | Self::TokenExpired { .. }
            | Self::ParameterInvalid(_)
            | Self::ParameterMissing(_) => ErrorType::Validation,
            Self::ApiAuthentication(_) => ErrorType::ApiAuthentication,
            Self::ApiConnection(_) => ErrorType::ApiConnection,
            Self::Api { .. } => ErrorType::Api,
        }
    }

    /// Validation code, if this is a validation error.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::TokenInvalid { .. } => Some(ErrorCode::TokenInvalid),
            Self::TokenExpired { .. } => Some(ErrorCode::TokenExpired),
            Self::ParameterInvalid(_) => Some(ErrorCode::ParameterInvalid),
            Self::ParameterMissing(_) => Some(ErrorCode::ParameterMissing),
            _ => None,
        }
    }

    /// Failing claim, for claim-specific token failures.
    pub fn claim(&self) -> Option<Claim> {
        match self {
            Self::TokenInvalid { claim, .. } => *claim,
            _ => None,
        }
    }

    /// Whether the token itself was rejected (invalid or expired).
    pub fn is_token_rejection(&self) -> bool {
        matches!(self, Self::TokenInvalid { .. } | Self::TokenExpired { .. })
    }
}
