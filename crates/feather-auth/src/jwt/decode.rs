//! Compact JWS decoding without signature verification.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FeatherError, Result};

pub(crate) const INVALID_FORMAT: &str = "Token has an invalid format";

/// JOSE header fields the engine cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Signature algorithm (`alg`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Key identifier (`kid`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Token type (`typ`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// Raw claim set. Claims are only typed once they pass [`ClaimPolicy`](super::ClaimPolicy).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// Look up a claim by its registered name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// All claims.
    pub fn claims(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(claims: Map<String, Value>) -> Self {
        Self(claims)
    }
}

/// A token split into header and payload. The signature has not been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    /// Decoded JOSE header.
    pub header: Header,
    /// Decoded claim set.
    pub payload: Payload,
}

/// Decode a compact token into header and payload.
///
/// Only the shape is checked: three dot-separated segments whose first two
/// are base64url-encoded JSON objects.
///
/// # Errors
///
/// - [`FeatherError::ParameterMissing`] if `token` is empty
/// - [`FeatherError::TokenInvalid`] if the token is structurally malformed
pub fn decode(token: &str) -> Result<DecodedToken> {
    if token.is_empty() {
        return Err(FeatherError::ParameterMissing(
            "required param not provided: 'token'".to_string(),
        ));
    }

    let mut segments = token.split('.');
    let (Some(header_segment), Some(payload_segment), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(FeatherError::token_invalid(INVALID_FORMAT));
    };

    Ok(DecodedToken {
        header: decode_segment(header_segment)?,
        payload: decode_segment(payload_segment)?,
    })
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| FeatherError::token_invalid(INVALID_FORMAT))?;
    serde_json::from_slice(&bytes).map_err(|_| FeatherError::token_invalid(INVALID_FORMAT))
}
