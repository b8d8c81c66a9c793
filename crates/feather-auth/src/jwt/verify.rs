//! RS256 header policy and signature verification
//!
//! Only `RS256` is ever accepted. The algorithm is checked against the
//! untrusted header *before* any key is resolved, so a token naming `none`,
//! `HS256` or anything else never triggers a key fetch and can never be
//! verified with a public key used as an HMAC secret.

use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use tracing::debug;

use super::decode::Header;
use super::keys::{KeyData, KeyMaterial};
use crate::error::{FeatherError, Result};

/// The only signature algorithm accepted.
pub const ACCEPTED_ALGORITHM: &str = "RS256";

pub(crate) const INVALID_ALGORITHM: &str = "Invalid signature algorithm";
pub(crate) const INVALID_KEY_ID: &str = "Invalid key ID";
pub(crate) const INVALID_SIGNATURE: &str = "Invalid signature";

/// Check the header policy and return the key id to resolve.
///
/// # Errors
///
/// [`FeatherError::TokenInvalid`] if `alg` is not `RS256` or `kid` is absent or empty.
pub fn check_header(header: &Header) -> Result<&str> {
    if header.alg.as_deref() != Some(ACCEPTED_ALGORITHM) {
        debug!(algorithm = ?header.alg, "Rejecting token algorithm");
        return Err(FeatherError::token_invalid(INVALID_ALGORITHM));
    }

    header
        .kid
        .as_deref()
        .filter(|kid| !kid.is_empty())
        .ok_or_else(|| FeatherError::token_invalid(INVALID_KEY_ID))
}

/// Verify the RS256 signature of `token` with `key`.
///
/// Only the signature is checked here; claims are left to
/// [`ClaimPolicy`](super::ClaimPolicy).
///
/// # Errors
///
/// [`FeatherError::TokenInvalid`] if the key cannot be loaded, the signature
/// does not match, or the verification library fails for any other reason.
pub fn verify_signature(token: &str, key: &KeyMaterial) -> Result<()> {
    let decoding_key = decoding_key(key)?;

    jsonwebtoken::decode::<serde_json::Value>(token, &decoding_key, &signature_only())
        .map(|_| ())
        .map_err(|e| {
            debug!(key_id = key.key_id(), error = %e, "Signature verification failed");
            FeatherError::token_invalid(INVALID_SIGNATURE)
        })
}

fn decoding_key(key: &KeyMaterial) -> Result<DecodingKey> {
    let decoded = match key.data() {
        KeyData::Pem(pem) => DecodingKey::from_rsa_pem(pem.as_bytes()),
        KeyData::Jwk(value) => {
            let jwk: Jwk = serde_json::from_value(value.clone()).map_err(|e| {
                debug!(key_id = key.key_id(), error = %e, "Malformed JWK");
                FeatherError::token_invalid(INVALID_SIGNATURE)
            })?;
            DecodingKey::from_jwk(&jwk)
        }
    };

    decoded.map_err(|e| {
        debug!(key_id = key.key_id(), error = %e, "Unusable verification key");
        FeatherError::token_invalid(INVALID_SIGNATURE)
    })
}

/// Validation that checks the RS256 signature and nothing else.
fn signature_only() -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}
