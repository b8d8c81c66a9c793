//! JWT infrastructure shared by session tokens and ID tokens
//!
//! # Pipeline
//!
//! ```text
//! token ──► decode ──► check alg/kid ──► KeyCache::resolve ──► verify signature
//!                                              │                      │
//!                                        (network on miss)            ▼
//!                                                              ClaimPolicy
//!                                                                     │
//!                                                                     ▼
//!                                                           status derivation
//! ```
//!
//! Each stage returns a [`Result`](crate::Result); the first failure ends the
//! pipeline and no later stage runs. In particular, no key is fetched for a
//! token whose header already fails the algorithm or key id checks.
//!
//! # Modules
//!
//! - `decode` - compact serialization splitting, no signature check
//! - `keys` - key material, injectable key storage, memoizing resolver
//! - `verify` - RS256 header policy and signature verification
//! - `claims` - fixed claim rules for session and ID tokens

pub mod claims;
pub mod decode;
pub mod keys;
pub mod verify;

pub use claims::{Claim, ClaimPolicy, IdentityClaims, SessionClaims, SessionType};
pub use decode::{DecodedToken, Header, Payload, decode};
pub use keys::{KeyCache, KeyData, KeyFormat, KeyMaterial, KeyStore, MemoryKeyStore};
pub use verify::{ACCEPTED_ALGORITHM, check_header, verify_signature};

/// Current Unix time in whole seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
