//! # Feather Auth - Local Token Verification
//!
//! Verifies Feather session tokens and ID tokens locally, without a network
//! round trip whenever the token itself is enough.
//!
//! ## Token flavors
//!
//! - **Session tokens** ([`SessionTokenVerifier`]): verified offline while
//!   fresh. Once past `exp` the session may have been revoked server-side, so
//!   exactly one `POST /sessions/{id}/validate` call is made and its answer is
//!   returned as [`SessionVerdict::Reconciled`].
//! - **ID tokens** ([`IdTokenVerifier`]): additionally bound to this
//!   deployment's audience. Expiry is terminal and surfaces as
//!   [`FeatherError::TokenExpired`].
//!
//! Both flavors accept `RS256` only and resolve verification keys through a
//! [`KeyCache`] that fetches each key id at most once.
//!
//! ## Architecture
//!
//! - [`jwt`] - decoding, key cache, signature and claim checks
//! - [`session`] - session status derivation and reconciliation
//! - [`identity`] - ID-token verification and the audience cache
//! - [`authority`] - traits for everything the engine needs from the network
//! - [`gateway`] - `reqwest` implementations of those traits
//! - [`config`] - API connection settings
//! - [`client`] - [`FeatherClient`], wiring all of the above together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use feather_auth::{FeatherClient, FeatherConfig, SessionVerdict};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = FeatherClient::new("sk_live_...", FeatherConfig::default())?;
//!
//! match client.sessions().validate("eyJhbGciOiJSUzI1NiIs...").await? {
//!     SessionVerdict::Active(session) => println!("user {}", session.user_id),
//!     SessionVerdict::Reconciled(session) => println!("session is {}", session.status),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom collaborators
//!
//! The verifiers only see the [`KeySource`], [`SessionAuthority`] and
//! [`AudienceSource`] traits, so any transport or in-memory double can be
//! injected through [`KeyCache::new`], [`SessionTokenVerifier::new`] and
//! [`AudienceCache::new`].

pub mod authority;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod jwt;
pub mod session;

pub use authority::{AudienceSource, KeySource, SessionAuthority};
pub use client::FeatherClient;
pub use config::{FeatherConfig, Protocol};
pub use error::{ErrorCode, ErrorType, FeatherError, Result};
pub use gateway::{Gateway, JwksEndpoint, PublicKeyEndpoint};
pub use identity::{AudienceCache, IdTokenVerifier, VerifiedUser};
pub use jwt::{ClaimPolicy, KeyCache, KeyMaterial, KeyStore, MemoryKeyStore, SessionType};
pub use session::{Session, SessionStatus, SessionTokenVerifier, SessionVerdict, VerifiedSession};
