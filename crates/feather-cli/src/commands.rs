//! Command execution

use anyhow::Context;
use feather_auth::jwt::{self, unix_now};
use feather_auth::{ClaimPolicy, FeatherClient, FeatherConfig, FeatherError};
use serde_json::{Value, json};
use tracing::info;

use crate::cli::Command;

impl Command {
    /// Run the command and return the JSON document to print.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or the token is rejected.
    /// Token and API failures keep their [`FeatherError`] as the root cause.
    pub async fn execute(self, config: FeatherConfig) -> anyhow::Result<Value> {
        match self {
            Self::Session {
                token,
                api_key,
                at,
                issuer,
            } => {
                let client = build_client(api_key, config, issuer, None)?;
                let now = at.unwrap_or_else(unix_now);
                info!(now, "Validating session token");

                let verdict = client.sessions().validate_at(&token, now).await?;
                let reconciled = verdict.is_reconciled();
                Ok(json!({
                    "reconciled": reconciled,
                    "session": verdict.into_session(),
                }))
            }
            Self::IdToken {
                token,
                api_key,
                at,
                issuer,
            } => {
                let client = build_client(api_key, config, None, issuer)?;
                let now = at.unwrap_or_else(unix_now);
                info!(now, "Verifying ID token");

                let user = client.id_tokens().verify_at(&token, now).await?;
                Ok(serde_json::to_value(user)?)
            }
            Self::Decode { token } => {
                let decoded = jwt::decode(&token).context("token could not be decoded")?;
                Ok(json!({
                    "header": decoded.header,
                    "payload": decoded.payload,
                }))
            }
        }
    }
}

fn build_client(
    api_key: String,
    config: FeatherConfig,
    session_issuer: Option<String>,
    identity_issuer: Option<String>,
) -> feather_auth::Result<FeatherClient> {
    let mut session_policy = ClaimPolicy::default();
    if let Some(issuer) = session_issuer {
        session_policy = session_policy.with_issuer(issuer);
    }
    let mut identity_policy = ClaimPolicy::identity();
    if let Some(issuer) = identity_issuer {
        identity_policy = identity_policy.with_issuer(issuer);
    }
    FeatherClient::with_policies(api_key, config, session_policy, identity_policy)
}

/// Render a failure as the Feather error shape when it is one.
pub fn error_document(error: &anyhow::Error) -> Value {
    match error.downcast_ref::<FeatherError>() {
        Some(feather) => json!({
            "object": "error",
            "type": feather.error_type(),
            "code": feather.code(),
            "claim": feather.claim(),
            "message": feather.to_string(),
        }),
        None => json!({
            "object": "error",
            "message": format!("{error:#}"),
        }),
    }
}
