//! Connection settings for the Feather API.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FeatherError, Result};

/// Default API host.
pub const DEFAULT_HOST: &str = "api.feather.id";
/// Default API port.
pub const DEFAULT_PORT: u16 = 443;
/// Path prefix of every API route.
pub const API_BASE_PATH: &str = "/v1";
/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// URL scheme used to reach the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain HTTP, for local testing.
    Http,
    /// HTTPS.
    #[default]
    Https,
}

impl Protocol {
    /// URL scheme.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Protocol {
    type Err = FeatherError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(FeatherError::ParameterInvalid(format!(
                "protocol must be 'http' or 'https', got '{other}'"
            ))),
        }
    }
}

/// Where and how to reach the Feather API.
///
/// Unknown keys are rejected when deserializing.
///
/// ```
/// use feather_auth::FeatherConfig;
///
/// let config: FeatherConfig = serde_json::from_str(r#"{"host": "localhost", "port": 8080}"#).unwrap();
/// assert_eq!(config.base_url().unwrap().as_str(), "https://localhost:8080/v1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatherConfig {
    /// API host name.
    pub host: String,
    /// API port.
    pub port: u16,
    /// URL scheme.
    pub protocol: Protocol,
    /// Timeout for each request, in seconds. Must be non-zero.
    pub request_timeout_secs: u64,
}

impl Default for FeatherConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            protocol: Protocol::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl FeatherConfig {
    /// Check that the settings describe a reachable endpoint.
    ///
    /// # Errors
    ///
    /// [`FeatherError::ParameterInvalid`] for an empty host, a zero timeout,
    /// or settings that do not form a valid URL.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(FeatherError::ParameterInvalid(
                "host must not be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(FeatherError::ParameterInvalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        self.base_url().map(|_| ())
    }

    /// `{protocol}://{host}:{port}/v1`
    ///
    /// # Errors
    ///
    /// [`FeatherError::ParameterInvalid`] if the host does not form a valid URL.
    pub fn base_url(&self) -> Result<url::Url> {
        let raw = format!(
            "{}://{}:{}{}",
            self.protocol, self.host, self.port, API_BASE_PATH
        );
        url::Url::parse(&raw)
            .map_err(|e| FeatherError::ParameterInvalid(format!("invalid API address '{raw}': {e}")))
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
