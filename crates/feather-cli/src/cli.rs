//! Argument parsing, configuration layering and logging setup

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::{Config, File};
use feather_auth::{FeatherConfig, Protocol};
use tracing_subscriber::EnvFilter;

/// feather-verify - check Feather tokens against the live API
#[derive(Parser, Debug)]
#[command(name = "feather-verify", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "FEATHER_CONFIG", default_value = "feather.toml", global = true)]
    pub config: PathBuf,

    /// API host
    #[arg(long, env = "FEATHER_HOST", global = true)]
    pub host: Option<String>,

    /// API port
    #[arg(long, env = "FEATHER_PORT", global = true)]
    pub port: Option<u16>,

    /// API protocol (http or https)
    #[arg(long, env = "FEATHER_PROTOCOL", global = true)]
    pub protocol: Option<Protocol>,

    /// Per-request timeout in seconds
    #[arg(long, env = "FEATHER_REQUEST_TIMEOUT_SECS", global = true)]
    pub timeout: Option<u32>,

    /// Enable verbose logging (-v, -vv, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all logging except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a session token, reconciling it with the API if stale
    Session {
        /// The session token
        token: String,

        /// Feather API key
        #[arg(long, env = "FEATHER_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Verify as of this Unix time instead of now
        #[arg(long)]
        at: Option<i64>,

        /// Expected `iss` claim [default: feather.id]
        #[arg(long)]
        issuer: Option<String>,
    },

    /// Verify an ID token
    IdToken {
        /// The ID token
        token: String,

        /// Feather API key
        #[arg(long, env = "FEATHER_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Verify as of this Unix time instead of now
        #[arg(long)]
        at: Option<i64>,

        /// Expected `iss` claim [default: feather]
        #[arg(long)]
        issuer: Option<String>,
    },

    /// Print a token's header and claims without verifying it
    Decode {
        /// The token
        token: String,
    },
}

impl Cli {
    /// Layer the config file (if present) under flags and `FEATHER_*` variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed, contains unknown keys,
    /// or the merged settings are invalid.
    pub fn load_config(&self) -> anyhow::Result<FeatherConfig> {
        let defaults = FeatherConfig::default();

        let settings = Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("protocol", defaults.protocol.as_str())?
            .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?
            .add_source(File::from(self.config.as_path()).required(false))
            .set_override_option("host", self.host.clone())?
            .set_override_option("port", self.port.map(i64::from))?
            .set_override_option("protocol", self.protocol.map(|p| p.as_str()))?
            .set_override_option("request_timeout_secs", self.timeout.map(i64::from))?
            .build()
            .with_context(|| format!("failed to read {}", self.config.display()))?;

        let config: FeatherConfig = settings
            .try_deserialize()
            .context("invalid Feather configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Install the log subscriber. `RUST_LOG` takes precedence over `-v`/`-q`.
    pub fn init_tracing(&self) {
        let level = if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}
