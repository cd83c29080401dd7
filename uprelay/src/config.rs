//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `UPRELAY_CONFIG`
//! environment variable. A missing file is not an error: every field has a default.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `UPRELAY_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `UPRELAY_UPSTREAM__REQUEST_TIMEOUT=30s` sets the `upstream.request_timeout` field.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! UPRELAY_PORT=8080
//!
//! # Include error traces in 500 responses
//! UPRELAY_ENVIRONMENT=development
//!
//! # Allow larger uploads (bytes)
//! UPRELAY_UPLOAD__MAX_FILE_SIZE=1073741824
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "UPRELAY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Deployment environment. In `development`, 500 responses carry an error trace.
    pub environment: Environment,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
    /// Inbound upload handling
    pub upload: UploadConfig,
    /// Outbound Files API client settings
    pub upstream: UpstreamConfig,
    /// Cross-origin settings for browser clients
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

/// Inbound upload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Maximum accepted request body size in bytes (default: 200 MiB)
    pub max_file_size: u64,
    /// Directory uploaded files are spooled to while a request is in flight.
    /// Defaults to the system temporary directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spool_dir: Option<PathBuf>,
}

/// Outbound HTTP client configuration.
///
/// Both timeouts are unset by default, so a slow upstream holds the request open until it
/// answers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Total time allowed for the PUT, including the response body
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<Duration>,
    /// Time allowed to establish the TCP/TLS connection
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<Duration>,
    /// User-Agent sent with each upload
    pub user_agent: String,
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            environment: Environment::default(),
            enable_otel_export: false,
            upload: UploadConfig::default(),
            upstream: UpstreamConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 200 * 1024 * 1024,
            spool_dir: None,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            request_timeout: None,
            connect_timeout: None,
            user_agent: concat!("uprelay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            max_age: None,
        }
    }
}

impl Config {
    /// Load configuration from the YAML file named in `args`, merged with `UPRELAY_` env vars.
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.upload.max_file_size == 0 {
            anyhow::bail!("Config validation: upload.max_file_size must be greater than 0");
        }
        if usize::try_from(self.upload.max_file_size).is_err() {
            anyhow::bail!("Config validation: upload.max_file_size does not fit in memory on this platform");
        }

        for (name, timeout) in [
            ("request_timeout", self.upstream.request_timeout),
            ("connect_timeout", self.upstream.connect_timeout),
        ] {
            if timeout.is_some_and(|t| t.is_zero()) {
                anyhow::bail!("Config validation: upstream.{name} must be greater than 0 when set");
            }
        }

        if self.cors.allowed_origins.is_empty() {
            anyhow::bail!("Config validation: cors.allowed_origins must contain at least one origin (use \"*\" to allow all)");
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("UPRELAY_").split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether error responses should carry a diagnostic trace
    pub fn expose_error_traces(&self) -> bool {
        self.environment == Environment::Development
    }
}
