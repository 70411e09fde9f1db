//! Configuration of the facilitator connection.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! command line flags and their environment variables.
//!
//! ```json
//! {
//!   "url": "https://x402.org/facilitator",
//!   "timeoutSecs": 10,
//!   "headers": { "Authorization": "$FACILITATOR_AUTH" }
//! }
//! ```

use clap::Args;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use x402_types::config::LiteralOrEnv;

use crate::client::{FacilitatorClient, FacilitatorClientError};

/// Connection flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Path to a JSON configuration file
    #[arg(long, short, env = "CONFIG", global = true)]
    pub config: Option<PathBuf>,
    /// Base URL of the facilitator
    #[arg(long, env = "FACILITATOR_URL", global = true)]
    pub facilitator_url: Option<String>,
    /// Request timeout in seconds
    #[arg(long, env = "FACILITATOR_TIMEOUT_SECS", global = true)]
    pub timeout_secs: Option<u64>,
    /// Extra request header as `NAME:VALUE`, may be repeated
    #[arg(long = "header", value_parser = parse_header, global = true)]
    pub headers: Vec<(String, String)>,
}

/// Facilitator connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default = "config_defaults::default_url")]
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
    #[serde(default)]
    headers: BTreeMap<String, LiteralOrEnv<String>>,
}

pub mod config_defaults {
    use crate::client::DEFAULT_FACILITATOR_URL;

    pub fn default_url() -> String {
        DEFAULT_FACILITATOR_URL.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error(transparent)]
    Client(#[from] FacilitatorClientError),
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: config_defaults::default_url(),
            timeout_secs: None,
            headers: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Builds the configuration from `args`, reading the file it names first.
    pub fn load(args: &ConnectionArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        if let Some(url) = &args.facilitator_url {
            config.url = url.clone();
        }
        if let Some(timeout_secs) = args.timeout_secs {
            config.timeout_secs = Some(timeout_secs);
        }
        for (name, value) in &args.headers {
            config
                .headers
                .insert(name.clone(), LiteralOrEnv::from_literal(value.clone()));
        }
        Ok(config)
    }

    fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        let config: ClientConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn header_map(&self) -> Result<HeaderMap, ConfigError> {
        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let invalid = |reason: String| ConfigError::InvalidHeader {
                name: name.clone(),
                reason,
            };
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let header_value =
                HeaderValue::from_str(value.inner()).map_err(|e| invalid(e.to_string()))?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }

    /// Creates a [`FacilitatorClient`] with these settings.
    pub fn facilitator_client(&self) -> Result<FacilitatorClient, ConfigError> {
        let mut client = FacilitatorClient::try_from(self.url.as_str())?;
        let headers = self.header_map()?;
        if !headers.is_empty() {
            client = client.with_headers(headers);
        }
        if let Some(timeout) = self.timeout() {
            client = client.with_timeout(timeout);
        }
        Ok(client)
    }
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got '{s}'"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}
