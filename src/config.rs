//! Configuration management for the CRPT API client.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{CrptError, Result};
use crate::ratelimit::TimeWindow;

/// Prefix for environment variable overrides, e.g. `CRPT_RATE_LIMIT__REQUEST_LIMIT`.
const ENV_PREFIX: &str = "CRPT";
/// Separator between nested keys in environment variable names.
const ENV_SEPARATOR: &str = "__";

/// Main configuration for the CRPT API client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Remote API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

/// Remote API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Scheme and host of the API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the document creation endpoint
    #[serde(default = "default_create_document_path")]
    pub create_document_path: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            create_document_path: default_create_document_path(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    /// Full URL of the document creation endpoint.
    pub fn create_document_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.create_document_path.trim_start_matches('/')
        )
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_base_url() -> String {
    "https://ismp.crpt.ru".to_string()
}

fn default_create_document_path() -> String {
    "/api/v3/lk/documents/create".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Maximum number of requests started per time unit
    #[serde(default = "default_request_limit")]
    pub request_limit: u32,

    /// Time unit after which permits are refilled
    #[serde(default)]
    pub time_unit: TimeWindow,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            request_limit: default_request_limit(),
            time_unit: TimeWindow::default(),
        }
    }
}

fn default_request_limit() -> u32 {
    5
}

impl ClientConfig {
    /// Load configuration from an optional YAML file, with environment overrides.
    ///
    /// Environment variables take precedence over the file, e.g.
    /// `CRPT_API__BASE_URL` or `CRPT_RATE_LIMIT__TIME_UNIT=minute`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading client configuration");
            let contents = std::fs::read_to_string(path)?;
            builder = builder.add_source(::config::File::from_str(
                &contents,
                ::config::FileFormat::Yaml,
            ));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config: ClientConfig = builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| CrptError::Config(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ClientConfig = serde_yaml::from_str(yaml)
            .map_err(|e| CrptError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration describes a usable client.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.request_limit == 0 {
            return Err(CrptError::Config(
                "rate_limit.request_limit must be greater than zero".to_string(),
            ));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(CrptError::Config(
                "api.request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        reqwest::Url::parse(&self.api.create_document_url()).map_err(|e| {
            CrptError::Config(format!("invalid api.base_url '{}': {}", self.api.base_url, e))
        })?;

        Ok(())
    }
}
