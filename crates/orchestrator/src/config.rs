//! Configuration management for the Deployment Orchestrator
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::time::Duration;

/// Where deployments and the ledger are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Storage backend
    pub store: StoreBackend,

    /// Redis connection URL
    pub redis_url: String,

    /// Drone CI base URL
    pub drone_server: String,

    /// Drone CI bearer token
    pub drone_token: String,

    /// Repository owning the chain pipelines
    pub drone_org: String,
    pub drone_repo: String,

    /// Branch used for build triggers
    pub drone_branch: String,

    /// Timeout for every CI request
    pub drone_timeout_secs: u64,

    /// Prefix of generated storage bucket names
    pub bucket_prefix: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_host", &self.api_host)
            .field("api_port", &self.api_port)
            .field("store", &self.store)
            .field("redis_url", &self.redis_url)
            .field("drone_server", &self.drone_server)
            .field("drone_token", &"<redacted>")
            .field("drone_org", &self.drone_org)
            .field("drone_repo", &self.drone_repo)
            .field("drone_branch", &self.drone_branch)
            .field("drone_timeout_secs", &self.drone_timeout_secs)
            .field("bucket_prefix", &self.bucket_prefix)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} must be set", key))
        };

        let store = match or("STORE", "redis").to_ascii_lowercase().as_str() {
            "redis" => StoreBackend::Redis,
            "memory" => StoreBackend::Memory,
            other => anyhow::bail!("Invalid STORE: {} (expected redis or memory)", other),
        };

        let config = Config {
            api_host: or("API_HOST", "0.0.0.0"),

            api_port: or("API_PORT", "8090")
                .parse()
                .context("Invalid API_PORT")?,

            store,

            redis_url: or("REDIS_URL", "redis://127.0.0.1:6379"),

            drone_server: required("DRONE_SERVER")?
                .trim_end_matches('/')
                .to_string(),
            drone_token: required("DRONE_TOKEN")?,
            drone_org: required("DRONE_ORG")?,
            drone_repo: required("DRONE_REPO")?,
            drone_branch: or("DRONE_BRANCH", "master"),

            drone_timeout_secs: or("DRONE_TIMEOUT_SECS", "30")
                .parse()
                .context("Invalid DRONE_TIMEOUT_SECS")?,

            bucket_prefix: or("BUCKET_PREFIX", "nano-fork"),
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.drone_timeout_secs == 0 {
            anyhow::bail!("DRONE_TIMEOUT_SECS must be greater than 0");
        }

        if !self.drone_server.starts_with("http://") && !self.drone_server.starts_with("https://")
        {
            anyhow::bail!("DRONE_SERVER must be an http(s) URL");
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    pub fn drone_timeout(&self) -> Duration {
        Duration::from_secs(self.drone_timeout_secs)
    }
}
