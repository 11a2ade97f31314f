//! Configuration module for the transfer relay
//!
//! Configuration is loaded from an optional TOML file, then environment
//! overrides are applied. `SOLANA_RPC_URL` (or `NEXT_PUBLIC_SOLANA_RPC_URL`)
//! selects the RPC node; without either the public mainnet endpoint is used.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable that selects the RPC endpoint
pub const RPC_URL_ENV: &str = "SOLANA_RPC_URL";

/// Fallback name read by existing web deployments of the relay
pub const PUBLIC_RPC_URL_ENV: &str = "NEXT_PUBLIC_SOLANA_RPC_URL";

/// Public endpoint used when nothing else is configured
pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// RPC node configuration
    #[serde(default)]
    pub rpc: RpcConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// RPC endpoint URL
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,

    /// Delay between signature status polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on a confirmation wait, independent of blockhash expiry
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,

    /// Consecutive failed status polls tolerated before giving up
    #[serde(default = "default_max_poll_errors")]
    pub max_poll_errors: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

// Default value functions
fn default_rpc_url() -> String { DEFAULT_RPC_URL.to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_poll_interval_ms() -> u64 { 500 }
fn default_confirm_timeout() -> u64 { 60 }
fn default_max_poll_errors() -> u32 { 3 }
fn default_bind() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3000 }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            timeout_secs: default_rpc_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
            confirm_timeout_secs: default_confirm_timeout(),
            max_poll_errors: default_max_poll_errors(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl RpcConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load `.env`, then the file if present (defaults otherwise), then apply
    /// environment overrides and validate
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file '{}' not found, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = [RPC_URL_ENV, PUBLIC_RPC_URL_ENV]
            .into_iter()
            .filter_map(|key| lookup(key))
            .find(|v| !v.trim().is_empty());
        if let Some(url) = url {
            self.rpc.url = url.trim().to_string();
        }
    }

    /// Reject configurations that would make the workflow unbounded or unusable
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.rpc.url.starts_with("http://") || self.rpc.url.starts_with("https://")) {
            anyhow::bail!("rpc.url must be an http(s) URL, got '{}'", self.rpc.url);
        }
        if self.rpc.poll_interval_ms == 0 {
            anyhow::bail!("rpc.poll_interval_ms must be greater than zero");
        }
        if self.rpc.confirm_timeout_secs == 0 {
            anyhow::bail!("rpc.confirm_timeout_secs must be greater than zero");
        }
        if self.rpc.poll_interval_ms >= self.rpc.confirm_timeout_secs * 1000 {
            anyhow::bail!("rpc.poll_interval_ms must be shorter than rpc.confirm_timeout_secs");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.rpc.url, DEFAULT_RPC_URL);
        assert_eq!(config.server.port, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override_selects_rpc_url() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| {
            (key == RPC_URL_ENV).then(|| "https://devnet.example.org".to_string())
        });
        assert_eq!(config.rpc.url, "https://devnet.example.org");
    }

    #[test]
    fn test_public_rpc_url_is_a_fallback() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| {
            (key == PUBLIC_RPC_URL_ENV).then(|| "https://rpc.shop.example".to_string())
        });
        assert_eq!(config.rpc.url, "https://rpc.shop.example");

        // The primary name wins when both are set
        let mut config = Config::default();
        config.apply_env_overrides(|key| match key {
            RPC_URL_ENV => Some("https://primary.example".to_string()),
            PUBLIC_RPC_URL_ENV => Some("https://rpc.shop.example".to_string()),
            _ => None,
        });
        assert_eq!(config.rpc.url, "https://primary.example");
    }

    #[test]
    fn test_blank_env_keeps_default() {
        let mut config = Config::default();
        config.apply_env_overrides(|_| Some("   ".to_string()));
        assert_eq!(config.rpc.url, DEFAULT_RPC_URL);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rpc]\nurl = \"http://127.0.0.1:8899\"\npoll_interval_ms = 200").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.rpc.url, "http://127.0.0.1:8899");
        assert_eq!(config.rpc.poll_interval_ms, 200);
        assert_eq!(config.rpc.confirm_timeout_secs, 60);
        assert_eq!(config.server.bind, "0.0.0.0");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.rpc.url = "ftp://nope".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rpc.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rpc.confirm_timeout_secs = 1;
        config.rpc.poll_interval_ms = 5_000;
        assert!(config.validate().is_err());
    }
}
