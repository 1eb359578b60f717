//! TOML configuration.
//!
//! ```toml
//! [codifier]
//! path = "data/kodifikator.json"
//!
//! [feed]
//! provider = "alerts_in_ua"          # or "file" (reads `path`)
//! base_url = "https://api.alerts.in.ua"
//! token_env = "AIR_ALERT_API_TOKEN"
//! timeout_secs = 10
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! api_token_env = "CODIFIER_API_TOKEN"
//! ```
//!
//! Secrets never live in the file: `feed.token_env` and
//! `server.api_token_env` name the environment variables that hold them.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub codifier: CodifierConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CodifierConfig {
    /// Path to the codifier JSON dataset.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    #[serde(default = "default_feed_provider")]
    pub provider: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Alerts file for the `file` provider.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            provider: default_feed_provider(),
            base_url: default_base_url(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
            path: None,
        }
    }
}

fn default_feed_provider() -> String {
    "alerts_in_ua".to_string()
}
fn default_base_url() -> String {
    "https://api.alerts.in.ua".to_string()
}
fn default_token_env() -> String {
    "AIR_ALERT_API_TOKEN".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Environment variable holding the API token clients must present.
    /// Unset (or empty variable) leaves the API open.
    #[serde(default)]
    pub api_token_env: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_token_env: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl ServerConfig {
    /// The configured API token, read from the environment.
    pub fn api_token(&self) -> Option<String> {
        let var = self.api_token_env.as_deref()?;
        std::env::var(var)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Relative dataset / alerts paths are resolved against the config file.
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    if config.codifier.path.is_relative() {
        config.codifier.path = base.join(&config.codifier.path);
    }
    if let Some(p) = config.feed.path.as_mut() {
        if p.is_relative() {
            *p = base.join(&*p);
        }
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.feed.timeout_secs == 0 {
        anyhow::bail!("feed.timeout_secs must be > 0");
    }

    match config.feed.provider.as_str() {
        "alerts_in_ua" => {
            if config.feed.base_url.trim().is_empty() {
                anyhow::bail!("feed.base_url must not be empty");
            }
        }
        "file" => {
            if config.feed.path.is_none() {
                anyhow::bail!("feed.path must be specified when provider is 'file'");
            }
        }
        other => anyhow::bail!(
            "Unknown feed provider: '{}'. Must be alerts_in_ua or file.",
            other
        ),
    }

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(())
}
