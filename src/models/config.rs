//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::url::is_valid_domain;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Instance crawl settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Account resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if !is_valid_domain(&self.crawler.anchor_instance) {
            return Err(AppError::validation(format!(
                "crawler.anchor_instance '{}' is not a domain",
                self.crawler.anchor_instance
            )));
        }
        if self.crawler.software.trim().is_empty() {
            return Err(AppError::validation("crawler.software is empty"));
        }
        if self.resolver.user_agent.trim().is_empty() {
            return Err(AppError::validation("resolver.user_agent is empty"));
        }
        if let Some(instance) = &self.resolver.instance_url {
            if crate::utils::url::https_origin(instance).is_none() {
                return Err(AppError::validation(format!(
                    "resolver.instance_url '{instance}' is not an https origin"
                )));
            }
        }
        Ok(())
    }
}

/// Instance crawl behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent domain resolutions
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Well-known hub whose presence makes a peer list trustworthy
    #[serde(default = "defaults::anchor_instance")]
    pub anchor_instance: String,

    /// NodeInfo `software.name` accepted as compatible (case-sensitive)
    #[serde(default = "defaults::software")]
    pub software: String,
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            anchor_instance: defaults::anchor_instance(),
            software: defaults::software(),
        }
    }
}

/// Account resolution behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Home instance for authenticated lookups, e.g. `https://mastodon.social`
    #[serde(default)]
    pub instance_url: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            instance_url: None,
        }
    }
}

mod defaults {
    pub fn user_agent() -> String {
        concat!("fediscover/", env!("CARGO_PKG_VERSION")).into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn max_concurrent() -> usize {
        30
    }
    pub fn anchor_instance() -> String {
        "mastodon.social".into()
    }
    pub fn software() -> String {
        "mastodon".into()
    }
}
