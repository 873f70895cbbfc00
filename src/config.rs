//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.doajtally.toml` files. Precedence is defaults, then the file, then
//! command-line flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".doajtally.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// DOAJ API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Git settings.
    #[serde(default)]
    pub git: GitConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Root of the git working tree holding the data.
    #[serde(default = "default_repo_dir")]
    pub repo_dir: PathBuf,

    /// Data directory, relative to `repo_dir` unless absolute.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Run identifier override; the current quarter when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarter: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            repo_dir: default_repo_dir(),
            data_dir: default_data_dir(),
            quarter: None,
        }
    }
}

fn default_repo_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// DOAJ search API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Search API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Journals requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// First page to request.
    #[serde(default = "default_start_page")]
    pub start_page: u32,

    /// Pause between page requests in milliseconds.
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Retries on transient failures.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Backoff base in milliseconds; retry n waits `base * 2^n`.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// HTTP statuses considered transient.
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            start_page: default_start_page(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            retry_statuses: default_retry_statuses(),
            user_agent: default_user_agent(),
        }
    }
}

impl ApiConfig {
    /// Endpoint listing all journals.
    pub fn journals_url(&self) -> String {
        format!("{}/journals/*", self.base_url.trim_end_matches('/'))
    }
}

pub fn default_base_url() -> String {
    "https://doaj.org/api/v3/search".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_start_page() -> u32 {
    1
}

fn default_rate_limit_delay_ms() -> u64 {
    500
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_retry_statuses() -> Vec<u16> {
    crate::fetch::transport::DEFAULT_RETRY_STATUSES.to_vec()
}

pub fn default_user_agent() -> String {
    format!(
        "doajtally/{} (https://github.com/doajtally/doajtally)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Git settings for `--enable-git`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Remote to fetch from and push to.
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Branch to sync; the checked-out branch when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            branch: None,
        }
    }
}

fn default_remote() -> String {
    "origin".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref repo_dir) = args.repo_dir {
            self.general.repo_dir = repo_dir.clone();
        }
        if let Some(ref data_dir) = args.data_dir {
            self.general.data_dir = data_dir.clone();
        }
        if let Some(ref quarter) = args.quarter {
            self.general.quarter = Some(quarter.clone());
        }
        if let Some(ref base_url) = args.base_url {
            self.api.base_url = base_url.clone();
        }
        if let Some(page_size) = args.page_size {
            self.api.page_size = page_size;
        }
        if let Some(delay) = args.delay_ms {
            self.api.rate_limit_delay_ms = delay;
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
