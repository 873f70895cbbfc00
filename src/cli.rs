//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Default number of licensed journals counted per run.
pub const DEFAULT_FETCH_LIMIT: usize = 1000;

/// doajtally - count Creative Commons licensed DOAJ journals
///
/// Walks the DOAJ journal search, keeps journals with license metadata and
/// counts them by license, subject, language and open-access start year.
///
/// Examples:
///   doajtally --limit 500
///   doajtally --enable-save
///   doajtally --enable-save --enable-git
///   doajtally --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Total licensed journals to count
    #[arg(long, default_value_t = DEFAULT_FETCH_LIMIT, value_name = "COUNT")]
    pub limit: usize,

    /// Enable saving data to CSV files
    #[arg(long)]
    pub enable_save: bool,

    /// Enable git actions (fetch/merge, commit, push); requires --enable-save
    #[arg(long)]
    pub enable_git: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .doajtally.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Root of the git working tree holding the data
    #[arg(long, value_name = "DIR")]
    pub repo_dir: Option<PathBuf>,

    /// Data directory (relative to the repository root unless absolute)
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Run identifier override (defaults to the current quarter, e.g. 2026Q4)
    #[arg(long, value_name = "QUARTER")]
    pub quarter: Option<String>,

    /// DOAJ search API base URL
    #[arg(long, value_name = "URL", env = "DOAJ_BASE_URL")]
    pub base_url: Option<String>,

    /// Journals requested per page
    #[arg(long, value_name = "COUNT")]
    pub page_size: Option<usize>,

    /// Pause between page requests in milliseconds
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .doajtally.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.enable_git && !self.enable_save {
            return Err("--enable-git requires --enable-save".to_string());
        }

        if self.limit == 0 {
            return Err("Limit must be at least 1".to_string());
        }

        if let Some(page_size) = self.page_size {
            if page_size == 0 {
                return Err("Page size must be at least 1".to_string());
            }
        }

        if let Some(ref url) = self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
