//! Per-run provenance record.

use crate::models::RunSummary;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Note recorded with every run.
pub const PROVENANCE_NOTE: &str =
    "Articles not processed - DOAJ API doesn't provide license info for articles";

/// What was fetched, how much was counted and under which run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Always zero: article records carry no license data.
    pub total_articles_fetched: usize,
    pub total_journals_fetched: usize,
    pub total_processed: usize,
    pub limit: usize,
    pub quarter: String,
    pub script: String,
    pub note: String,
}

impl Provenance {
    pub fn new(summary: &RunSummary, quarter: &str, script: &str) -> Self {
        Self {
            total_articles_fetched: 0,
            total_journals_fetched: summary.fetched,
            total_processed: summary.processed,
            limit: summary.limit,
            quarter: quarter.to_string(),
            script: script.to_string(),
            note: summary.note.clone(),
        }
    }
}

/// Write the provenance YAML, replacing any earlier record for the quarter.
///
/// Without `create_dirs` the record is only written into a directory that
/// already exists; `Ok(false)` means it was skipped.
pub fn write_provenance(path: &Path, provenance: &Provenance, create_dirs: bool) -> Result<bool> {
    if !create_dirs && !path.parent().is_some_and(Path::is_dir) {
        info!(
            "Skipping provenance: {} does not exist (saving disabled)",
            path.parent().unwrap_or(path).display()
        );
        return Ok(false);
    }

    let yaml = serde_yaml::to_string(provenance).context("Failed to serialize provenance")?;
    super::write_atomic(path, yaml.as_bytes())?;
    info!("Wrote provenance to {}", path.display());
    Ok(true)
}
