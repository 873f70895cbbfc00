//! CSV count files.
//!
//! One file per aggregation dimension, each with a fixed header. Fields are
//! always quoted and lines end in `\n`.

use crate::analysis::{language_rows, license_rows, subject_rows, year_rows, Tables};
use crate::paths::DataPaths;
use anyhow::{Context, Result};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const HEADER_COUNT: [&str; 2] = ["TOOL_IDENTIFIER", "COUNT"];
pub const HEADER_SUBJECT_REPORT: [&str; 4] =
    ["TOOL_IDENTIFIER", "SUBJECT_CODE", "SUBJECT_LABEL", "COUNT"];
pub const HEADER_LANGUAGE: [&str; 4] = ["TOOL_IDENTIFIER", "LANGUAGE_CODE", "LANGUAGE", "COUNT"];
pub const HEADER_YEAR: [&str; 3] = ["TOOL_IDENTIFIER", "YEAR", "COUNT"];

/// The four count files of one run.
#[derive(Debug, Clone)]
pub struct CountFiles {
    pub count: PathBuf,
    pub subject: PathBuf,
    pub language: PathBuf,
    pub year: PathBuf,
}

impl CountFiles {
    pub fn new(paths: &DataPaths) -> Self {
        Self {
            count: paths.count_file(),
            subject: paths.subject_file(),
            language: paths.language_file(),
            year: paths.year_file(),
        }
    }

    fn with_headers(&self) -> [(&Path, &[&str]); 4] {
        [
            (self.count.as_path(), &HEADER_COUNT[..]),
            (self.subject.as_path(), &HEADER_SUBJECT_REPORT[..]),
            (self.language.as_path(), &HEADER_LANGUAGE[..]),
            (self.year.as_path(), &HEADER_YEAR[..]),
        ]
    }

    /// Create any missing file with just its header row.
    pub fn initialize(&self) -> Result<()> {
        for (path, header) in self.with_headers() {
            if path.is_file() {
                debug!("Keeping existing {}", path.display());
                continue;
            }
            write_rows::<()>(path, header, &[])?;
        }
        Ok(())
    }

    /// Rewrite every file from the run's tables.
    pub fn write_all(&self, tables: &Tables) -> Result<()> {
        write_rows(&self.count, &HEADER_COUNT, &license_rows(tables))?;
        write_rows(&self.subject, &HEADER_SUBJECT_REPORT, &subject_rows(tables))?;
        write_rows(&self.language, &HEADER_LANGUAGE, &language_rows(tables))?;
        write_rows(&self.year, &HEADER_YEAR, &year_rows(tables))?;
        info!("Saved count files to {}", self.count.parent().unwrap_or(Path::new(".")).display());
        Ok(())
    }
}

/// Render header plus rows in the unix dialect.
pub fn render_rows<R: Serialize>(header: &[&str], rows: &[R]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(header).context("Failed to write CSV header")?;
    for row in rows {
        writer.serialize(row).context("Failed to write CSV row")?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))
}

fn write_rows<R: Serialize>(path: &Path, header: &[&str], rows: &[R]) -> Result<()> {
    let bytes = render_rows(header, rows)?;
    super::write_atomic(path, &bytes)?;
    debug!("Wrote {} row(s) to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::accumulate;
    use crate::models::{LicenseCategory, RawRecord};
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;

    fn files_in(dir: &Path) -> CountFiles {
        CountFiles::new(&DataPaths::new(dir, Path::new("data"), "2026Q4"))
    }

    fn sample_tables() -> Tables {
        let mut tables = Tables::new();
        let rec = RawRecord::from_value(json!({
            "bibjson": {
                "subject": [{ "code": "HB1-3840", "term": "Economic theory. Demography" }],
                "language": ["EN", "XX"],
                "oa_start": 2012
            }
        }))
        .unwrap();
        accumulate(LicenseCategory::ByNc, &rec, &mut tables);
        tables
    }

    #[test]
    fn test_initialize_writes_headers_only() {
        let dir = TempDir::new().unwrap();
        let files = files_in(dir.path());

        files.initialize().unwrap();

        assert_eq!(
            std::fs::read_to_string(&files.count).unwrap(),
            "\"TOOL_IDENTIFIER\",\"COUNT\"\n"
        );
        assert_eq!(
            std::fs::read_to_string(&files.year).unwrap(),
            "\"TOOL_IDENTIFIER\",\"YEAR\",\"COUNT\"\n"
        );
    }

    #[test]
    fn test_initialize_keeps_existing_files() {
        let dir = TempDir::new().unwrap();
        let files = files_in(dir.path());
        files.write_all(&sample_tables()).unwrap();

        files.initialize().unwrap();

        let content = std::fs::read_to_string(&files.count).unwrap();
        assert!(content.contains("\"CC BY-NC\",\"1\""));
    }

    #[test]
    fn test_write_all_rows() {
        let dir = TempDir::new().unwrap();
        let files = files_in(dir.path());

        files.write_all(&sample_tables()).unwrap();

        let subject = std::fs::read_to_string(&files.subject).unwrap();
        assert_eq!(
            subject,
            "\"TOOL_IDENTIFIER\",\"SUBJECT_CODE\",\"SUBJECT_LABEL\",\"COUNT\"\n\
             \"CC BY-NC\",\"HB1-3840\",\"Economic theory. Demography\",\"1\"\n"
        );

        let language = std::fs::read_to_string(&files.language).unwrap();
        let lines: Vec<_> = language.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "\"CC BY-NC\",\"EN\",\"English\",\"1\"");
        assert_eq!(lines[2], "\"CC BY-NC\",\"XX\",\"XX\",\"1\"");

        let year = std::fs::read_to_string(&files.year).unwrap();
        assert!(year.ends_with("\"CC BY-NC\",\"2012\",\"1\"\n"));
    }

    #[test]
    fn test_empty_tables_leave_headers() {
        let dir = TempDir::new().unwrap();
        let files = files_in(dir.path());

        files.write_all(&Tables::new()).unwrap();

        assert_eq!(std::fs::read_to_string(&files.subject).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_render_quotes_embedded_commas() {
        #[derive(Serialize)]
        struct Row {
            a: &'static str,
        }
        let bytes = render_rows(&["A"], &[Row { a: "x, \"y\"" }]).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "\"A\"\n\"x, \"\"y\"\"\"\n");
    }
}
