//! Run identifier and on-disk layout.
//!
//! Output lives under `<data_dir>/<quarter>/1-fetch/`, where the quarter
//! (for example `2026Q4`) identifies the run.

use chrono::{Datelike, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the fetch phase directory.
pub const FETCH_PHASE: &str = "1-fetch";

/// Calendar quarter label for a date, e.g. `2026Q4`.
pub fn quarter_of(date: NaiveDate) -> String {
    format!("{}Q{}", date.year(), (date.month0() / 3) + 1)
}

/// Quarter label for today (UTC).
pub fn current_quarter() -> String {
    quarter_of(Utc::now().date_naive())
}

/// Resolved locations for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    /// Root of the git working tree that holds the data.
    pub repo: PathBuf,
    pub data: PathBuf,
    pub quarter: String,
    pub data_quarter: PathBuf,
    pub fetch: PathBuf,
}

impl DataPaths {
    /// Resolve paths. A relative `data_dir` is taken relative to `repo`.
    pub fn new(repo: &Path, data_dir: &Path, quarter: impl Into<String>) -> Self {
        let quarter = quarter.into();
        let data = if data_dir.is_absolute() {
            data_dir.to_path_buf()
        } else {
            repo.join(data_dir)
        };
        let data_quarter = data.join(&quarter);
        let fetch = data_quarter.join(FETCH_PHASE);

        Self {
            repo: repo.to_path_buf(),
            data,
            quarter,
            data_quarter,
            fetch,
        }
    }

    pub fn count_file(&self) -> PathBuf {
        self.fetch.join("doaj_1_count.csv")
    }

    pub fn subject_file(&self) -> PathBuf {
        self.fetch.join("doaj_2_count_by_subject_report.csv")
    }

    pub fn language_file(&self) -> PathBuf {
        self.fetch.join("doaj_3_count_by_language.csv")
    }

    pub fn year_file(&self) -> PathBuf {
        self.fetch.join("doaj_4_count_by_year.csv")
    }

    pub fn provenance_file(&self) -> PathBuf {
        self.fetch.join("doaj_provenance.yaml")
    }

    /// Log the resolved layout, relative to the repository root where possible.
    pub fn log(&self) {
        let relative = |p: &Path| {
            p.strip_prefix(&self.repo)
                .map(|r| format!("./{}", r.display()))
                .unwrap_or_else(|_| p.display().to_string())
        };
        info!("PATHS:");
        info!("    repo: {}", self.repo.display());
        info!("        data:           {}", relative(&self.data));
        info!("        data_quarter:   {}", relative(&self.data_quarter));
        info!("        data_1-fetch:   {}", relative(&self.fetch));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_boundaries() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(quarter_of(d(2026, 1, 1)), "2026Q1");
        assert_eq!(quarter_of(d(2026, 3, 31)), "2026Q1");
        assert_eq!(quarter_of(d(2026, 4, 1)), "2026Q2");
        assert_eq!(quarter_of(d(2026, 9, 30)), "2026Q3");
        assert_eq!(quarter_of(d(2026, 10, 16)), "2026Q4");
        assert_eq!(quarter_of(d(2026, 12, 31)), "2026Q4");
    }

    #[test]
    fn test_layout() {
        let paths = DataPaths::new(Path::new("/repo"), Path::new("data"), "2025Q2");
        assert_eq!(paths.data, PathBuf::from("/repo/data"));
        assert_eq!(paths.fetch, PathBuf::from("/repo/data/2025Q2/1-fetch"));
        assert_eq!(
            paths.count_file(),
            PathBuf::from("/repo/data/2025Q2/1-fetch/doaj_1_count.csv")
        );
        assert_eq!(
            paths.provenance_file(),
            PathBuf::from("/repo/data/2025Q2/1-fetch/doaj_provenance.yaml")
        );
    }

    #[test]
    fn test_absolute_data_dir() {
        let paths = DataPaths::new(Path::new("/repo"), Path::new("/srv/data"), "2025Q2");
        assert_eq!(paths.data_quarter, PathBuf::from("/srv/data/2025Q2"));
    }
}
