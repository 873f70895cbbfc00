//! License aggregation and statistics.
//!
//! This module accumulates qualifying journals into the four count tables
//! (license, subject, language, year) and flattens them into ordered rows
//! for the report writers.

use crate::analysis::languages::language_name;
use crate::models::{LicenseCategory, RawRecord, SubjectKey, UNKNOWN_YEAR};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::hash::Hash;

/// Two-level counter: license category, then a secondary key.
///
/// Both levels iterate in first-seen order so output is deterministic for a
/// given input sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterTable<K: Hash + Eq> {
    counts: IndexMap<LicenseCategory, IndexMap<K, u64>>,
}

impl<K: Hash + Eq> Default for CounterTable<K> {
    fn default() -> Self {
        Self {
            counts: IndexMap::new(),
        }
    }
}

impl<K: Hash + Eq> CounterTable<K> {
    pub fn increment(&mut self, category: LicenseCategory, key: K) {
        *self
            .counts
            .entry(category)
            .or_default()
            .entry(key)
            .or_insert(0) += 1;
    }

    #[cfg(test)]
    pub fn get<Q>(&self, category: LicenseCategory, key: &Q) -> u64
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.counts
            .get(&category)
            .and_then(|inner| inner.get(key))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of all secondary buckets for one category.
    #[cfg(test)]
    pub fn total(&self, category: LicenseCategory) -> u64 {
        self.counts
            .get(&category)
            .map(|inner| inner.values().sum())
            .unwrap_or(0)
    }

    /// Iterate `(category, key, count)` triples in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (LicenseCategory, &K, u64)> + '_ {
        self.counts
            .iter()
            .flat_map(|(category, inner)| inner.iter().map(move |(k, c)| (*category, k, *c)))
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// All counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tables {
    pub license: IndexMap<LicenseCategory, u64>,
    pub subject: CounterTable<SubjectKey>,
    pub language: CounterTable<String>,
    pub year: CounterTable<String>,
    /// Journals per category that contributed at least one subject.
    pub subject_coverage: IndexMap<LicenseCategory, u64>,
    /// Journals per category that contributed at least one language.
    pub language_coverage: IndexMap<LicenseCategory, u64>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn license_count(&self, category: LicenseCategory) -> u64 {
        self.license.get(&category).copied().unwrap_or(0)
    }

    /// Journals in `category` with at least one subject.
    pub fn subjects_covered(&self, category: LicenseCategory) -> u64 {
        self.subject_coverage.get(&category).copied().unwrap_or(0)
    }

    /// Journals in `category` with at least one language.
    pub fn languages_covered(&self, category: LicenseCategory) -> u64 {
        self.language_coverage.get(&category).copied().unwrap_or(0)
    }

    /// Number of journals counted across all categories.
    pub fn total_licensed(&self) -> u64 {
        self.license.values().sum()
    }
}

/// Count one qualifying journal into every table.
///
/// Subjects and languages repeated on the same journal are counted once.
/// Missing data on one dimension never blocks the others: subjects and
/// languages simply contribute nothing, the year falls back to `Unknown`.
pub fn accumulate(category: LicenseCategory, record: &RawRecord, tables: &mut Tables) {
    *tables.license.entry(category).or_insert(0) += 1;

    let subjects: IndexSet<SubjectKey> = record.subjects().collect();
    if !subjects.is_empty() {
        *tables.subject_coverage.entry(category).or_insert(0) += 1;
    }
    for subject in subjects {
        tables.subject.increment(category, subject);
    }

    let year = record.oa_start().unwrap_or_else(|| UNKNOWN_YEAR.to_string());
    tables.year.increment(category, year);

    let languages: IndexSet<String> = record.languages().collect();
    if !languages.is_empty() {
        *tables.language_coverage.entry(category).or_insert(0) += 1;
    }
    for language in languages {
        tables.language.increment(category, language);
    }
}

/// Row of the license count table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LicenseRow {
    pub tool_identifier: String,
    pub count: u64,
}

/// Row of the subject report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SubjectRow {
    pub tool_identifier: String,
    pub subject_code: String,
    pub subject_label: String,
    pub count: u64,
}

/// Row of the language table, with the display name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LanguageRow {
    pub tool_identifier: String,
    pub language_code: String,
    pub language: String,
    pub count: u64,
}

/// Row of the year table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct YearRow {
    pub tool_identifier: String,
    pub year: String,
    pub count: u64,
}

pub fn license_rows(tables: &Tables) -> Vec<LicenseRow> {
    tables
        .license
        .iter()
        .map(|(category, count)| LicenseRow {
            tool_identifier: category.label().to_string(),
            count: *count,
        })
        .collect()
}

pub fn subject_rows(tables: &Tables) -> Vec<SubjectRow> {
    tables
        .subject
        .iter()
        .map(|(category, subject, count)| SubjectRow {
            tool_identifier: category.label().to_string(),
            subject_code: subject.code.clone(),
            subject_label: subject.label.clone(),
            count,
        })
        .collect()
}

pub fn language_rows(tables: &Tables) -> Vec<LanguageRow> {
    tables
        .language
        .iter()
        .map(|(category, code, count)| LanguageRow {
            tool_identifier: category.label().to_string(),
            language_code: code.clone(),
            language: language_name(code).to_string(),
            count,
        })
        .collect()
}

pub fn year_rows(tables: &Tables) -> Vec<YearRow> {
    tables
        .year
        .iter()
        .map(|(category, year, count)| YearRow {
            tool_identifier: category.label().to_string(),
            year: year.clone(),
            count,
        })
        .collect()
}

/// Categories ranked by journal count (highest first, ties in first-seen order).
pub fn top_licenses(tables: &Tables, n: usize) -> Vec<(LicenseCategory, u64)> {
    let mut ranked: Vec<_> = tables.license.iter().map(|(c, count)| (*c, *count)).collect();
    ranked.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
    ranked.truncate(n);
    ranked
}

/// Generate a text summary of the license table.
///
/// Each category line also says how many of its journals listed at least
/// one subject and one language.
pub fn generate_summary_text(tables: &Tables) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Total licensed journals: {}", tables.total_licensed()));
    for (category, count) in top_licenses(tables, LicenseCategory::ALL.len()) {
        lines.push(format!(
            "- {}: {} (with subjects: {}, with languages: {})",
            category,
            count,
            tables.subjects_covered(category),
            tables.languages_covered(category)
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn journal(bibjson: Value) -> RawRecord {
        RawRecord::from_value(json!({ "bibjson": bibjson })).unwrap()
    }

    #[test]
    fn test_accumulate_full_record() {
        let mut tables = Tables::new();
        let rec = journal(json!({
            "subject": [{ "code": "QA", "term": "Mathematics" }],
            "language": ["EN", "FR"],
            "oa_start": 2010
        }));

        accumulate(LicenseCategory::By, &rec, &mut tables);

        assert_eq!(tables.license_count(LicenseCategory::By), 1);
        assert_eq!(tables.subject.get(LicenseCategory::By, &SubjectKey::new("QA", "Mathematics")), 1);
        assert_eq!(tables.language.get(LicenseCategory::By, "EN"), 1);
        assert_eq!(tables.language.get(LicenseCategory::By, "FR"), 1);
        assert_eq!(tables.year.get(LicenseCategory::By, "2010"), 1);
    }

    #[test]
    fn test_missing_year_goes_to_unknown() {
        let mut tables = Tables::new();
        accumulate(LicenseCategory::Cc0, &journal(json!({})), &mut tables);

        assert_eq!(tables.year.get(LicenseCategory::Cc0, UNKNOWN_YEAR), 1);
        assert_eq!(tables.year.total(LicenseCategory::Cc0), 1);
    }

    #[test]
    fn test_missing_subjects_add_no_bucket() {
        let mut tables = Tables::new();
        accumulate(LicenseCategory::Cc0, &journal(json!({ "language": [] })), &mut tables);

        assert!(tables.subject.is_empty());
        assert!(tables.language.is_empty());
        assert_eq!(tables.license_count(LicenseCategory::Cc0), 1);
        assert!(tables.subject_coverage.is_empty());
    }

    #[test]
    fn test_repeated_entries_count_once_per_record() {
        let mut tables = Tables::new();
        let rec = journal(json!({
            "subject": [
                { "code": "R", "term": "Medicine" },
                { "code": "R", "term": "Medicine" }
            ],
            "language": ["EN", "en", "EN"]
        }));

        accumulate(LicenseCategory::ByNc, &rec, &mut tables);

        assert_eq!(tables.subject.get(LicenseCategory::ByNc, &SubjectKey::new("R", "Medicine")), 1);
        assert_eq!(tables.language.get(LicenseCategory::ByNc, "EN"), 1);
    }

    #[test]
    fn test_year_total_matches_license_total() {
        let mut tables = Tables::new();
        let records = [
            journal(json!({ "oa_start": 2001 })),
            journal(json!({ "oa_start": "2001" })),
            journal(json!({})),
            journal(json!({ "subject": [{ "code": "Q", "term": "Science" }] })),
        ];
        for rec in &records {
            accumulate(LicenseCategory::BySa, rec, &mut tables);
        }

        let license = tables.license_count(LicenseCategory::BySa);
        assert_eq!(license, 4);
        assert_eq!(tables.year.total(LicenseCategory::BySa), license);
        assert_eq!(tables.year.get(LicenseCategory::BySa, "2001"), 2);
        assert!(tables.subject_coverage[&LicenseCategory::BySa] <= license);
    }

    #[test]
    fn test_rows_keep_first_seen_order() {
        let mut tables = Tables::new();
        accumulate(LicenseCategory::ByNd, &journal(json!({ "language": ["ZZ"] })), &mut tables);
        accumulate(LicenseCategory::By, &journal(json!({ "language": ["EN"] })), &mut tables);
        accumulate(LicenseCategory::ByNd, &journal(json!({ "language": ["EN"] })), &mut tables);

        let rows = license_rows(&tables);
        assert_eq!(rows[0].tool_identifier, "CC BY-ND");
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[1].tool_identifier, "CC BY");

        let langs = language_rows(&tables);
        assert_eq!(langs.len(), 3);
        assert_eq!(langs[0].language_code, "ZZ");
        assert_eq!(langs[0].language, "ZZ");
        assert_eq!(langs[1].tool_identifier, "CC BY-ND");
        assert_eq!(langs[1].language, "English");
        assert_eq!(langs[2].tool_identifier, "CC BY");
    }

    #[test]
    fn test_subject_rows_split_code_and_label() {
        let mut tables = Tables::new();
        let rec = journal(json!({ "subject": [{ "code": "H1-99", "term": "Social sciences (General)" }] }));
        accumulate(LicenseCategory::ByNcSa, &rec, &mut tables);

        let rows = subject_rows(&tables);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].subject_code, "H1-99");
        assert_eq!(rows[0].subject_label, "Social sciences (General)");
    }

    #[test]
    fn test_top_licenses() {
        let mut tables = Tables::new();
        for category in [LicenseCategory::Cc0, LicenseCategory::By, LicenseCategory::By] {
            accumulate(category, &journal(json!({})), &mut tables);
        }

        let top = top_licenses(&tables, 1);
        assert_eq!(top, vec![(LicenseCategory::By, 2)]);
        assert!(generate_summary_text(&tables).contains("Total licensed journals: 3"));
    }

    #[test]
    fn test_summary_reports_coverage() {
        let mut tables = Tables::new();
        let full = journal(json!({
            "subject": [{ "code": "QA", "term": "Mathematics" }, { "code": "QC", "term": "Physics" }],
            "language": ["EN", "DE"]
        }));
        let languages_only = journal(json!({ "language": ["ES"] }));
        accumulate(LicenseCategory::By, &full, &mut tables);
        accumulate(LicenseCategory::By, &languages_only, &mut tables);
        accumulate(LicenseCategory::Cc0, &journal(json!({})), &mut tables);

        assert_eq!(tables.subjects_covered(LicenseCategory::By), 1);
        assert_eq!(tables.languages_covered(LicenseCategory::By), 2);
        assert_eq!(tables.languages_covered(LicenseCategory::Cc0), 0);
        assert!(tables.languages_covered(LicenseCategory::By) <= tables.license_count(LicenseCategory::By));

        let summary = generate_summary_text(&tables);
        assert!(summary.contains("- CC BY: 2 (with subjects: 1, with languages: 2)"));
        assert!(summary.contains("- CC0: 1 (with subjects: 0, with languages: 0)"));
    }
}
