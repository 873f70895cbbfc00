//! Data models for the DOAJ tally.
//!
//! This module contains the core data structures shared by the fetch,
//! analysis and report stages: raw journal records, license categories,
//! aggregation keys and the run summary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Creative Commons license category recognized in DOAJ license metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LicenseCategory {
    #[serde(rename = "CC BY")]
    By,
    #[serde(rename = "CC BY-NC")]
    ByNc,
    #[serde(rename = "CC BY-SA")]
    BySa,
    #[serde(rename = "CC BY-ND")]
    ByNd,
    #[serde(rename = "CC BY-NC-SA")]
    ByNcSa,
    #[serde(rename = "CC BY-NC-ND")]
    ByNcNd,
    #[serde(rename = "CC0")]
    Cc0,
    /// Catch-all for license metadata that names no recognized tool.
    #[serde(rename = "UNKNOWN CC legal tool")]
    UnknownLegalTool,
}

impl LicenseCategory {
    /// Every category, in the order DOAJ documents them.
    pub const ALL: [LicenseCategory; 8] = [
        LicenseCategory::By,
        LicenseCategory::ByNc,
        LicenseCategory::BySa,
        LicenseCategory::ByNd,
        LicenseCategory::ByNcSa,
        LicenseCategory::ByNcNd,
        LicenseCategory::Cc0,
        LicenseCategory::UnknownLegalTool,
    ];

    /// The label used both in the DOAJ `type` field and in output files.
    pub fn label(&self) -> &'static str {
        match self {
            LicenseCategory::By => "CC BY",
            LicenseCategory::ByNc => "CC BY-NC",
            LicenseCategory::BySa => "CC BY-SA",
            LicenseCategory::ByNd => "CC BY-ND",
            LicenseCategory::ByNcSa => "CC BY-NC-SA",
            LicenseCategory::ByNcNd => "CC BY-NC-ND",
            LicenseCategory::Cc0 => "CC0",
            LicenseCategory::UnknownLegalTool => "UNKNOWN CC legal tool",
        }
    }

    /// Exact-match lookup of a license `type` string.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl fmt::Display for LicenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Subject classification key: a code plus its human-readable term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectKey {
    pub code: String,
    pub label: String,
}

impl SubjectKey {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.code, self.label)
    }
}

/// Year bucket used when a journal has no open-access start year.
pub const UNKNOWN_YEAR: &str = "Unknown";

/// One journal object from the DOAJ `results` array.
///
/// The API shape is not under our control, so the record keeps the raw JSON
/// map and exposes checked accessors for the fields the tally reads. All of
/// them live under the `bibjson` object:
///
/// - `license`: array of descriptors, each with an optional string `type`
/// - `subject`: array of objects with optional `code` and `term`
/// - `language`: array of language code strings
/// - `oa_start`: open-access start year, integer or string
///
/// A field with an unexpected JSON type is treated as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Map<String, Value>,
}

impl RawRecord {
    /// Wrap a JSON value; `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Top-level field lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The nested `bibjson` object, if present.
    pub fn bibjson(&self) -> Option<&Map<String, Value>> {
        self.get("bibjson").and_then(Value::as_object)
    }

    fn bibjson_array(&self, key: &str) -> Option<&Vec<Value>> {
        self.bibjson()?.get(key)?.as_array()
    }

    /// License descriptors. `None` when absent or not an array.
    pub fn license_info(&self) -> Option<&[Value]> {
        self.bibjson_array("license").map(Vec::as_slice)
    }

    /// Subject entries that carry both a non-empty code and term.
    pub fn subjects(&self) -> impl Iterator<Item = SubjectKey> + '_ {
        self.bibjson_array("subject")
            .into_iter()
            .flatten()
            .filter_map(|subject| {
                let code = non_empty_str(subject.get("code"))?;
                let term = non_empty_str(subject.get("term"))?;
                Some(SubjectKey::new(code, term))
            })
    }

    /// Language codes, trimmed and upper-cased. Non-string entries are skipped.
    pub fn languages(&self) -> impl Iterator<Item = String> + '_ {
        self.bibjson_array("language")
            .into_iter()
            .flatten()
            .filter_map(|lang| non_empty_str(Some(lang)))
            .map(|code| code.to_uppercase())
    }

    /// Open-access start year rendered as text, if it carries a value.
    pub fn oa_start(&self) -> Option<String> {
        match self.bibjson()?.get("oa_start")? {
            Value::Number(n) if n.as_i64() != Some(0) => Some(n.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Outcome of one run, fixed once the pipeline has finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Journals handed out by the paginator, qualifying or not.
    pub fetched: usize,
    /// Qualifying journals counted into the tables.
    pub processed: usize,
    /// Budget applied to this run.
    pub limit: usize,
    pub note: String,
}

impl RunSummary {
    pub fn new(fetched: usize, processed: usize, limit: usize, note: impl Into<String>) -> Self {
        Self {
            fetched,
            processed,
            limit,
            note: note.into(),
        }
    }
}
