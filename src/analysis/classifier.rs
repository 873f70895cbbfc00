//! License classification of DOAJ journal records.

use crate::models::{LicenseCategory, RawRecord};
use serde_json::Value;

/// Decide whether a record qualifies and under which license category.
///
/// Returns `None` when the record has no license descriptors at all; such
/// journals are skipped. When descriptors exist, the first one whose `type`
/// names a recognized category wins; otherwise the record falls into
/// [`LicenseCategory::UnknownLegalTool`].
pub fn classify(record: &RawRecord) -> Option<LicenseCategory> {
    let descriptors = record.license_info().filter(|d| !d.is_empty())?;

    let category = descriptors
        .iter()
        .filter_map(|descriptor| descriptor.get("type").and_then(Value::as_str))
        .find_map(LicenseCategory::from_label)
        .unwrap_or(LicenseCategory::UnknownLegalTool);

    Some(category)
}
