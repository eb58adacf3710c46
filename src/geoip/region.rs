//! Interpretation of geo records: region fields and region/operator matching.

/// Administrative suffixes dropped before comparing region names.
const REGION_SUFFIXES: [char; 2] = ['省', '市'];

/// Label used when a record carries no region.
pub const UNKNOWN_REGION: &str = "未知";

fn strip_suffixes(text: &str) -> String {
    text.chars().filter(|c| !REGION_SUFFIXES.contains(c)).collect()
}

/// Region field of a pipe-delimited record (`country|region|city|operator`).
///
/// Returns `None` when the record is not pipe-delimited or the field is
/// empty or `"0"`.
pub fn region_field(record: &str) -> Option<&str> {
    if !record.contains('|') {
        return None;
    }
    record
        .split('|')
        .nth(1)
        .map(str::trim)
        .filter(|field| !field.is_empty() && *field != "0")
}

/// Suffix-free region name for reporting, or [`UNKNOWN_REGION`].
pub fn region_label(record: Option<&str>) -> String {
    record
        .and_then(region_field)
        .map(strip_suffixes)
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| UNKNOWN_REGION.to_string())
}

/// Decides whether a record names the target region and operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMatcher {
    region: String,
    operator: String,
}

impl RegionMatcher {
    pub fn new(region: impl AsRef<str>, operator: impl AsRef<str>) -> Self {
        RegionMatcher {
            region: strip_suffixes(region.as_ref().trim()),
            operator: operator.as_ref().trim().to_string(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    /// True when the suffix-normalised record contains both keywords.
    pub fn matches(&self, record: &str) -> bool {
        let normalized = strip_suffixes(record);
        normalized.contains(&self.region) && normalized.contains(&self.operator)
    }
}
