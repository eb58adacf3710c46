//! Before/after statistics for a consolidation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::prefix::Prefix;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeSummary {
    pub before: usize,
    pub after: usize,
    /// Percentage of blocks removed by merging.
    pub reduction_percent: f64,
    /// Output block count per prefix length.
    pub length_distribution: BTreeMap<u8, usize>,
}

impl MergeSummary {
    pub fn new(input: &[Prefix], merged: &[Prefix]) -> Self {
        let before = input.len();
        let after = merged.len();
        let reduction_percent = if before == 0 {
            0.0
        } else {
            (before.saturating_sub(after)) as f64 * 100.0 / before as f64
        };
        let mut length_distribution = BTreeMap::new();
        for prefix in merged {
            *length_distribution.entry(prefix.len()).or_insert(0) += 1;
        }
        MergeSummary {
            before,
            after,
            reduction_percent,
            length_distribution,
        }
    }
}
