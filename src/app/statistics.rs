//! End-of-run statistics.

use std::collections::BTreeMap;

use log::info;
use strum::IntoEnumIterator;

use crate::classify::ClassificationResult;
use crate::consolidate::MergeSummary;
use crate::error_handling::{FailureType, InfoType, ProcessingStats};
use crate::geoip::{region_label, MultiSourceResolver};

/// Prints failure and info counters that are non-zero.
pub fn print_error_statistics(stats: &ProcessingStats) {
    let total_failures = stats.total_failures();
    let total_info = stats.total_info();

    if total_failures > 0 {
        info!("Failure Counts ({} total):", total_failures);
        for failure in FailureType::iter() {
            let count = stats.get_failure_count(failure);
            if count > 0 {
                info!("   {}: {}", failure.as_str(), count);
            }
        }
    }

    if total_info > 0 {
        info!("Info Counts ({} total):", total_info);
        for info_type in InfoType::iter() {
            let count = stats.get_info_count(info_type);
            if count > 0 {
                info!("   {}: {}", info_type.as_str(), count);
            }
        }
    }
}

/// Counts positive prefixes per region of their network address.
///
/// Addresses whose record has no region field count under
/// [`UNKNOWN_REGION`](crate::geoip::UNKNOWN_REGION).
pub fn region_distribution(
    results: &[ClassificationResult],
    resolver: &MultiSourceResolver,
) -> BTreeMap<String, usize> {
    let mut distribution = BTreeMap::new();
    for result in results.iter().filter(|r| r.verdict.is_positive()) {
        let record = resolver.resolve(result.prefix.network()).record;
        *distribution
            .entry(region_label(record.as_deref()))
            .or_insert(0) += 1;
    }
    distribution
}

/// Logs the per-region counts, largest first.
pub fn print_region_statistics(distribution: &BTreeMap<String, usize>) {
    if distribution.is_empty() {
        return;
    }
    let mut rows: Vec<_> = distribution.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    info!("Positive prefixes by region:");
    for (region, count) in rows {
        info!("   {}: {}", region, count);
    }
}

pub fn print_merge_summary(summary: &MergeSummary) {
    info!(
        "Merged {} prefixes into {} ({:.1}% fewer)",
        summary.before, summary.after, summary.reduction_percent
    );
    for (len, count) in &summary.length_distribution {
        info!("   /{}: {}", len, count);
    }
}
