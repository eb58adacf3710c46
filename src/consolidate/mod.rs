//! CIDR consolidation.
//!
//! Merging must never change the set of covered addresses. A generic
//! collapse is tried first and accepted only if the covered ranges are
//! identical before and after; otherwise a conservative pass that only joins
//! exact sibling halves runs to a fixed point.

mod summary;

use ipnet::Ipv4Net;

use crate::prefix::{address_ranges, Prefix};

pub use summary::MergeSummary;

/// Consolidates `prefixes` with [`Ipv4Net::aggregate`] as the generic collapse.
///
/// # Examples
///
/// ```
/// use asn_region_scan::consolidate::merge;
/// use asn_region_scan::Prefix;
///
/// let halves: Vec<Prefix> = vec!["1.2.0.0/24".parse().unwrap(), "1.2.1.0/24".parse().unwrap()];
/// let parent: Prefix = "1.2.0.0/23".parse().unwrap();
/// assert_eq!(merge(&halves), vec![parent]);
/// ```
pub fn merge(prefixes: &[Prefix]) -> Vec<Prefix> {
    merge_with(prefixes, aggregate)
}

fn aggregate(prefixes: &[Prefix]) -> Vec<Prefix> {
    let nets: Vec<Ipv4Net> = prefixes.iter().map(Prefix::as_net).collect();
    Ipv4Net::aggregate(&nets).into_iter().map(Prefix::from).collect()
}

/// Consolidates `prefixes` using `collapse` as the fast path.
///
/// The collapsed output is used only when it covers exactly the input's
/// addresses and is no longer than the deduplicated input.
pub fn merge_with<F>(prefixes: &[Prefix], collapse: F) -> Vec<Prefix>
where
    F: FnOnce(&[Prefix]) -> Vec<Prefix>,
{
    let mut sorted = prefixes.to_vec();
    sorted.sort();
    sorted.dedup();
    if sorted.len() < 2 {
        return sorted;
    }

    let mut collapsed = collapse(&sorted);
    collapsed.sort();
    collapsed.dedup();
    if collapsed.len() <= sorted.len() && address_ranges(&collapsed) == address_ranges(&sorted) {
        return collapsed;
    }

    log::debug!(
        "Generic collapse changed coverage ({} -> {} blocks), merging siblings only",
        sorted.len(),
        collapsed.len()
    );
    merge_siblings(sorted)
}

/// Joins exact sibling pairs into their parent until a full pass joins none.
///
/// `prefixes` must be sorted and free of duplicates.
pub fn merge_siblings(mut prefixes: Vec<Prefix>) -> Vec<Prefix> {
    loop {
        let (next, merged_any) = sibling_pass(&prefixes);
        if !merged_any {
            return next;
        }
        prefixes = next;
    }
}

fn sibling_pass(prefixes: &[Prefix]) -> (Vec<Prefix>, bool) {
    let mut out = Vec::with_capacity(prefixes.len());
    let mut merged_any = false;
    let mut i = 0;
    while i < prefixes.len() {
        let current = prefixes[i];
        if let Some(parent) = prefixes.get(i + 1).and_then(|next| parent_of_pair(current, *next)) {
            out.push(parent);
            merged_any = true;
            i += 2;
        } else {
            out.push(current);
            i += 1;
        }
    }
    out.sort();
    out.dedup();
    (out, merged_any)
}

/// The parent of `lower` and `upper` when they are exactly its two halves.
fn parent_of_pair(lower: Prefix, upper: Prefix) -> Option<Prefix> {
    if lower.len() != upper.len() {
        return None;
    }
    let parent = lower.supernet()?;
    (parent.halves()? == (lower, upper)).then_some(parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefix::covered_addresses;
    use proptest::prelude::*;

    fn p(s: &str) -> Prefix {
        s.parse().expect("prefix")
    }

    fn ps(items: &[&str]) -> Vec<Prefix> {
        items.iter().map(|s| p(s)).collect()
    }

    /// A collapse that rounds everything up to its /16, like an over-eager
    /// summarizer.
    fn widen_to_16(prefixes: &[Prefix]) -> Vec<Prefix> {
        prefixes
            .iter()
            .map(|prefix| Prefix::new(prefix.network(), 16).expect("prefix"))
            .collect()
    }

    #[test]
    fn test_exact_siblings_merge() {
        assert_eq!(merge(&ps(&["1.2.0.0/24", "1.2.1.0/24"])), ps(&["1.2.0.0/23"]));
    }

    #[test]
    fn test_non_adjacent_kept() {
        let input = ps(&["1.2.0.0/24", "1.2.2.0/24"]);
        assert_eq!(merge(&input), input);
    }

    #[test]
    fn test_adjacent_but_not_siblings_kept() {
        // 1.2.1.0/24 and 1.2.2.0/24 touch but belong to different /23s
        let input = ps(&["1.2.1.0/24", "1.2.2.0/24"]);
        assert_eq!(merge(&input), input);
        assert_eq!(merge_siblings(input.clone()), input);
    }

    #[test]
    fn test_cascading_merge() {
        let input = ps(&["10.0.0.0/24", "10.0.1.0/24", "10.0.2.0/24", "10.0.3.0/24"]);
        assert_eq!(merge(&input), ps(&["10.0.0.0/22"]));
        assert_eq!(merge_siblings(input), ps(&["10.0.0.0/22"]));
    }

    #[test]
    fn test_duplicates_and_empty() {
        assert!(merge(&[]).is_empty());
        assert_eq!(merge(&ps(&["8.8.8.0/24", "8.8.8.0/24"])), ps(&["8.8.8.0/24"]));
    }

    #[test]
    fn test_expanding_collapse_is_rejected() {
        let input = ps(&["10.1.0.0/24", "10.1.1.0/24", "10.1.4.0/24"]);
        let merged = merge_with(&input, widen_to_16);
        assert_eq!(merged, ps(&["10.1.0.0/23", "10.1.4.0/24"]));
        assert_eq!(covered_addresses(&merged), covered_addresses(&input));
    }

    #[test]
    fn test_fixed_point_with_uneven_lengths() {
        // The /25 pair joins first, then its /24 joins the neighbour.
        let input = ps(&["10.0.0.0/24", "10.0.1.0/25", "10.0.1.128/25"]);
        assert_eq!(merge_siblings(input.clone()), ps(&["10.0.0.0/23"]));
        assert_eq!(merge_with(&input, widen_to_16), ps(&["10.0.0.0/23"]));
    }

    fn prefix_set() -> impl Strategy<Value = Vec<Prefix>> {
        prop::collection::vec((0u32..4096, 20u8..=28), 0..40).prop_map(|items| {
            items
                .into_iter()
                .map(|(offset, len)| {
                    Prefix::from_u32(0x0A00_0000 | (offset << 8), len).expect("prefix")
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn test_merge_preserves_coverage(input in prefix_set()) {
            let merged = merge(&input);
            prop_assert_eq!(address_ranges(&merged), address_ranges(&input));
            prop_assert!(merged.len() <= input.len());
        }

        #[test]
        fn test_conservative_fallback_preserves_coverage(input in prefix_set()) {
            let merged = merge_with(&input, widen_to_16);
            prop_assert_eq!(covered_addresses(&merged), covered_addresses(&input));
            prop_assert!(merged.len() <= input.len());
        }
    }
}
