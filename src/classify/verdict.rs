//! Match-confidence verdicts and per-prefix results.

use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::prefix::Prefix;

/// Confidence that a prefix belongs to the target region and operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Every sample matched.
    High,
    /// Some samples matched.
    Medium,
    /// No sample matched.
    None,
}

impl Verdict {
    /// Derives the verdict from `hits` out of `samples` probes.
    pub fn from_hits(hits: usize, samples: usize) -> Self {
        if hits == 0 {
            Verdict::None
        } else if hits == samples {
            Verdict::High
        } else {
            Verdict::Medium
        }
    }

    /// Sort rank, strongest first.
    pub fn rank(self) -> u8 {
        match self {
            Verdict::High => 0,
            Verdict::Medium => 1,
            Verdict::None => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::High => "high",
            Verdict::Medium => "medium",
            Verdict::None => "none",
        }
    }

    pub fn is_positive(self) -> bool {
        self != Verdict::None
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of sampling one prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    #[serde(rename = "cidr")]
    pub prefix: Prefix,
    pub sampled_ips: Vec<Ipv4Addr>,
    pub hits: usize,
    pub samples: usize,
    #[serde(rename = "status")]
    pub verdict: Verdict,
}

impl ClassificationResult {
    pub fn new(prefix: Prefix, sampled_ips: Vec<Ipv4Addr>, hits: usize) -> Self {
        let samples = sampled_ips.len();
        ClassificationResult {
            prefix,
            sampled_ips,
            hits,
            samples,
            verdict: Verdict::from_hits(hits, samples),
        }
    }
}

/// Verdict rank first, then the prefix's textual form.
pub fn result_order(a: &ClassificationResult, b: &ClassificationResult) -> Ordering {
    a.verdict
        .rank()
        .cmp(&b.verdict.rank())
        .then_with(|| a.prefix.to_string().cmp(&b.prefix.to_string()))
}

/// Sorts results strongest first.
pub fn sort_results(results: &mut [ClassificationResult]) {
    results.sort_by(result_order);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(cidr: &str, hits: usize, samples: usize) -> ClassificationResult {
        let prefix: Prefix = cidr.parse().expect("prefix");
        ClassificationResult::new(prefix, vec![prefix.network(); samples], hits)
    }

    #[test]
    fn test_verdict_thresholds() {
        assert_eq!(Verdict::from_hits(0, 3), Verdict::None);
        assert_eq!(Verdict::from_hits(1, 3), Verdict::Medium);
        assert_eq!(Verdict::from_hits(2, 3), Verdict::Medium);
        assert_eq!(Verdict::from_hits(3, 3), Verdict::High);
        assert_eq!(Verdict::from_hits(0, 0), Verdict::None);
        assert_eq!(Verdict::from_hits(1, 1), Verdict::High);
    }

    #[test]
    fn test_sort_by_rank_then_text() {
        let mut results = vec![
            result("9.0.0.0/24", 0, 3),
            result("10.0.0.0/24", 1, 3),
            result("2.0.0.0/24", 3, 3),
            result("100.0.0.0/24", 2, 3),
            result("1.0.0.0/24", 3, 3),
        ];
        sort_results(&mut results);
        let order: Vec<String> = results
            .iter()
            .map(|r| format!("{} {}", r.verdict, r.prefix))
            .collect();
        assert_eq!(
            order,
            vec![
                "high 1.0.0.0/24",
                "high 2.0.0.0/24",
                // textual, not numeric, order
                "medium 10.0.0.0/24",
                "medium 100.0.0.0/24",
                "none 9.0.0.0/24",
            ]
        );
    }

    #[test]
    fn test_result_serializes_with_output_field_names() {
        let value = serde_json::to_value(result("1.2.3.0/24", 2, 3)).expect("json");
        assert_eq!(value["cidr"], "1.2.3.0/24");
        assert_eq!(value["status"], "medium");
        assert_eq!(value["hits"], 2);
        assert_eq!(value["samples"], 3);
        assert_eq!(value["sampled_ips"][0], "1.2.3.0");
    }
}
