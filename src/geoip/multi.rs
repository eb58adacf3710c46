//! Primary + supplementary resolution with a fixed priority rule.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use super::reader::GeoResolve;
use super::region::{region_field, RegionMatcher};
use crate::error_handling::{FailureType, InfoType, ProcessingStats, ScanError};

/// Which source produced a [`Resolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionSource {
    /// Primary record with a region field.
    Primary,
    /// Primary lacked a region; the supplementary record confirmed a match.
    SupplementConfirmed,
    /// Primary lacked a region and nothing confirmed it.
    PrimaryIncomplete,
    /// Primary had no structured record; the supplementary one is used as is.
    SupplementFallback,
    /// Neither source knows the address.
    Unresolved,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResolutionSource::Primary => "primary",
            ResolutionSource::SupplementConfirmed => "supplement_confirmed",
            ResolutionSource::PrimaryIncomplete => "primary_incomplete",
            ResolutionSource::SupplementFallback => "supplement_fallback",
            ResolutionSource::Unresolved => "unresolved",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub record: Option<String>,
    pub source: ResolutionSource,
}

/// Resolves addresses against a primary index and an optional supplement.
///
/// The supplement never contradicts a primary record that names a region;
/// it can only confirm a match when the primary's region field is empty, or
/// stand in when the primary has no record or an unstructured one (no `|`).
pub struct MultiSourceResolver {
    primary: Arc<dyn GeoResolve>,
    supplementary: Option<Arc<dyn GeoResolve>>,
    matcher: RegionMatcher,
    stats: Arc<ProcessingStats>,
}

impl MultiSourceResolver {
    pub fn new(
        primary: Arc<dyn GeoResolve>,
        supplementary: Option<Arc<dyn GeoResolve>>,
        matcher: RegionMatcher,
    ) -> Self {
        MultiSourceResolver {
            primary,
            supplementary,
            matcher,
            stats: Arc::new(ProcessingStats::new()),
        }
    }

    /// Records lookup failures and confirmations in `stats`.
    pub fn with_stats(mut self, stats: Arc<ProcessingStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn matcher(&self) -> &RegionMatcher {
        &self.matcher
    }

    pub fn has_supplementary(&self) -> bool {
        self.supplementary.is_some()
    }

    fn lookup(&self, source: &dyn GeoResolve, ip: Ipv4Addr, label: &str) -> Option<String> {
        match source.search(ip) {
            Ok(record) => record,
            Err(e) => {
                log::debug!("{} lookup failed for {}: {}", label, ip, e);
                self.stats.increment_failure(FailureType::SampleLookupError);
                None
            }
        }
    }

    fn lookup_supplementary(&self, ip: Ipv4Addr) -> Option<String> {
        self.supplementary
            .as_deref()
            .and_then(|source| self.lookup(source, ip, "supplementary"))
    }

    pub fn resolve(&self, ip: Ipv4Addr) -> Resolution {
        let primary = self
            .lookup(self.primary.as_ref(), ip, "primary")
            .filter(|record| record.contains('|'));
        let Some(primary) = primary else {
            return match self.lookup_supplementary(ip) {
                Some(record) => Resolution {
                    record: Some(record),
                    source: ResolutionSource::SupplementFallback,
                },
                None => Resolution {
                    record: None,
                    source: ResolutionSource::Unresolved,
                },
            };
        };

        if region_field(&primary).is_some() {
            return Resolution {
                record: Some(primary),
                source: ResolutionSource::Primary,
            };
        }

        match self.lookup_supplementary(ip) {
            Some(record) if self.matcher.matches(&record) => {
                self.stats.increment_info(InfoType::SupplementConfirmation);
                Resolution {
                    record: Some(record),
                    source: ResolutionSource::SupplementConfirmed,
                }
            }
            _ => Resolution {
                record: Some(primary),
                source: ResolutionSource::PrimaryIncomplete,
            },
        }
    }

    /// True when the resolved record names the target region and operator.
    pub fn is_match(&self, ip: Ipv4Addr) -> bool {
        self.resolve(ip)
            .record
            .is_some_and(|record| self.matcher.matches(&record))
    }
}

impl GeoResolve for MultiSourceResolver {
    fn search(&self, ip: Ipv4Addr) -> Result<Option<String>, ScanError> {
        Ok(self.resolve(ip).record)
    }
}
