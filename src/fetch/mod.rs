//! Prefix acquisition: ASN → announced IPv4 prefixes.
//!
//! ASNs present in a valid cache are served from it; the rest are fetched
//! concurrently under a semaphore, each request driven by the retry state
//! machine in [`retry`]. Failures never abort the batch: a failed ASN is
//! recorded with an empty prefix list. The cache is persisted once at the end.

mod cache;
mod retry;
mod source;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::FuturesUnordered;
use futures::StreamExt;

use crate::asn::Asn;
use crate::config::Config;
use crate::error_handling::{FailureType, InfoType, ProcessingStats};
use crate::initialization::init_semaphore;
use crate::prefix::Prefix;

// Re-export public API
pub use cache::{is_expired, normalize_prefixes, CacheLoad, CacheStore};
pub use retry::{run_with_retry, AttemptOutcome, RetryPolicy, RetryState, Sleeper, TokioSleeper};
pub use source::{parse_announced_prefixes, AnnouncementSource, ParsedPrefixes};

#[cfg(test)]
pub(crate) use retry::testing::RecordingSleeper;

/// Outcome of acquiring prefixes for a set of ASNs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    /// Sorted, de-duplicated union of the requested ASNs' prefixes.
    pub prefixes: Vec<Prefix>,
    pub cached_asns: Vec<Asn>,
    pub fetched_asns: Vec<Asn>,
    /// ASNs that yielded nothing in this run.
    pub failed_asns: Vec<Asn>,
}

impl AcquisitionReport {
    /// True when some ASNs produced no data but the run completed.
    pub fn is_partial(&self) -> bool {
        !self.failed_asns.is_empty()
    }
}

/// Fetches announced prefixes with bounded concurrency and retries.
pub struct PrefixAcquirer<S: Sleeper = TokioSleeper> {
    source: Arc<AnnouncementSource>,
    policy: RetryPolicy,
    spacing: Duration,
    sleeper: Arc<S>,
    stats: Arc<ProcessingStats>,
}

impl PrefixAcquirer<TokioSleeper> {
    pub fn new(source: AnnouncementSource, stats: Arc<ProcessingStats>) -> Self {
        PrefixAcquirer::with_sleeper(source, stats, TokioSleeper)
    }
}

impl<S: Sleeper + 'static> PrefixAcquirer<S> {
    pub fn with_sleeper(source: AnnouncementSource, stats: Arc<ProcessingStats>, sleeper: S) -> Self {
        PrefixAcquirer {
            source: Arc::new(source),
            policy: RetryPolicy::default(),
            spacing: Duration::ZERO,
            sleeper: Arc::new(sleeper),
            stats,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Minimum delay slept before each polite request.
    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    /// Fetches one ASN. `None` means every attempt failed or the source gave up.
    pub async fn fetch_asn(&self, asn: Asn) -> Option<Vec<Prefix>> {
        fetch_one(
            Arc::clone(&self.source),
            self.policy,
            self.spacing,
            Arc::clone(&self.sleeper),
            Arc::clone(&self.stats),
            asn,
        )
        .await
    }

    /// Resolves `asns` to their prefixes, reading and updating `cache`.
    ///
    /// With `use_cache` false every ASN is fetched; existing entries for
    /// other ASNs are still kept in `cache`. The caller persists the cache.
    pub async fn acquire(
        &self,
        asns: &[Asn],
        cache: &mut CacheStore,
        use_cache: bool,
        concurrency: usize,
    ) -> AcquisitionReport {
        let mut report = AcquisitionReport::default();
        let mut pending = Vec::new();
        for &asn in asns {
            if use_cache && cache.contains(asn) {
                self.stats.increment_info(InfoType::CacheHit);
                report.cached_asns.push(asn);
            } else {
                pending.push(asn);
            }
        }
        log::info!(
            "{} ASNs served from cache, {} to fetch",
            report.cached_asns.len(),
            pending.len()
        );

        let semaphore = init_semaphore(concurrency.max(1));
        let mut tasks = FuturesUnordered::new();
        for asn in pending {
            let semaphore = Arc::clone(&semaphore);
            let source = Arc::clone(&self.source);
            let sleeper = Arc::clone(&self.sleeper);
            let stats = Arc::clone(&self.stats);
            let policy = self.policy;
            let spacing = self.spacing;
            tasks.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    log::warn!("Semaphore closed, skipping AS{}", asn);
                    return (asn, None);
                };
                let prefixes = fetch_one(source, policy, spacing, sleeper, stats, asn).await;
                (asn, prefixes)
            }));
        }

        while let Some(joined) = tasks.next().await {
            match joined {
                Ok((asn, Some(prefixes))) => {
                    cache.insert(asn, &prefixes);
                    report.fetched_asns.push(asn);
                }
                Ok((asn, None)) => {
                    cache.insert(asn, &[]);
                    report.failed_asns.push(asn);
                }
                Err(join_error) => {
                    log::warn!("Prefix fetch task panicked: {:?}", join_error);
                }
            }
        }

        // A task that panicked never reported its ASN.
        for &asn in asns {
            let reported = report.cached_asns.contains(&asn)
                || report.fetched_asns.contains(&asn)
                || report.failed_asns.contains(&asn);
            if !reported {
                cache.insert(asn, &[]);
                report.failed_asns.push(asn);
            }
        }

        let union: BTreeSet<Prefix> = asns
            .iter()
            .filter_map(|&asn| cache.get(asn))
            .flat_map(|prefixes| prefixes.iter().copied())
            .collect();
        report.prefixes = union.into_iter().collect();
        report.cached_asns.sort_unstable();
        report.fetched_asns.sort_unstable();
        report.failed_asns.sort_unstable();
        report.failed_asns.dedup();

        if report.is_partial() {
            log::warn!(
                "{} of {} ASNs yielded no prefixes",
                report.failed_asns.len(),
                asns.len()
            );
        }
        log::info!(
            "Acquired {} unique prefixes from {} ASNs",
            report.prefixes.len(),
            asns.len()
        );
        report
    }
}

async fn fetch_one<S: Sleeper>(
    source: Arc<AnnouncementSource>,
    policy: RetryPolicy,
    spacing: Duration,
    sleeper: Arc<S>,
    stats: Arc<ProcessingStats>,
    asn: Asn,
) -> Option<Vec<Prefix>> {
    let state = run_with_retry(&policy, sleeper.as_ref(), spacing, |attempt| {
        let source = Arc::clone(&source);
        let stats = Arc::clone(&stats);
        async move {
            let (outcome, ipv6_dropped) = source.attempt(asn).await;
            if ipv6_dropped > 0 {
                stats.add_info(InfoType::Ipv6Dropped, ipv6_dropped);
            }
            if let Some(failure) = outcome.failure_type() {
                stats.increment_failure(failure);
            }
            if let Some(error) = outcome.to_error() {
                log::debug!("AS{} attempt {} failed: {}", asn, attempt + 1, error);
            }
            outcome
        }
    })
    .await;

    match state {
        RetryState::Succeeded { prefixes, attempts } => {
            log::info!(
                "AS{}: {} IPv4 prefixes ({} attempt{})",
                asn,
                prefixes.len(),
                attempts,
                if attempts == 1 { "" } else { "s" }
            );
            Some(prefixes)
        }
        RetryState::Exhausted { reason, attempts } => {
            if reason == FailureType::AsnRetriesExhausted {
                stats.increment_failure(FailureType::AsnRetriesExhausted);
            }
            log::warn!("AS{}: giving up after {} attempts ({})", asn, attempts, reason);
            None
        }
        other => {
            log::error!("AS{}: retry loop ended in non-terminal state {:?}", asn, other);
            None
        }
    }
}

/// Loads the cache, acquires prefixes for `asns` and persists the cache.
///
/// A cache that cannot be written is logged and does not fail the run.
pub async fn acquire_prefixes(
    config: &Config,
    client: reqwest::Client,
    asns: &[Asn],
    stats: Arc<ProcessingStats>,
) -> Result<AcquisitionReport> {
    let mut cache = CacheStore::new(&config.cache_path);
    match cache.load().await {
        CacheLoad::Expired => stats.increment_info(InfoType::CacheExpired),
        CacheLoad::Loaded { asns } => log::info!("Loaded prefix cache with {} ASNs", asns),
        CacheLoad::Missing | CacheLoad::Unreadable => {}
    }

    let source = AnnouncementSource::new(client, config.source_url.clone());
    let acquirer = PrefixAcquirer::new(source, stats)
        .with_spacing(Duration::from_millis(config.request_spacing_ms));
    let report = acquirer
        .acquire(asns, &mut cache, config.use_cache, config.fetch_concurrency)
        .await;

    if let Err(e) = cache
        .persist()
        .await
        .with_context(|| format!("Failed to persist prefix cache {}", config.cache_path.display()))
    {
        log::warn!("{:#}", e);
    }
    Ok(report)
}
