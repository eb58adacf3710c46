//! Sampling classifier: decides per prefix whether it belongs to the target
//! region and operator.
//!
//! Each prefix is probed at a few random addresses; the share of probes that
//! resolve to a matching record gives the [`Verdict`]. Prefixes are
//! independent, so they are classified on a bounded pool of blocking tasks
//! and sorted afterwards.

mod sampling;
mod verdict;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::app::{log_progress, shutdown_gracefully};
use crate::config::LOGGING_INTERVAL;
use crate::error_handling::{FailureType, ProcessingStats};
use crate::geoip::MultiSourceResolver;
use crate::initialization::init_semaphore;
use crate::prefix::Prefix;

// Re-export public API
pub use crate::geoip::RegionMatcher;
pub use sampling::sample_addresses;
pub use verdict::{result_order, sort_results, ClassificationResult, Verdict};

/// Samples `prefix` and counts matching probes.
///
/// A lookup failure on one probe counts as a non-match for that probe only.
pub fn classify<R: Rng>(
    prefix: Prefix,
    resolver: &MultiSourceResolver,
    sample_count: usize,
    rng: &mut R,
) -> ClassificationResult {
    let sampled_ips = sample_addresses(&prefix, sample_count, rng);
    let hits = sampled_ips
        .iter()
        .filter(|ip| resolver.is_match(**ip))
        .count();
    ClassificationResult::new(prefix, sampled_ips, hits)
}

/// Classifies every prefix on at most `workers` concurrent blocking tasks.
///
/// Results come back sorted by [`result_order`]. A task that panics loses
/// its prefix and is counted as [`FailureType::PrefixTaskPanic`].
pub async fn classify_prefixes(
    prefixes: Vec<Prefix>,
    resolver: Arc<MultiSourceResolver>,
    sample_count: usize,
    workers: usize,
    stats: Arc<ProcessingStats>,
) -> Vec<ClassificationResult> {
    let total = prefixes.len();
    log::info!(
        "Classifying {} prefixes with {} workers, {} samples each",
        total,
        workers,
        sample_count
    );
    let start_time = Instant::now();
    let completed = Arc::new(AtomicUsize::new(0));
    let semaphore = init_semaphore(workers.max(1));

    let cancel = CancellationToken::new();
    let cancel_logging = cancel.child_token();
    let completed_for_logging = Arc::clone(&completed);
    let logging_task = tokio::task::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(LOGGING_INTERVAL));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    log_progress(start_time, &completed_for_logging, total);
                }
                _ = cancel_logging.cancelled() => {
                    break;
                }
            }
        }
    });

    let mut tasks = FuturesUnordered::new();
    for prefix in prefixes {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                log::error!("Worker semaphore closed, {} left unclassified", prefix);
                break;
            }
        };
        let resolver = Arc::clone(&resolver);
        let completed = Arc::clone(&completed);
        tasks.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let result = classify(prefix, &resolver, sample_count, &mut rand::rng());
            completed.fetch_add(1, Ordering::SeqCst);
            result
        }));
    }

    let mut results = Vec::with_capacity(total);
    while let Some(task_result) = tasks.next().await {
        match task_result {
            Ok(result) => results.push(result),
            Err(join_error) => {
                stats.increment_failure(FailureType::PrefixTaskPanic);
                log::warn!("Classification task panicked: {:?}", join_error);
            }
        }
    }

    shutdown_gracefully(cancel, Some(logging_task)).await;
    log_progress(start_time, &completed, total);

    sort_results(&mut results);
    results
}
