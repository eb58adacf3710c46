//! Progress logging utilities.

use log::info;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Logs classification progress.
///
/// # Arguments
///
/// * `start_time` - When classification started
/// * `completed` - Atomic counter of classified prefixes
/// * `total` - Number of prefixes scheduled
pub fn log_progress(start_time: std::time::Instant, completed: &Arc<AtomicUsize>, total: usize) {
    let elapsed_secs = start_time.elapsed().as_secs_f64();
    let done = completed.load(Ordering::SeqCst);
    let rate = if elapsed_secs > 0.0 {
        done as f64 / elapsed_secs
    } else {
        0.0
    };
    info!(
        "Classified {}/{} prefixes in {:.2} seconds (~{:.2} prefixes/sec)",
        done, total, elapsed_secs, rate
    );
}
