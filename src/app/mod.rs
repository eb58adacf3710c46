//! Main application helpers.
//!
//! This module provides progress logging, background-task shutdown and the
//! end-of-run statistics printed by `run_scan`.

pub mod logging;
pub mod shutdown;
pub mod statistics;

// Re-export public API
pub use logging::log_progress;
pub use shutdown::shutdown_gracefully;
pub use statistics::{
    print_error_statistics, print_merge_summary, print_region_statistics, region_distribution,
};
