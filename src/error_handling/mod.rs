//! Error handling and processing statistics.
//!
//! This module provides:
//! - Typed errors for index access, input parsing and network acquisition
//! - Processing statistics tracking (soft failures and info metrics)
//! - Categorization of HTTP outcomes into failure types
//!
//! Soft failures never abort a run. They are counted here and reported at
//! the end so that a smaller-than-expected result set is explained.

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::{categorize_reqwest_error, categorize_status, is_gateway_status};
pub use stats::ProcessingStats;
pub use types::{FailureType, InfoType, InitializationError, ScanError};
