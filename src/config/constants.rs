//! Configuration constants.
//!
//! This module defines the fixed operational parameters used throughout the
//! pipeline: cache lifetime, retry strategy, sampling limits and defaults.

use std::time::Duration;

// Prefix cache
/// Validity window of the persisted prefix cache (7 days).
/// The cache is discarded as a whole once `timestamp + TTL <= now`.
pub const CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;
/// Format version written into the cache file.
pub const CACHE_FORMAT_VERSION: &str = "1.0";
/// Default location of the prefix cache file.
pub const DEFAULT_CACHE_PATH: &str = "data/prefixes_cache.json";

/// Prefixes wider than this are split into blocks of exactly this length
/// before they are cached.
pub const NORMALIZATION_WIDTH: u8 = 24;

// Prefix announcement source
/// Default announcement endpoint. `{asn}` is replaced with the numeric ASN.
pub const DEFAULT_SOURCE_URL: &str =
    "https://stat.ripe.net/data/announced-prefixes/data.json?resource=AS{asn}";
/// Placeholder substituted in the source URL template.
pub const SOURCE_URL_ASN_PLACEHOLDER: &str = "{asn}";
/// Default User-Agent sent to the announcement source.
pub const DEFAULT_USER_AGENT: &str = concat!("asn_region_scan/", env!("CARGO_PKG_VERSION"));

// Retry strategy
/// Maximum number of retries after the initial attempt.
pub const RETRY_MAX_RETRIES: u32 = 3;
/// Backoff before the first retry; doubled on each further retry.
pub const RETRY_INITIAL_DELAY_MS: u64 = 1000;
/// Factor by which the backoff delay grows per retry.
pub const RETRY_FACTOR: u32 = 2;
/// Upper bound for a single backoff delay.
pub const RETRY_MAX_DELAY_SECS: u64 = 30;
/// Wait applied after a 429 when the provider does not send `Retry-After`.
pub const RATE_LIMIT_DEFAULT_WAIT_SECS: u64 = 5;
/// Upper bound on a provider-supplied `Retry-After` wait.
pub const RATE_LIMIT_MAX_WAIT_SECS: u64 = 900;
/// Minimum spacing before every request to the announcement source.
pub const DEFAULT_REQUEST_SPACING_MS: u64 = 200;

// HTTP status codes (for clarity and consistency)
pub const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;
pub const HTTP_STATUS_BAD_GATEWAY: u16 = 502;
pub const HTTP_STATUS_SERVICE_UNAVAILABLE: u16 = 503;
pub const HTTP_STATUS_GATEWAY_TIMEOUT: u16 = 504;

// Sampling
/// Blocks with at most this many addresses are sampled from their host list.
pub const SMALL_BLOCK_MAX_ADDRESSES: u64 = 1024;
/// Attempt budget multiplier for distinct sampling in large blocks.
pub const SAMPLE_ATTEMPT_FACTOR: usize = 20;

// Progress reporting
/// Interval between classification progress log lines, in seconds.
pub const LOGGING_INTERVAL: u64 = 5;

/// Timeout for a single HTTP request, in seconds.
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default output file stem.
pub const DEFAULT_OUTPUT_STEM: &str = "region_prefixes";

/// Converts the configured TTL into a `Duration`.
pub const fn cache_ttl() -> Duration {
    Duration::from_secs(CACHE_TTL_SECS)
}
