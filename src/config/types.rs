//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and configuration.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::constants::{
    DEFAULT_CACHE_PATH, DEFAULT_OUTPUT_STEM, DEFAULT_REQUEST_SPACING_MS, DEFAULT_SOURCE_URL,
    DEFAULT_USER_AGENT, HTTP_REQUEST_TIMEOUT_SECS,
};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Scan configuration.
///
/// Parsed from the command line by the binary, or constructed directly by
/// library users.
///
/// # Examples
///
/// ```no_run
/// use asn_region_scan::Config;
/// use std::path::PathBuf;
///
/// let config = Config {
///     asn_file: PathBuf::from("data/cmcc.txt"),
///     region: "河北".to_string(),
///     operator: "移动".to_string(),
///     use_cache: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Parser)]
#[command(
    name = "asn_region_scan",
    about = "Find the announced prefixes of an operator's ASNs that belong to a region"
)]
pub struct Config {
    /// File listing ASNs (comma or newline separated, `#`/`//` comments)
    #[arg(long = "asn-file", default_value = "data/cmcc.txt")]
    pub asn_file: PathBuf,

    /// Primary geo index (compact or legacy format)
    #[arg(long = "index", default_value = "data/ip2region_v4.xdb")]
    pub index_path: PathBuf,

    /// Supplementary geo index, consulted only to confirm matches
    #[arg(long = "supplementary-index")]
    pub supplementary_index: Option<PathBuf>,

    /// Prefix cache file
    #[arg(long = "cache-path", default_value = DEFAULT_CACHE_PATH)]
    pub cache_path: PathBuf,

    /// Reuse cached prefixes when the cache is still valid
    #[arg(long = "use-cache")]
    pub use_cache: bool,

    /// Maximum concurrent requests to the announcement source
    #[arg(long = "fetch-concurrency", default_value_t = 20)]
    pub fetch_concurrency: usize,

    /// Maximum concurrent prefix classifications
    #[arg(long = "scan-workers", default_value_t = 24)]
    pub scan_workers: usize,

    /// Probe addresses drawn per prefix
    #[arg(long = "sample", default_value_t = 3)]
    pub sample_count: usize,

    /// Target region keyword (administrative suffixes are ignored)
    #[arg(long, default_value = "河北")]
    pub region: String,

    /// Target operator keyword
    #[arg(long, default_value = "移动")]
    pub operator: String,

    /// Directory receiving the result files
    #[arg(long = "output-dir", default_value = "output")]
    pub output_dir: PathBuf,

    /// File stem for the result files
    #[arg(long = "output-stem", default_value = DEFAULT_OUTPUT_STEM)]
    pub output_stem: String,

    /// Skip CIDR consolidation
    #[arg(long = "no-merge")]
    pub no_merge: bool,

    /// Per-request timeout in seconds
    #[arg(long = "timeout-seconds", default_value_t = HTTP_REQUEST_TIMEOUT_SECS)]
    pub timeout_seconds: u64,

    /// Minimum spacing before each announcement request, in milliseconds
    #[arg(long = "request-spacing-ms", default_value_t = DEFAULT_REQUEST_SPACING_MS)]
    pub request_spacing_ms: u64,

    /// Announcement endpoint template; `{asn}` is replaced by the ASN
    #[arg(long = "source-url", default_value = DEFAULT_SOURCE_URL)]
    pub source_url: String,

    /// HTTP User-Agent header value
    #[arg(long = "user-agent", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Log level
    #[arg(long = "log-level", value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long = "log-format", value_enum, default_value = "plain")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            asn_file: PathBuf::from("data/cmcc.txt"),
            index_path: PathBuf::from("data/ip2region_v4.xdb"),
            supplementary_index: None,
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            use_cache: false,
            fetch_concurrency: 20,
            scan_workers: 24,
            sample_count: 3,
            region: "河北".to_string(),
            operator: "移动".to_string(),
            output_dir: PathBuf::from("output"),
            output_stem: DEFAULT_OUTPUT_STEM.to_string(),
            no_merge: false,
            timeout_seconds: HTTP_REQUEST_TIMEOUT_SECS,
            request_spacing_ms: DEFAULT_REQUEST_SPACING_MS,
            source_url: DEFAULT_SOURCE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
        }
    }
}
