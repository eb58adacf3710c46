//! Error type definitions.
//!
//! This module defines the typed errors surfaced by the library and the
//! failure/info categories counted during a run.

use std::path::PathBuf;
use std::time::Duration;

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Errors produced by the scanning components.
///
/// `NotFound` and `CorruptIndex` are fatal: no meaningful result can be
/// produced without the index. `NetworkFailure` and `RateLimited` are
/// transient; the acquisition layer retries them and finally downgrades the
/// affected ASN to an empty prefix list.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A required file is missing.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The geo index header or structure cannot be parsed.
    #[error("Corrupt index {}: {reason}", .path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    /// A malformed IP address, CIDR or ASN token.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transport failure or an unusable response from the announcement source.
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// The announcement source asked us to slow down.
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
}

impl ScanError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ScanError::CorruptIndex {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for errors that make the whole run meaningless.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScanError::NotFound(_) | ScanError::CorruptIndex { .. }
        )
    }
}

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// Soft failures counted during a run.
///
/// None of these abort the run; each one shrinks the result set and is
/// reported at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum FailureType {
    // Prefix acquisition
    AsnRateLimited,      // 429 received (retried)
    AsnGatewayError,     // 502/503/504 received (retried)
    AsnTransportError,   // connect/timeout/body errors (retried)
    AsnUnexpectedStatus, // any other non-200 status (gave up)
    AsnParseError,       // body was not the expected JSON (gave up)
    AsnRetriesExhausted, // every retry failed
    // Classification
    SampleLookupError, // geo index read failed for one sample
    PrefixTaskPanic,   // a classification task died
}

/// Informational events that are neither failures nor results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum InfoType {
    CacheHit,               // ASN served from a valid cache
    CacheExpired,           // whole cache discarded because of its age
    Ipv6Dropped,            // IPv6 prefix removed from a response
    SupplementConfirmation, // supplementary index confirmed a match
}

impl std::fmt::Display for FailureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FailureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::AsnRateLimited => "Rate limited (429)",
            FailureType::AsnGatewayError => "Gateway error (502/503/504)",
            FailureType::AsnTransportError => "Transport error",
            FailureType::AsnUnexpectedStatus => "Unexpected HTTP status",
            FailureType::AsnParseError => "Response parse error",
            FailureType::AsnRetriesExhausted => "Retries exhausted",
            FailureType::SampleLookupError => "Sample lookup error",
            FailureType::PrefixTaskPanic => "Classification task panic",
        }
    }
}

impl InfoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoType::CacheHit => "ASN served from cache",
            InfoType::CacheExpired => "Prefix cache expired",
            InfoType::Ipv6Dropped => "IPv6 prefix dropped",
            InfoType::SupplementConfirmation => "Supplementary confirmation",
        }
    }
}
