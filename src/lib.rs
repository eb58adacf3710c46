//! asn_region_scan library: find the announced IPv4 prefixes of a set of ASNs
//! that geolocate to a target region and operator.
//!
//! The pipeline reads an ASN list, fetches (or loads from cache) the prefixes
//! each ASN announces, probes a few random addresses per prefix against an
//! offline geo index, and writes the positive prefixes together with a
//! consolidated CIDR list.
//!
//! # Example
//!
//! ```no_run
//! use asn_region_scan::{Config, run_scan};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     asn_file: std::path::PathBuf::from("data/cmcc.txt"),
//!     region: "河北".to_string(),
//!     operator: "移动".to_string(),
//!     use_cache: true,
//!     ..Default::default()
//! };
//!
//! let report = run_scan(config).await?;
//! println!("{} high, {} medium out of {} prefixes",
//!          report.high, report.medium, report.prefixes_scanned);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime with the multi-threaded scheduler;
//! classification runs on blocking worker threads.

#![warn(missing_docs)]

mod app;
pub mod asn;
pub mod classify;
pub mod config;
pub mod consolidate;
pub mod error_handling;
pub mod export;
pub mod fetch;
pub mod geoip;
pub mod initialization;
pub mod prefix;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel};
pub use error_handling::ScanError;
pub use prefix::Prefix;
pub use run::{run_scan, ScanReport};

// Internal run module (contains the pipeline orchestration)
mod run {
    use anyhow::{Context, Result};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Instant;

    use log::{info, warn};

    use crate::app::{
        print_error_statistics, print_merge_summary, print_region_statistics, region_distribution,
    };
    use crate::asn::load_asns_from_file;
    use crate::classify::{classify_prefixes, Verdict};
    use crate::config::Config;
    use crate::consolidate::{merge, MergeSummary};
    use crate::error_handling::{ProcessingStats, ScanError};
    use crate::export::export_results;
    use crate::fetch::{acquire_prefixes, AnnouncementSource};
    use crate::geoip::{GeoIndexReader, GeoResolve, MultiSourceResolver, RegionMatcher};
    use crate::initialization::init_client;
    use crate::prefix::Prefix;

    /// Results of a scan run.
    #[derive(Debug, Clone)]
    pub struct ScanReport {
        /// ASNs read from the input file.
        pub total_asns: usize,
        /// ASNs that contributed no prefixes in this run.
        pub failed_asns: usize,
        /// Prefixes classified.
        pub prefixes_scanned: usize,
        /// Prefixes where every sample matched.
        pub high: usize,
        /// Prefixes where some samples matched.
        pub medium: usize,
        /// Prefixes where no sample matched.
        pub none: usize,
        /// Size of the consolidated list, `None` when merging was disabled.
        pub merged: Option<usize>,
        /// Result files written.
        pub output_files: Vec<PathBuf>,
        /// Wall-clock duration of the run.
        pub elapsed_seconds: f64,
    }

    impl ScanReport {
        /// True when some ASNs yielded no data.
        pub fn is_partial(&self) -> bool {
            self.failed_asns > 0
        }
    }

    fn open_supplementary(config: &Config) -> Option<Arc<dyn GeoResolve>> {
        let path = config.supplementary_index.as_ref()?;
        match GeoIndexReader::open(path) {
            Ok(reader) => Some(Arc::new(reader)),
            Err(e) => {
                warn!("Continuing without supplementary index: {}", e);
                None
            }
        }
    }

    /// Runs the whole pipeline with `config`.
    ///
    /// # Errors
    ///
    /// Fails on a missing ASN file, a missing or corrupt primary index, an
    /// invalid configuration or unwritable output files. Per-ASN network
    /// failures and per-sample lookup failures are counted, not returned.
    pub async fn run_scan(config: Config) -> Result<ScanReport> {
        let start_time = Instant::now();

        if config.sample_count == 0 {
            return Err(ScanError::InvalidInput("sample count must be at least 1".into()).into());
        }
        let client = init_client(&config).context("Failed to initialize HTTP client")?;
        AnnouncementSource::new(client.clone(), config.source_url.clone()).validate()?;

        let asns = load_asns_from_file(&config.asn_file)?;
        if asns.is_empty() {
            return Err(ScanError::InvalidInput(format!(
                "no ASNs found in {}",
                config.asn_file.display()
            ))
            .into());
        }

        let primary = GeoIndexReader::open(&config.index_path)?;
        let supplementary = open_supplementary(&config);

        let stats = Arc::new(ProcessingStats::new());
        let acquisition = acquire_prefixes(&config, client, &asns, Arc::clone(&stats)).await?;
        if acquisition.prefixes.is_empty() {
            warn!("No prefixes acquired for {} ASNs", asns.len());
        }

        let resolver = Arc::new(
            MultiSourceResolver::new(
                Arc::new(primary),
                supplementary,
                RegionMatcher::new(&config.region, &config.operator),
            )
            .with_stats(Arc::clone(&stats)),
        );
        info!(
            "Matching region {:?} and operator {:?}{}",
            resolver.matcher().region(),
            resolver.matcher().operator(),
            if resolver.has_supplementary() {
                " with supplementary index"
            } else {
                ""
            }
        );

        let prefixes_scanned = acquisition.prefixes.len();
        let results = classify_prefixes(
            acquisition.prefixes,
            Arc::clone(&resolver),
            config.sample_count,
            config.scan_workers,
            Arc::clone(&stats),
        )
        .await;

        let count = |verdict: Verdict| results.iter().filter(|r| r.verdict == verdict).count();
        let (high, medium, none) = (
            count(Verdict::High),
            count(Verdict::Medium),
            count(Verdict::None),
        );
        info!("Verdicts: {} high, {} medium, {} none", high, medium, none);

        let merged = if config.no_merge {
            None
        } else {
            let positives: Vec<Prefix> = results
                .iter()
                .filter(|r| r.verdict.is_positive())
                .map(|r| r.prefix)
                .collect();
            let merged = merge(&positives);
            print_merge_summary(&MergeSummary::new(&positives, &merged));
            Some(merged)
        };

        let output_files = export_results(
            &config.output_dir,
            &config.output_stem,
            &results,
            merged.as_deref(),
        )
        .context("Failed to write result files")?;

        print_region_statistics(&region_distribution(&results, &resolver));
        print_error_statistics(&stats);

        let report = ScanReport {
            total_asns: asns.len(),
            failed_asns: acquisition.failed_asns.len(),
            prefixes_scanned,
            high,
            medium,
            none,
            merged: merged.map(|m| m.len()),
            output_files,
            elapsed_seconds: start_time.elapsed().as_secs_f64(),
        };
        if report.is_partial() {
            warn!(
                "Partial result: {} of {} ASNs yielded no prefixes",
                report.failed_asns, report.total_asns
            );
        }
        Ok(report)
    }
}
