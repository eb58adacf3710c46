//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `asn_region_scan` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use asn_region_scan::initialization::init_logger_with;
use asn_region_scan::{run_scan, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // .env may set RUST_LOG; a missing file is fine
    let _ = dotenvy::dotenv();

    let config = Config::parse();

    let log_level = config.log_level.clone();
    let log_format = config.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    match run_scan(config).await {
        Ok(report) => {
            println!(
                "✅ Scanned {} prefix{} from {} ASN{}: {} high, {} medium, {} none in {:.1}s",
                report.prefixes_scanned,
                if report.prefixes_scanned == 1 { "" } else { "es" },
                report.total_asns,
                if report.total_asns == 1 { "" } else { "s" },
                report.high,
                report.medium,
                report.none,
                report.elapsed_seconds
            );
            if let Some(merged) = report.merged {
                println!("Consolidated into {} CIDR block{}", merged, if merged == 1 { "" } else { "s" });
            }
            if report.is_partial() {
                println!("⚠️  {} ASN(s) yielded no prefixes", report.failed_asns);
            }
            for path in &report.output_files {
                println!("Results saved in {}", path.display());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("asn_region_scan error: {:#}", e);
            process::exit(1);
        }
    }
}
