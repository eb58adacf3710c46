//! CSV export: one row per classified prefix.

use std::path::Path;

use anyhow::{Context, Result};
use csv::Writer;

use super::write_atomically;
use crate::classify::ClassificationResult;

/// Column order of the CSV file.
pub const CSV_HEADER: [&str; 5] = ["cidr", "status", "hits", "samples", "sampled_ips"];

/// Writes `results` as CSV; sampled addresses are joined with `|`.
///
/// Returns the number of rows written.
pub fn write_csv(path: &Path, results: &[ClassificationResult]) -> Result<usize> {
    write_atomically(path, |file| {
        let mut writer = Writer::from_writer(file);
        writer
            .write_record(CSV_HEADER)
            .context("Failed to write CSV header")?;
        for result in results {
            let sampled = result
                .sampled_ips
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("|");
            writer
                .write_record([
                    result.prefix.to_string(),
                    result.verdict.to_string(),
                    result.hits.to_string(),
                    result.samples.to_string(),
                    sampled,
                ])
                .with_context(|| format!("Failed to write CSV row for {}", result.prefix))?;
        }
        writer.flush().context("Failed to flush CSV writer")?;
        Ok(())
    })?;
    Ok(results.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefix::Prefix;
    use std::net::Ipv4Addr;

    #[test]
    fn test_csv_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("results.csv");
        let prefix: Prefix = "111.11.0.0/24".parse().expect("prefix");
        let results = vec![ClassificationResult::new(
            prefix,
            vec![Ipv4Addr::new(111, 11, 0, 7), Ipv4Addr::new(111, 11, 0, 200)],
            1,
        )];
        assert_eq!(write_csv(&path, &results).expect("write"), 1);

        let mut reader = csv::Reader::from_path(&path).expect("reader");
        let header = reader.headers().expect("header").clone();
        assert_eq!(header.iter().collect::<Vec<_>>(), CSV_HEADER.to_vec());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.expect("row")).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].iter().collect::<Vec<_>>(),
            vec!["111.11.0.0/24", "medium", "1", "2", "111.11.0.7|111.11.0.200"]
        );
    }
}
