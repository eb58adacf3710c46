//! Result files.
//!
//! Writes the classification results and the consolidated prefix list into
//! the output directory:
//!
//! | file                 | content                                     |
//! |----------------------|---------------------------------------------|
//! | `<stem>.txt`         | prefixes with a `high` or `medium` verdict  |
//! | `<stem>_merged.txt`  | consolidated positive prefixes              |
//! | `<stem>.csv`         | every result, one row each                  |
//! | `<stem>.json`        | every result as an array of objects         |
//!
//! Each file is written to a temporary sibling and renamed into place.

mod csv;
mod json;
mod text;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::classify::ClassificationResult;
use crate::prefix::Prefix;

pub use self::csv::write_csv;
pub use self::json::write_json;
pub use self::text::write_prefix_list;

/// Locations of the result files for one output stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    pub txt: PathBuf,
    pub merged: PathBuf,
    pub csv: PathBuf,
    pub json: PathBuf,
}

impl OutputFiles {
    pub fn new(dir: &Path, stem: &str) -> Self {
        OutputFiles {
            txt: dir.join(format!("{stem}.txt")),
            merged: dir.join(format!("{stem}_merged.txt")),
            csv: dir.join(format!("{stem}.csv")),
            json: dir.join(format!("{stem}.json")),
        }
    }
}

/// Writes every result file. `merged` is `None` when merging is disabled,
/// in which case no merged file is written.
///
/// Returns the paths that were written.
pub fn export_results(
    dir: &Path,
    stem: &str,
    results: &[ClassificationResult],
    merged: Option<&[Prefix]>,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let files = OutputFiles::new(dir, stem);
    let mut written = Vec::with_capacity(4);

    let positives: Vec<Prefix> = results
        .iter()
        .filter(|r| r.verdict.is_positive())
        .map(|r| r.prefix)
        .collect();
    write_prefix_list(&files.txt, &positives)?;
    written.push(files.txt);

    if let Some(merged) = merged {
        write_prefix_list(&files.merged, merged)?;
        written.push(files.merged);
    }

    write_csv(&files.csv, results)?;
    written.push(files.csv);

    write_json(&files.json, results)?;
    written.push(files.json);

    for path in &written {
        log::info!("Wrote {}", path.display());
    }
    Ok(written)
}

/// Runs `write` against a temporary file next to `path`, then renames it over
/// `path`.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        write(&mut writer)?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush {}", path.display()))?;
    }
    tmp.persist(path)
        .with_context(|| format!("Failed to move output into place at {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Verdict;
    use tempfile::TempDir;

    fn result(cidr: &str, hits: usize) -> ClassificationResult {
        let prefix: Prefix = cidr.parse().expect("prefix");
        ClassificationResult::new(prefix, vec![prefix.network(); 3], hits)
    }

    #[test]
    fn test_output_file_names() {
        let files = OutputFiles::new(Path::new("out"), "hebei");
        assert_eq!(files.txt, PathBuf::from("out/hebei.txt"));
        assert_eq!(files.merged, PathBuf::from("out/hebei_merged.txt"));
        assert_eq!(files.csv, PathBuf::from("out/hebei.csv"));
        assert_eq!(files.json, PathBuf::from("out/hebei.json"));
    }

    #[test]
    fn test_export_results_writes_all_files() {
        let dir = TempDir::new().expect("tempdir");
        let out = dir.path().join("nested");
        let results = vec![
            result("1.2.0.0/24", 3),
            result("1.2.1.0/24", 1),
            result("5.5.5.0/24", 0),
        ];
        assert_eq!(results[1].verdict, Verdict::Medium);
        let merged = vec!["1.2.0.0/23".parse().expect("prefix")];

        let written = export_results(&out, "scan", &results, Some(&merged)).expect("export");
        assert_eq!(written.len(), 4);
        assert_eq!(
            std::fs::read_to_string(out.join("scan.txt")).expect("txt"),
            "1.2.0.0/24\n1.2.1.0/24\n"
        );
        assert_eq!(
            std::fs::read_to_string(out.join("scan_merged.txt")).expect("merged"),
            "1.2.0.0/23\n"
        );
        assert!(out.join("scan.csv").exists());
        assert!(out.join("scan.json").exists());
    }

    #[test]
    fn test_export_without_merge() {
        let dir = TempDir::new().expect("tempdir");
        let written =
            export_results(dir.path(), "scan", &[result("1.2.0.0/24", 3)], None).expect("export");
        assert_eq!(written.len(), 3);
        assert!(!dir.path().join("scan_merged.txt").exists());
    }
}
