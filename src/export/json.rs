//! JSON export: the results as an array of objects.

use std::path::Path;

use anyhow::{Context, Result};

use super::write_atomically;
use crate::classify::ClassificationResult;

pub fn write_json(path: &Path, results: &[ClassificationResult]) -> Result<()> {
    write_atomically(path, |writer| {
        serde_json::to_writer_pretty(writer, results)
            .with_context(|| format!("Failed to serialize results to {}", path.display()))
    })
}
