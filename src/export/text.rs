//! Plain prefix lists, one CIDR per line.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use super::write_atomically;
use crate::prefix::Prefix;

/// Writes `prefixes` one per line, in the given order.
pub fn write_prefix_list(path: &Path, prefixes: &[Prefix]) -> Result<()> {
    write_atomically(path, |writer| {
        for prefix in prefixes {
            writeln!(writer, "{prefix}")
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        Ok(())
    })
}
