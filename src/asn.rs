//! ASN list loading.
//!
//! The list is plain text: numbers separated by commas and/or newlines.
//! Lines starting with `//` or `#` are comments. Tokens that are not
//! positive integers are skipped.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;

use crate::error_handling::ScanError;

/// Autonomous system number.
pub type Asn = u32;

/// Parses ASN list text, keeping first occurrences in order.
pub fn parse_asn_list(text: &str) -> Vec<Asn> {
    let combined = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//") && !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join(",");

    let mut seen = HashSet::new();
    let mut asns = Vec::new();
    for token in combined.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let Ok(asn) = token.parse::<Asn>() else {
            log::debug!("Skipping non-numeric ASN token: {:?}", token);
            continue;
        };
        if asn == 0 {
            continue;
        }
        if seen.insert(asn) {
            asns.push(asn);
        }
    }
    asns
}

/// Reads and parses an ASN list file.
pub fn load_asns_from_file(path: impl AsRef<Path>) -> Result<Vec<Asn>, ScanError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ScanError::NotFound(path.to_path_buf()),
        _ => ScanError::InvalidInput(format!("unable to read {}: {}", path.display(), e)),
    })?;
    let asns = parse_asn_list(&text);
    log::info!("Loaded {} ASNs from {}", asns.len(), path.display());
    Ok(asns)
}
