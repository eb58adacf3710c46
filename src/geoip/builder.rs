//! Writer for the compact index format.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;

use anyhow::{Context, Result};

use super::compact::{ENTRY_LEN, HEADER_LEN, MAGIC, OFFSET_MASK};
use crate::error_handling::ScanError;

/// Builds a compact index from `(start, end, record)` ranges.
///
/// Ranges may be added in any order. `build` sorts them, rejects overlaps,
/// writes an explicit gap entry wherever coverage stops, and stores each
/// distinct record string once.
///
/// ```
/// use asn_region_scan::geoip::{CompactIndexBuilder, GeoIndexReader, GeoResolve};
///
/// let mut builder = CompactIndexBuilder::new();
/// builder.add_range("10.0.0.0".parse()?, "10.0.0.255".parse()?, "中国|河北|保定|移动");
/// let reader = GeoIndexReader::from_bytes(builder.build()?)?;
/// assert!(reader.search("10.0.0.7".parse()?)?.is_some());
/// assert!(reader.search("10.0.1.7".parse()?)?.is_none());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Default, Clone)]
pub struct CompactIndexBuilder {
    ranges: Vec<(u32, u32, String)>,
}

impl CompactIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_range(
        &mut self,
        start: Ipv4Addr,
        end: Ipv4Addr,
        record: impl Into<String>,
    ) -> &mut Self {
        self.ranges
            .push((u32::from(start), u32::from(end), record.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Serializes the index.
    pub fn build(&self) -> Result<Vec<u8>, ScanError> {
        let mut ranges = self.ranges.clone();
        ranges.sort_by_key(|(start, end, _)| (*start, *end));

        for (start, end, record) in &ranges {
            if start > end {
                return Err(ScanError::InvalidInput(format!(
                    "range {} - {} ends before it starts",
                    Ipv4Addr::from(*start),
                    Ipv4Addr::from(*end)
                )));
            }
            if record.is_empty() || record.len() > u8::MAX as usize {
                return Err(ScanError::InvalidInput(format!(
                    "record for {} must be 1..=255 bytes, got {}",
                    Ipv4Addr::from(*start),
                    record.len()
                )));
            }
        }
        for pair in ranges.windows(2) {
            let (_, prev_end, _) = &pair[0];
            let (next_start, _, _) = &pair[1];
            if next_start <= prev_end {
                return Err(ScanError::InvalidInput(format!(
                    "ranges overlap at {}",
                    Ipv4Addr::from(*next_start)
                )));
            }
        }

        // Payload: each distinct record once, directly after the header.
        let mut payload = Vec::new();
        let mut placed: HashMap<&str, (u32, u8)> = HashMap::new();
        for (_, _, record) in &ranges {
            if placed.contains_key(record.as_str()) {
                continue;
            }
            let offset = (HEADER_LEN + payload.len()) as u32;
            if offset > OFFSET_MASK {
                return Err(ScanError::InvalidInput(
                    "record payload exceeds the 24-bit offset space".to_string(),
                ));
            }
            payload.extend_from_slice(record.as_bytes());
            placed.insert(record.as_str(), (offset, record.len() as u8));
        }

        let mut entries: Vec<(u32, u32, u8)> = Vec::with_capacity(ranges.len() * 2);
        for (i, (start, end, record)) in ranges.iter().enumerate() {
            let (offset, len) = placed.get(record.as_str()).copied().unwrap_or((0, 0));
            entries.push((*start, offset, len));
            let contiguous = ranges
                .get(i + 1)
                .is_some_and(|(next_start, _, _)| Some(*next_start) == end.checked_add(1));
            if !contiguous && *end < u32::MAX {
                entries.push((end + 1, 0, 0));
            }
        }
        if entries.is_empty() {
            entries.push((0, 0, 0));
        }

        let first_ptr = HEADER_LEN + payload.len();
        let last_ptr = first_ptr + (entries.len() - 1) * ENTRY_LEN;
        let mut out = Vec::with_capacity(last_ptr + ENTRY_LEN);
        out.resize(HEADER_LEN, 0);
        out[0..4].copy_from_slice(&(first_ptr as u32).to_le_bytes());
        out[4..8].copy_from_slice(&(last_ptr as u32).to_le_bytes());
        out[8..12].copy_from_slice(MAGIC);
        out.extend_from_slice(&payload);
        for (start, offset, len) in entries {
            out.extend_from_slice(&start.to_le_bytes());
            out.extend_from_slice(&(offset & OFFSET_MASK).to_le_bytes());
            out.push(len);
        }
        Ok(out)
    }

    /// Builds the index and writes it to `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let bytes = self.build()?;
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write index to {}", path.display()))
    }
}
