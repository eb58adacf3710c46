//! Format detection and the unified reader.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use super::compact::{self, CompactIndex};
use super::legacy::LegacyIndex;
use super::storage::IndexStorage;
use crate::error_handling::ScanError;

/// Capability shared by every geo lookup source.
///
/// Implementations must be safe to call concurrently from many tasks.
pub trait GeoResolve: Send + Sync {
    /// Returns the record covering `ip`, or `None` if it falls in a gap.
    fn search(&self, ip: Ipv4Addr) -> Result<Option<String>, ScanError>;

    /// Parses `ip` and searches it. Malformed addresses are `InvalidInput`.
    fn search_str(&self, ip: &str) -> Result<Option<String>, ScanError> {
        let addr: Ipv4Addr = ip
            .trim()
            .parse()
            .map_err(|_| ScanError::InvalidInput(format!("not an IPv4 address: {:?}", ip)))?;
        self.search(addr)
    }
}

/// On-disk index layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    /// 256-byte header, flat 9-byte entry table.
    Compact,
    /// 8-byte header, 7-byte index over redirect records.
    Legacy,
}

impl fmt::Display for IndexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexFormat::Compact => f.write_str("compact"),
            IndexFormat::Legacy => f.write_str("legacy"),
        }
    }
}

fn le_u32(bytes: &[u8], at: usize) -> Option<usize> {
    let b = bytes.get(at..at + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
}

fn le_u24(bytes: &[u8], at: usize) -> Option<usize> {
    let b = bytes.get(at..at + 3)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], 0]) as usize)
}

/// True when every 7-byte entry in `first..=last` points at a record whose
/// end address closes a range that starts at the entry and stays below the
/// next entry's start.
fn legacy_entries_consistent(bytes: &[u8], first: usize, last: usize) -> bool {
    let mut prev_end: Option<usize> = None;
    let mut at = first;
    while at <= last {
        let (Some(start), Some(record)) = (le_u32(bytes, at), le_u24(bytes, at + 4)) else {
            return false;
        };
        if record < 8 {
            return false;
        }
        let Some(end) = le_u32(bytes, record) else {
            return false;
        };
        if end < start || prev_end.is_some_and(|prev| start <= prev) {
            return false;
        }
        prev_end = Some(end);
        at += 7;
    }
    true
}

/// Guesses the layout of `bytes` from its header.
///
/// The compact magic wins outright. Without it, a pointer span that tiles
/// 7-byte entries whose records describe ordered, non-overlapping ranges
/// means legacy; one that tiles 9-byte entries beyond a 256-byte header
/// means compact. Spans that tile both sizes are settled by the legacy
/// record check.
pub fn detect_format(bytes: &[u8]) -> Result<IndexFormat, String> {
    if bytes.len() < 8 {
        return Err(format!("{} bytes is too short for any header", bytes.len()));
    }
    if bytes.get(8..12) == Some(compact::MAGIC.as_slice()) {
        return Ok(IndexFormat::Compact);
    }
    let (Some(first), Some(last)) = (le_u32(bytes, 0), le_u32(bytes, 4)) else {
        return Err("unreadable header".to_string());
    };
    if last < first {
        return Err(format!("last entry offset {} precedes first {}", last, first));
    }
    let span = last - first;
    if first >= 8
        && span % 7 == 0
        && last + 7 <= bytes.len()
        && legacy_entries_consistent(bytes, first, last)
    {
        return Ok(IndexFormat::Legacy);
    }
    if first >= compact::HEADER_LEN
        && span % compact::ENTRY_LEN == 0
        && last + compact::ENTRY_LEN <= bytes.len()
    {
        return Ok(IndexFormat::Compact);
    }
    Err(format!("entry offsets {}..{} match no known layout", first, last))
}

/// A geo index of either layout behind one `search` contract.
pub enum GeoIndexReader {
    Compact(CompactIndex),
    Legacy(LegacyIndex),
}

impl GeoIndexReader {
    /// Opens `path`, detecting its layout from the header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let storage = IndexStorage::open(path)?;
        let format =
            detect_format(storage.as_slice()).map_err(|reason| ScanError::corrupt(path, reason))?;
        let reader = Self::from_storage(path.to_path_buf(), storage, format)?;
        log::info!(
            "Opened {} geo index {} ({} entries)",
            format,
            path.display(),
            reader.entry_count()
        );
        Ok(reader)
    }

    /// Opens `path` as `format` without detection.
    pub fn open_as(path: impl AsRef<Path>, format: IndexFormat) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let storage = IndexStorage::open(path)?;
        Self::from_storage(path.to_path_buf(), storage, format)
    }

    /// Reads an index held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ScanError> {
        let path = PathBuf::from("<memory>");
        let format = detect_format(&bytes).map_err(|reason| ScanError::corrupt(&path, reason))?;
        Self::from_storage(path, IndexStorage::Owned(bytes), format)
    }

    fn from_storage(
        path: PathBuf,
        storage: IndexStorage,
        format: IndexFormat,
    ) -> Result<Self, ScanError> {
        match format {
            IndexFormat::Compact => CompactIndex::from_storage(path, storage).map(Self::Compact),
            IndexFormat::Legacy => LegacyIndex::from_storage(path, storage).map(Self::Legacy),
        }
    }

    pub fn format(&self) -> IndexFormat {
        match self {
            GeoIndexReader::Compact(_) => IndexFormat::Compact,
            GeoIndexReader::Legacy(_) => IndexFormat::Legacy,
        }
    }

    pub fn entry_count(&self) -> usize {
        match self {
            GeoIndexReader::Compact(index) => index.entry_count(),
            GeoIndexReader::Legacy(index) => index.entry_count(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            GeoIndexReader::Compact(index) => index.path(),
            GeoIndexReader::Legacy(index) => index.path(),
        }
    }
}

impl GeoResolve for GeoIndexReader {
    fn search(&self, ip: Ipv4Addr) -> Result<Option<String>, ScanError> {
        match self {
            GeoIndexReader::Compact(index) => index.search(ip),
            GeoIndexReader::Legacy(index) => index.search(ip),
        }
    }
}

impl fmt::Debug for GeoIndexReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoIndexReader")
            .field("format", &self.format())
            .field("path", &self.path())
            .field("entries", &self.entry_count())
            .finish()
    }
}
