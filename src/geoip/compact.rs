//! Compact range index.
//!
//! Layout: a 256-byte header whose first two little-endian words are the
//! offsets of the first and last index entry, followed by a payload region of
//! UTF-8 records and a flat array of 9-byte entries sorted by start address:
//!
//! ```text
//! | start ip: u32 LE | packed ptr: u32 LE (low 24 bits = offset) | len: u8 |
//! ```
//!
//! An entry covers addresses up to the next entry's start. Entries with a
//! zero pointer or zero length are gaps.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use super::storage::{ByteView, IndexStorage};
use crate::error_handling::ScanError;

pub(crate) const HEADER_LEN: usize = 256;
pub(crate) const ENTRY_LEN: usize = 9;
pub(crate) const MAGIC: &[u8; 4] = b"GIDX";
pub(crate) const OFFSET_MASK: u32 = 0x00FF_FFFF;

/// Reader over a compact-format index.
pub struct CompactIndex {
    storage: IndexStorage,
    path: PathBuf,
    first_ptr: usize,
    entry_count: usize,
}

impl CompactIndex {
    pub(crate) fn from_storage(path: PathBuf, storage: IndexStorage) -> Result<Self, ScanError> {
        let bytes = storage.as_slice();
        if bytes.len() < HEADER_LEN {
            return Err(ScanError::corrupt(
                &path,
                format!("{} bytes is shorter than the {}-byte header", bytes.len(), HEADER_LEN),
            ));
        }
        let view = ByteView {
            bytes,
            path: &path,
        };
        let first_ptr = view.u32_at(0)? as usize;
        let last_ptr = view.u32_at(4)? as usize;

        if first_ptr < HEADER_LEN {
            return Err(ScanError::corrupt(
                &path,
                format!("first entry offset {} points into the header", first_ptr),
            ));
        }
        if last_ptr < first_ptr || (last_ptr - first_ptr) % ENTRY_LEN != 0 {
            return Err(ScanError::corrupt(
                &path,
                format!("entry offsets {}..{} are not aligned", first_ptr, last_ptr),
            ));
        }
        if last_ptr + ENTRY_LEN > bytes.len() {
            return Err(ScanError::corrupt(
                &path,
                format!("last entry at {} runs past end of file", last_ptr),
            ));
        }

        let entry_count = (last_ptr - first_ptr) / ENTRY_LEN + 1;
        Ok(CompactIndex {
            storage,
            path,
            first_ptr,
            entry_count,
        })
    }

    fn view(&self) -> ByteView<'_> {
        ByteView {
            bytes: self.storage.as_slice(),
            path: &self.path,
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entry_start(&self, view: &ByteView<'_>, index: usize) -> Result<u32, ScanError> {
        view.u32_at(self.first_ptr + index * ENTRY_LEN)
    }

    fn entry_end(&self, view: &ByteView<'_>, index: usize) -> Result<u32, ScanError> {
        if index + 1 >= self.entry_count {
            return Ok(u32::MAX);
        }
        let next = self.entry_start(view, index + 1)?;
        Ok(next.saturating_sub(1))
    }

    fn record(&self, view: &ByteView<'_>, index: usize) -> Result<Option<String>, ScanError> {
        let base = self.first_ptr + index * ENTRY_LEN;
        let packed = view.u32_at(base + 4)?;
        let len = view.u8_at(base + 8)? as usize;
        let offset = (packed & OFFSET_MASK) as usize;
        if offset == 0 || len == 0 {
            return Ok(None);
        }
        let raw = view.bytes_at(offset, len)?;
        let text = std::str::from_utf8(raw).map_err(|_| {
            ScanError::corrupt(&self.path, format!("record at {} is not UTF-8", offset))
        })?;
        Ok(Some(text.to_string()))
    }

    /// Binary search for the entry covering `ip`.
    pub fn search(&self, ip: Ipv4Addr) -> Result<Option<String>, ScanError> {
        let probe = u32::from(ip);
        let view = self.view();
        let mut low = 0usize;
        let mut high = self.entry_count;

        while low < high {
            let mid = low + (high - low) / 2;
            let start = self.entry_start(&view, mid)?;
            if probe < start {
                high = mid;
                continue;
            }
            let end = self.entry_end(&view, mid)?;
            if probe > end {
                low = mid + 1;
            } else {
                return self.record(&view, mid);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geoip::CompactIndexBuilder;

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().expect("ip")
    }

    fn open(bytes: Vec<u8>) -> Result<CompactIndex, ScanError> {
        CompactIndex::from_storage(PathBuf::from("mem.xdb"), IndexStorage::Owned(bytes))
    }

    fn sample_index() -> CompactIndex {
        let mut builder = CompactIndexBuilder::new();
        builder
            .add_range(ip("1.0.0.0"), ip("1.0.0.255"), "中国|广东|广州|电信")
            .add_range(ip("1.0.2.0"), ip("1.0.3.255"), "中国|河北|石家庄|移动")
            .add_range(ip("1.0.4.0"), ip("1.0.4.255"), "中国|河北|石家庄|移动");
        open(builder.build().expect("build")).expect("open")
    }

    #[test]
    fn test_lookup_inside_ranges() {
        let index = sample_index();
        for probe in ["1.0.0.0", "1.0.0.128", "1.0.0.255"] {
            assert_eq!(
                index.search(ip(probe)).expect("search").as_deref(),
                Some("中国|广东|广州|电信")
            );
        }
        for probe in ["1.0.2.0", "1.0.3.255", "1.0.4.17"] {
            assert_eq!(
                index.search(ip(probe)).expect("search").as_deref(),
                Some("中国|河北|石家庄|移动")
            );
        }
    }

    #[test]
    fn test_lookup_in_gaps() {
        let index = sample_index();
        for probe in ["0.255.255.255", "1.0.1.0", "1.0.1.255", "1.0.5.0", "255.255.255.255"] {
            assert_eq!(index.search(ip(probe)).expect("search"), None, "{}", probe);
        }
    }

    #[test]
    fn test_rejects_short_header() {
        assert!(matches!(
            open(vec![0u8; 100]),
            Err(ScanError::CorruptIndex { .. })
        ));
    }

    #[test]
    fn test_rejects_misaligned_pointers() {
        let mut bytes = vec![0u8; 300];
        bytes[0..4].copy_from_slice(&256u32.to_le_bytes());
        bytes[4..8].copy_from_slice(&260u32.to_le_bytes());
        assert!(matches!(open(bytes), Err(ScanError::CorruptIndex { .. })));
    }

    #[test]
    fn test_rejects_pointer_past_end() {
        let mut bytes = vec![0u8; 300];
        bytes[0..4].copy_from_slice(&256u32.to_le_bytes());
        bytes[4..8].copy_from_slice(&(256u32 + 9 * 10).to_le_bytes());
        assert!(matches!(open(bytes), Err(ScanError::CorruptIndex { .. })));
    }

    #[test]
    fn test_record_out_of_range_is_an_error() {
        // Single entry pointing far beyond the file.
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&256u32.to_le_bytes());
        bytes[4..8].copy_from_slice(&256u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0x00FF_0000u32.to_le_bytes());
        bytes.push(10);
        let index = open(bytes).expect("header is valid");
        assert!(index.search(ip("8.8.8.8")).is_err());
    }
}
