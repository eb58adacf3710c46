//! Backing bytes for an on-disk index.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error_handling::ScanError;

/// Index bytes, either memory-mapped from a file or owned (tests, tooling).
pub(crate) enum IndexStorage {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl IndexStorage {
    /// Maps `path` read-only.
    ///
    /// Files shorter than the smallest possible header are rejected before
    /// mapping.
    pub(crate) fn open(path: &Path) -> Result<Self, ScanError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ScanError::NotFound(path.to_path_buf()),
            _ => ScanError::corrupt(path, format!("unable to open: {}", e)),
        })?;
        let len = file
            .metadata()
            .map_err(|e| ScanError::corrupt(path, format!("unable to stat: {}", e)))?
            .len();
        if len < 8 {
            return Err(ScanError::corrupt(
                path,
                format!("file is {} bytes, too short for any header", len),
            ));
        }

        // SAFETY: the index is treated as immutable for the lifetime of the
        // reader; it is never written through this mapping.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| ScanError::corrupt(path, format!("unable to map: {}", e)))?;
        Ok(IndexStorage::Mapped(mmap))
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        match self {
            IndexStorage::Owned(v) => v.as_slice(),
            IndexStorage::Mapped(m) => &m[..],
        }
    }
}

/// Bounds-checked little-endian reads over index bytes.
///
/// Every out-of-range read is reported as `CorruptIndex` naming `path`.
pub(crate) struct ByteView<'a> {
    pub(crate) bytes: &'a [u8],
    pub(crate) path: &'a PathBuf,
}

impl<'a> ByteView<'a> {
    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], ScanError> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or_else(|| {
                ScanError::corrupt(
                    self.path,
                    format!("read of {} bytes at offset {} is out of range", len, offset),
                )
            })
    }

    pub(crate) fn u8_at(&self, offset: usize) -> Result<u8, ScanError> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub(crate) fn u24_at(&self, offset: usize) -> Result<usize, ScanError> {
        let b = self.slice(offset, 3)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]) as usize)
    }

    pub(crate) fn u32_at(&self, offset: usize) -> Result<u32, ScanError> {
        let b = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn bytes_at(&self, offset: usize, len: usize) -> Result<&'a [u8], ScanError> {
        self.slice(offset, len)
    }

    /// NUL-terminated string starting at `offset`, without the terminator.
    ///
    /// An offset at or past the end yields an empty string.
    pub(crate) fn cstr_at(&self, offset: usize) -> Result<&'a [u8], ScanError> {
        let Some(tail) = self.bytes.get(offset..) else {
            return Ok(&[]);
        };
        match tail.iter().position(|&b| b == 0) {
            Some(end) => Ok(&tail[..end]),
            None => Err(ScanError::corrupt(
                self.path,
                format!("unterminated string at offset {}", offset),
            )),
        }
    }
}
