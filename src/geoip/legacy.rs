//! Legacy redirect-record index.
//!
//! The 8-byte header holds the offsets of the first and last 7-byte index
//! entries (`start ip: u32 LE`, `record offset: u24 LE`). A record starts
//! with its end address followed by a country/area block in which a mode
//! byte may redirect the whole block (`0x01`) or just the country string
//! (`0x02`) to another offset. Strings are NUL-terminated GBK.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use encoding_rs::GBK;

use super::storage::{ByteView, IndexStorage};
use crate::error_handling::ScanError;

const HEADER_LEN: usize = 8;
const ENTRY_LEN: usize = 7;
const REDIRECT_ALL: u8 = 0x01;
const REDIRECT_COUNTRY: u8 = 0x02;

/// Reader over a legacy-format index.
pub struct LegacyIndex {
    storage: IndexStorage,
    path: PathBuf,
    first_ptr: usize,
    entry_count: usize,
}

impl LegacyIndex {
    pub(crate) fn from_storage(path: PathBuf, storage: IndexStorage) -> Result<Self, ScanError> {
        let bytes = storage.as_slice();
        if bytes.len() < HEADER_LEN {
            return Err(ScanError::corrupt(&path, "file is shorter than the 8-byte header"));
        }
        let view = ByteView {
            bytes,
            path: &path,
        };
        let first_ptr = view.u32_at(0)? as usize;
        let last_ptr = view.u32_at(4)? as usize;

        if first_ptr < HEADER_LEN
            || last_ptr < first_ptr
            || (last_ptr - first_ptr) % ENTRY_LEN != 0
            || last_ptr + ENTRY_LEN > bytes.len()
        {
            return Err(ScanError::corrupt(
                &path,
                format!(
                    "index offsets {}..{} do not describe a 7-byte entry table in {} bytes",
                    first_ptr,
                    last_ptr,
                    bytes.len()
                ),
            ));
        }

        let entry_count = (last_ptr - first_ptr) / ENTRY_LEN + 1;
        Ok(LegacyIndex {
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

    /// Binary search over the index; the end of each range comes from its record.
    pub fn search(&self, ip: Ipv4Addr) -> Result<Option<String>, ScanError> {
        let probe = u32::from(ip);
        let view = self.view();
        let mut low = 0usize;
        let mut high = self.entry_count;

        while low < high {
            let mid = low + (high - low) / 2;
            let entry = self.first_ptr + mid * ENTRY_LEN;
            let start = view.u32_at(entry)?;
            if probe < start {
                high = mid;
                continue;
            }
            let record = view.u24_at(entry + 4)?;
            let end = view.u32_at(record)?;
            if probe > end {
                low = mid + 1;
            } else {
                return read_record(&view, record + 4).map(Some);
            }
        }
        Ok(None)
    }
}

fn read_record(view: &ByteView<'_>, offset: usize) -> Result<String, ScanError> {
    let (country, area_offset) = match view.u8_at(offset)? {
        REDIRECT_ALL => {
            let target = view.u24_at(offset + 1)?;
            if view.u8_at(target)? == REDIRECT_COUNTRY {
                let country = view.cstr_at(view.u24_at(target + 1)?)?;
                (country, target + 4)
            } else {
                let country = view.cstr_at(target)?;
                (country, target + country.len() + 1)
            }
        }
        REDIRECT_COUNTRY => {
            let country = view.cstr_at(view.u24_at(offset + 1)?)?;
            (country, offset + 4)
        }
        _ => {
            let country = view.cstr_at(offset)?;
            (country, offset + country.len() + 1)
        }
    };
    let area = read_area(view, area_offset)?;

    let text = format!("{} {}", decode_gbk(country), decode_gbk(area));
    Ok(text.trim().to_string())
}

/// Decodes a GBK string, dropping undecodable bytes.
fn decode_gbk(raw: &[u8]) -> String {
    let (text, had_errors) = GBK.decode_without_bom_handling(raw);
    if had_errors {
        text.chars().filter(|c| *c != char::REPLACEMENT_CHARACTER).collect()
    } else {
        text.into_owned()
    }
}

fn read_area<'a>(view: &ByteView<'a>, offset: usize) -> Result<&'a [u8], ScanError> {
    if offset >= view.bytes.len() {
        return Ok(&[]);
    }
    match view.u8_at(offset)? {
        REDIRECT_ALL | REDIRECT_COUNTRY => match view.u24_at(offset + 1)? {
            0 => Ok(&[]),
            target => view.cstr_at(target),
        },
        _ => view.cstr_at(offset),
    }
}
