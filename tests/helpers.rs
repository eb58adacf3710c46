// Shared test helpers for index fixtures, input files and configs.
//
// Each integration test file includes this with `mod helpers;`, so not every
// helper is used by every file.

#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use asn_region_scan::geoip::CompactIndexBuilder;
use asn_region_scan::{Config, LogFormat, LogLevel};

/// Records of the standard compact fixture.
pub const HEBEI_MOBILE: &str = "中国|河北省|石家庄市|移动";
pub const HEBEI_UNICOM: &str = "中国|河北省|保定市|联通";
pub const SHANDONG_MOBILE: &str = "中国|山东省|济南市|移动";
pub const NO_REGION_MOBILE: &str = "中国|0|0|移动";

fn ip(s: &str) -> Ipv4Addr {
    s.parse().expect("valid IPv4 address")
}

/// Writes a compact index covering:
///
/// - 111.11.0.0 - 111.11.3.255  Hebei mobile
/// - 111.11.4.0 - 111.11.4.255  Shandong mobile
/// - 111.11.5.0 - 111.11.5.255  Hebei unicom
/// - 120.0.0.0  - 120.0.0.255   no region, mobile
///
/// Everything else is a gap.
pub fn write_fixture_index(dir: &Path) -> PathBuf {
    let path = dir.join("fixture.xdb");
    let mut builder = CompactIndexBuilder::new();
    builder
        .add_range(ip("111.11.0.0"), ip("111.11.3.255"), HEBEI_MOBILE)
        .add_range(ip("111.11.4.0"), ip("111.11.4.255"), SHANDONG_MOBILE)
        .add_range(ip("111.11.5.0"), ip("111.11.5.255"), HEBEI_UNICOM)
        .add_range(ip("120.0.0.0"), ip("120.0.0.255"), NO_REGION_MOBILE);
    builder.write_to(&path).expect("Failed to write fixture index");
    path
}

/// Builds a legacy-format index where every record is stored inline as GBK.
///
/// `entries` are `(start, end, country, area)` and must be sorted.
pub fn legacy_index_bytes(entries: &[(&str, &str, &str, &str)]) -> Vec<u8> {
    let mut bytes = vec![0u8; 8];
    let mut offsets = Vec::with_capacity(entries.len());
    for (_, end, country, area) in entries {
        offsets.push(bytes.len() as u32);
        bytes.extend_from_slice(&u32::from(ip(end)).to_le_bytes());
        for text in [country, area] {
            let (encoded, _, _) = encoding_rs::GBK.encode(text);
            bytes.extend_from_slice(&encoded);
            bytes.push(0);
        }
    }

    let first = bytes.len() as u32;
    for ((start, ..), offset) in entries.iter().zip(&offsets) {
        bytes.extend_from_slice(&u32::from(ip(start)).to_le_bytes());
        bytes.extend_from_slice(&offset.to_le_bytes()[..3]);
    }
    let last = first + 7 * (entries.len() as u32 - 1);
    bytes[0..4].copy_from_slice(&first.to_le_bytes());
    bytes[4..8].copy_from_slice(&last.to_le_bytes());
    bytes
}

/// Writes an ASN list file.
pub fn write_asn_file(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("asns.txt");
    std::fs::write(&path, content).expect("Failed to write ASN file");
    path
}

/// Announcement response body in the nested `data.prefixes[].prefix` shape.
pub fn announced_body(prefixes: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "status": "ok",
        "data": {
            "prefixes": prefixes
                .iter()
                .map(|p| serde_json::json!({"prefix": p, "timelines": []}))
                .collect::<Vec<_>>()
        }
    })
}

/// Config pointing every file into `dir` and the source at `server_uri`.
pub fn test_config(dir: &Path, asn_file: PathBuf, index_path: PathBuf, server_uri: &str) -> Config {
    Config {
        asn_file,
        index_path,
        supplementary_index: None,
        cache_path: dir.join("cache").join("prefixes_cache.json"),
        use_cache: false,
        fetch_concurrency: 4,
        scan_workers: 4,
        sample_count: 3,
        region: "河北".to_string(),
        operator: "移动".to_string(),
        output_dir: dir.join("output"),
        output_stem: "hebei_mobile".to_string(),
        no_merge: false,
        timeout_seconds: 5,
        request_spacing_ms: 0,
        source_url: format!("{}/announced-prefixes/data.json?resource=AS{{asn}}", server_uri),
        user_agent: "asn_region_scan_test/1.0".to_string(),
        log_level: LogLevel::Error,
        log_format: LogFormat::Plain,
    }
}
