//! Persisted ASN → prefix cache.
//!
//! File format:
//!
//! ```json
//! {"timestamp": 1718000000.5, "version": "1.0", "9808": ["111.11.0.0/24", ...]}
//! ```
//!
//! The whole file expires once `timestamp + TTL <= now`; there is no
//! per-entry expiry. Writes go to a sibling temp file that is then renamed
//! over the target.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::asn::Asn;
use crate::config::{cache_ttl, CACHE_FORMAT_VERSION, NORMALIZATION_WIDTH};
use crate::prefix::Prefix;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    timestamp: f64,
    #[serde(default)]
    version: String,
    #[serde(flatten)]
    entries: BTreeMap<String, Vec<String>>,
}

/// What happened when the cache file was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLoad {
    Missing,
    Unreadable,
    Expired,
    Loaded { asns: usize },
}

fn epoch_secs(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// True when a cache written at `timestamp` is no longer valid at `now`.
pub fn is_expired(timestamp: f64, ttl: Duration, now: SystemTime) -> bool {
    timestamp + ttl.as_secs_f64() <= epoch_secs(now)
}

/// Splits every prefix wider than `width` into `/width` blocks, then sorts
/// and de-duplicates.
pub fn normalize_prefixes(prefixes: &[Prefix], width: u8) -> Vec<Prefix> {
    let mut out: Vec<Prefix> = prefixes.iter().flat_map(|p| p.split_to(width)).collect();
    out.sort();
    out.dedup();
    out
}

/// In-memory view of the cache file with an explicit load/persist lifecycle.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
    ttl: Duration,
    entries: BTreeMap<Asn, Vec<Prefix>>,
}

impl CacheStore {
    /// Empty store bound to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CacheStore {
            path: path.into(),
            ttl: cache_ttl(),
            entries: BTreeMap::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the file at the store's path as of now.
    pub async fn load(&mut self) -> CacheLoad {
        self.load_at(SystemTime::now()).await
    }

    /// Loads the file, evaluating expiry against `now`.
    ///
    /// Missing, unparsable and expired files leave the store empty. Entries
    /// whose key is not an ASN or whose prefixes do not parse are skipped.
    pub async fn load_at(&mut self, now: SystemTime) -> CacheLoad {
        self.entries.clear();

        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CacheLoad::Missing,
            Err(e) => {
                log::warn!("Failed to read prefix cache {}: {}", self.path.display(), e);
                return CacheLoad::Unreadable;
            }
        };
        let file: CacheFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                log::warn!("Ignoring unparsable prefix cache {}: {}", self.path.display(), e);
                return CacheLoad::Unreadable;
            }
        };

        if is_expired(file.timestamp, self.ttl, now) {
            log::info!(
                "Prefix cache {} is older than {} days, discarding",
                self.path.display(),
                self.ttl.as_secs() / 86_400
            );
            return CacheLoad::Expired;
        }
        if file.version != CACHE_FORMAT_VERSION {
            log::debug!(
                "Prefix cache version {:?} differs from {:?}",
                file.version,
                CACHE_FORMAT_VERSION
            );
        }

        for (key, cidrs) in file.entries {
            let Ok(asn) = key.parse::<Asn>() else {
                log::debug!("Skipping non-ASN cache key {:?}", key);
                continue;
            };
            let prefixes: Vec<Prefix> = cidrs
                .iter()
                .filter_map(|cidr| cidr.parse().ok())
                .collect();
            self.entries.insert(asn, prefixes);
        }
        CacheLoad::Loaded {
            asns: self.entries.len(),
        }
    }

    pub fn get(&self, asn: Asn) -> Option<&[Prefix]> {
        self.entries.get(&asn).map(Vec::as_slice)
    }

    pub fn contains(&self, asn: Asn) -> bool {
        self.entries.contains_key(&asn)
    }

    /// Stores `prefixes` for `asn`, normalized to the cache width.
    pub fn insert(&mut self, asn: Asn, prefixes: &[Prefix]) {
        self.entries
            .insert(asn, normalize_prefixes(prefixes, NORMALIZATION_WIDTH));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes every entry with a fresh timestamp.
    pub async fn persist(&self) -> Result<()> {
        self.persist_at(SystemTime::now()).await
    }

    pub async fn persist_at(&self, now: SystemTime) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create cache directory {}", parent.display()))?;
        }

        let file = CacheFile {
            timestamp: epoch_secs(now),
            version: CACHE_FORMAT_VERSION.to_string(),
            entries: self
                .entries
                .iter()
                .map(|(asn, prefixes)| {
                    (
                        asn.to_string(),
                        prefixes.iter().map(Prefix::to_string).collect(),
                    )
                })
                .collect(),
        };
        let content = serde_json::to_string_pretty(&file).context("Failed to serialize cache")?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        tokio::fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("Failed to write cache file {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to move cache into place at {}", self.path.display()))?;

        log::info!(
            "Saved prefix cache for {} ASNs to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}
