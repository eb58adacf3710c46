//! IPv4 CIDR prefix value type.
//!
//! A `Prefix` is always stored in canonical form: host bits are cleared on
//! construction, so two prefixes covering the same block compare equal.
//! Ordering is by (network address, prefix length).

use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error_handling::ScanError;

/// An IPv4 CIDR block with zero host bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prefix(Ipv4Net);

impl Prefix {
    /// Builds a prefix, clearing any host bits of `addr`.
    pub fn new(addr: Ipv4Addr, len: u8) -> Result<Self, ScanError> {
        Ipv4Net::new(addr, len)
            .map(|net| Prefix(net.trunc()))
            .map_err(|_| ScanError::InvalidInput(format!("prefix length {} exceeds 32", len)))
    }

    /// Builds a prefix from a numeric network address.
    pub fn from_u32(addr: u32, len: u8) -> Result<Self, ScanError> {
        Self::new(Ipv4Addr::from(addr), len)
    }

    pub fn network(&self) -> Ipv4Addr {
        self.0.network()
    }

    pub fn network_u32(&self) -> u32 {
        u32::from(self.0.network())
    }

    pub fn broadcast_u32(&self) -> u32 {
        u32::from(self.0.broadcast())
    }

    pub fn len(&self) -> u8 {
        self.0.prefix_len()
    }

    /// Number of addresses in the block (2^(32 - len)).
    pub fn total(&self) -> u64 {
        1u64 << (32 - u32::from(self.len()))
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.0.contains(&ip)
    }

    /// True when `other` lies entirely inside this block.
    pub fn covers(&self, other: &Prefix) -> bool {
        self.len() <= other.len() && self.0.contains(&other.0)
    }

    /// The enclosing block one bit shorter, or `None` for /0.
    pub fn supernet(&self) -> Option<Prefix> {
        self.0.supernet().map(|net| Prefix(net.trunc()))
    }

    /// The two halves of this block, or `None` for a /32.
    pub fn halves(&self) -> Option<(Prefix, Prefix)> {
        let len = self.len();
        if len >= 32 {
            return None;
        }
        let mut halves = self.0.subnets(len + 1).ok()?;
        let lower = halves.next()?;
        let upper = halves.next()?;
        Some((Prefix(lower), Prefix(upper)))
    }

    /// True when `self` and `other` are the two distinct halves of one parent.
    pub fn is_sibling_of(&self, other: &Prefix) -> bool {
        if self == other || self.len() != other.len() {
            return false;
        }
        match (self.supernet(), other.supernet()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Splits the block into an exact partition of `/width` blocks.
    ///
    /// Blocks already `/width` or narrower are returned unchanged.
    pub fn split_to(&self, width: u8) -> Vec<Prefix> {
        if self.len() >= width || width > 32 {
            return vec![*self];
        }
        match self.0.subnets(width) {
            Ok(subnets) => subnets.map(Prefix).collect(),
            Err(_) => vec![*self],
        }
    }

    pub fn as_net(&self) -> Ipv4Net {
        self.0
    }
}

impl From<Ipv4Net> for Prefix {
    fn from(net: Ipv4Net) -> Self {
        Prefix(net.trunc())
    }
}

impl Ord for Prefix {
    fn cmp(&self, other: &Self) -> Ordering {
        self.network_u32()
            .cmp(&other.network_u32())
            .then(self.len().cmp(&other.len()))
    }
}

impl PartialOrd for Prefix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.len())
    }
}

impl FromStr for Prefix {
    type Err = ScanError;

    /// Parses `a.b.c.d/n` or a bare address (taken as /32). Host bits are
    /// masked off rather than rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains('/') {
            s.parse::<Ipv4Net>()
                .map(Prefix::from)
                .map_err(|_| ScanError::InvalidInput(format!("not an IPv4 CIDR: {:?}", s)))
        } else {
            s.parse::<Ipv4Addr>()
                .map_err(|_| ScanError::InvalidInput(format!("not an IPv4 address: {:?}", s)))
                .and_then(|addr| Prefix::new(addr, 32))
        }
    }
}

impl Serialize for Prefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Prefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Union of `prefixes` as sorted, disjoint, non-adjacent inclusive ranges.
pub fn address_ranges(prefixes: &[Prefix]) -> Vec<(u64, u64)> {
    let mut ranges: Vec<(u64, u64)> = prefixes
        .iter()
        .map(|p| (u64::from(p.network_u32()), u64::from(p.broadcast_u32())))
        .collect();
    ranges.sort_unstable();

    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(ranges.len());
    for (start, end) in ranges {
        match merged.last_mut() {
            Some((_, last_end)) if start <= *last_end + 1 => *last_end = (*last_end).max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Number of distinct addresses covered by the union of `prefixes`.
pub fn covered_addresses(prefixes: &[Prefix]) -> u64 {
    address_ranges(prefixes)
        .iter()
        .map(|(start, end)| end - start + 1)
        .sum()
}
