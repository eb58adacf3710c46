//! Probe address selection.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use rand::Rng;

use crate::config::{SAMPLE_ATTEMPT_FACTOR, SMALL_BLOCK_MAX_ADDRESSES};
use crate::prefix::Prefix;

/// Usable host addresses of a block.
///
/// /32 and /31 have no network or broadcast address to exclude.
fn host_addresses(prefix: &Prefix) -> Vec<Ipv4Addr> {
    let network = prefix.network_u32();
    let broadcast = prefix.broadcast_u32();
    if prefix.len() >= 31 {
        return (network..=broadcast).map(Ipv4Addr::from).collect();
    }
    (network + 1..broadcast).map(Ipv4Addr::from).collect()
}

/// Picks up to `count` probe addresses inside `prefix`.
///
/// Blocks of at most 1024 addresses sample their host list: all hosts when
/// there are no more than `count`, otherwise `count` draws with replacement.
/// Larger blocks draw distinct random offsets in `[1, total - 2]` within a
/// budget of `20 * count` attempts, falling back to the network address if
/// nothing was drawn.
pub fn sample_addresses<R: Rng>(prefix: &Prefix, count: usize, rng: &mut R) -> Vec<Ipv4Addr> {
    if count == 0 {
        return Vec::new();
    }

    if prefix.total() <= SMALL_BLOCK_MAX_ADDRESSES {
        let hosts = host_addresses(prefix);
        if hosts.len() <= count {
            return hosts;
        }
        return (0..count)
            .map(|_| hosts[rng.random_range(0..hosts.len())])
            .collect();
    }

    let network = u64::from(prefix.network_u32());
    let max_offset = prefix.total() - 2;
    let mut picked = BTreeSet::new();
    let mut attempts = 0;
    while picked.len() < count && attempts < count * SAMPLE_ATTEMPT_FACTOR {
        attempts += 1;
        let offset = rng.random_range(1..=max_offset);
        // network + offset <= broadcast - 1, always a valid u32
        picked.insert(Ipv4Addr::from((network + offset) as u32));
    }
    if picked.is_empty() {
        return vec![prefix.network()];
    }
    picked.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn p(s: &str) -> Prefix {
        s.parse().expect("prefix")
    }

    #[test]
    fn test_single_address_blocks() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            sample_addresses(&p("1.2.3.4/32"), 3, &mut rng),
            vec![Ipv4Addr::new(1, 2, 3, 4)]
        );
        assert_eq!(
            sample_addresses(&p("1.2.3.4/31"), 3, &mut rng),
            vec![Ipv4Addr::new(1, 2, 3, 4), Ipv4Addr::new(1, 2, 3, 5)]
        );
    }

    #[test]
    fn test_tiny_block_uses_every_host() {
        let mut rng = StdRng::seed_from_u64(2);
        // /30 has two usable hosts
        assert_eq!(
            sample_addresses(&p("10.0.0.0/30"), 3, &mut rng),
            vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]
        );
    }

    #[test]
    fn test_slash24_draws_exactly_count_hosts() {
        let prefix = p("111.11.4.0/24");
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let samples = sample_addresses(&prefix, 3, &mut rng);
            assert_eq!(samples.len(), 3);
            for ip in samples {
                assert!(prefix.contains(ip));
                assert_ne!(ip, Ipv4Addr::new(111, 11, 4, 0));
                assert_ne!(ip, Ipv4Addr::new(111, 11, 4, 255));
            }
        }
    }

    #[test]
    fn test_large_block_samples_are_distinct_interior_addresses() {
        let prefix = p("10.0.0.0/16");
        let mut rng = StdRng::seed_from_u64(4);
        let samples = sample_addresses(&prefix, 5, &mut rng);
        assert_eq!(samples.len(), 5);
        let distinct: BTreeSet<_> = samples.iter().copied().collect();
        assert_eq!(distinct.len(), 5);
        for ip in samples {
            assert!(prefix.contains(ip));
            assert_ne!(ip, prefix.network());
            assert_ne!(u32::from(ip), prefix.broadcast_u32());
        }
    }

    #[test]
    fn test_whole_space_does_not_overflow() {
        let mut rng = StdRng::seed_from_u64(5);
        let samples = sample_addresses(&p("0.0.0.0/0"), 3, &mut rng);
        assert_eq!(samples.len(), 3);
        assert!(samples.iter().all(|ip| *ip != Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn test_zero_count() {
        let mut rng = StdRng::seed_from_u64(6);
        assert!(sample_addresses(&p("10.0.0.0/24"), 0, &mut rng).is_empty());
        assert!(sample_addresses(&p("10.0.0.0/8"), 0, &mut rng).is_empty());
    }
}
