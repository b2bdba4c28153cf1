//! Version cache (C1) — spec.md §4.1, §9.
//!
//! The cache data structure is implemented in full (it is independently
//! testable, P8), but per the design note in §9 — "the bypass is the safer
//! default" — [`FetchScheduler`](crate::scheduler::FetchScheduler) does not
//! wire it into the hot path; `suggest`/`try_fetch` call the store directly.
//! An implementation that wants the short-circuit can call
//! [`VersionCache::lookup`] before the store query and only fall through on
//! a miss, refreshing from the store as §4.1 requires.

use rhizome_core::Bid;

const BINS: usize = 128;
const ASSOCIATIVITY: usize = 16;
const PREFIX_LEN: usize = 24;

#[derive(Clone, Copy)]
struct Entry {
    prefix: [u8; PREFIX_LEN],
    version: u64,
}

/// Outcome of a version comparison against the store or cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionLookup {
    HaveEqualOrNewer,
    HaveOlderOrNone,
}

pub struct VersionCache {
    bins: Vec<[Option<Entry>; ASSOCIATIVITY]>,
}

impl Default for VersionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionCache {
    pub fn new() -> Self {
        Self { bins: vec![[None; ASSOCIATIVITY]; BINS] }
    }

    fn bin_index(bid: &Bid) -> usize {
        // Top log2(BINS) bits of the BID, per spec.md §3.
        (bid.prefix(1)[0] >> 1) as usize % BINS
    }

    /// Insert or overwrite a random associative slot in the computed bin.
    pub fn store(&mut self, bid: &Bid, version: u64) {
        let bin = &mut self.bins[Self::bin_index(bid)];
        let mut prefix = [0u8; PREFIX_LEN];
        prefix.copy_from_slice(bid.prefix(PREFIX_LEN));
        let idx = rand::random::<usize>() % ASSOCIATIVITY;
        bin[idx] = Some(Entry { prefix, version });
    }

    /// Full 24-byte compare, never an early break (§9: the source's bug is
    /// "after a `break` on byte mismatch, the code still checks `i==24`").
    pub fn lookup(&self, bid: &Bid, version: u64) -> Option<VersionLookup> {
        let mut prefix = [0u8; PREFIX_LEN];
        prefix.copy_from_slice(bid.prefix(PREFIX_LEN));
        let bin = &self.bins[Self::bin_index(bid)];
        for entry in bin.iter().flatten() {
            if entry.prefix == prefix {
                return Some(if entry.version >= version {
                    VersionLookup::HaveEqualOrNewer
                } else {
                    VersionLookup::HaveOlderOrNone
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(b: u8) -> Bid {
        Bid([b; 32])
    }

    #[test]
    fn miss_before_any_store() {
        let cache = VersionCache::new();
        assert_eq!(cache.lookup(&bid(9), 1), None);
    }

    #[test]
    fn store_then_lookup_equal_or_newer() {
        let mut cache = VersionCache::new();
        cache.store(&bid(1), 5);
        assert_eq!(cache.lookup(&bid(1), 5), Some(VersionLookup::HaveEqualOrNewer));
        assert_eq!(cache.lookup(&bid(1), 4), Some(VersionLookup::HaveEqualOrNewer));
    }

    #[test]
    fn store_then_lookup_older_or_none() {
        let mut cache = VersionCache::new();
        cache.store(&bid(2), 5);
        assert_eq!(cache.lookup(&bid(2), 6), Some(VersionLookup::HaveOlderOrNone));
    }

    #[test]
    fn repeated_store_is_idempotent_for_lookup() {
        // P8: repeated store(m) calls with the same manifest leave lookup
        // results unchanged.
        let mut cache = VersionCache::new();
        for _ in 0..10 {
            cache.store(&bid(3), 7);
        }
        assert_eq!(cache.lookup(&bid(3), 7), Some(VersionLookup::HaveEqualOrNewer));
        assert_eq!(cache.lookup(&bid(3), 8), Some(VersionLookup::HaveOlderOrNone));
    }

    #[test]
    fn distinct_bids_with_shared_prefix_scope_do_not_collide() {
        let mut cache = VersionCache::new();
        cache.store(&bid(4), 1);
        // A BID differing only past the 24-byte prefix must still compare
        // equal here (the cache only ever compares the stored prefix), but
        // a BID differing within the first 24 bytes must not match.
        let mut other = [4u8; 32];
        other[5] = 0xFF;
        assert_eq!(cache.lookup(&Bid(other), 1), None);
    }
}
