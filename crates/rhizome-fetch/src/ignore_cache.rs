//! Ignore cache (C2) — spec.md §3, §4.2. A time-bounded negative cache of
//! BIDs that recently failed verification.

use std::time::{Duration, Instant};

use rhizome_core::{Bid, Peer};

const BINS: usize = 64;
const ASSOCIATIVITY: usize = 8;

struct Entry {
    bid: Bid,
    /// Informational only (§4.2): not consulted by `is_ignored`.
    #[allow(dead_code)]
    peer: Peer,
    expiry: Instant,
}

pub struct IgnoreCache {
    bins: Vec<[Option<Entry>; ASSOCIATIVITY]>,
}

impl Default for IgnoreCache {
    fn default() -> Self {
        Self::new()
    }
}

impl IgnoreCache {
    pub fn new() -> Self {
        Self { bins: (0..BINS).map(|_| Default::default()).collect() }
    }

    fn bin_index(bid: &Bid) -> usize {
        // Top 6 bits of the first BID byte.
        (bid.prefix(1)[0] >> 2) as usize % BINS
    }

    pub fn is_ignored(&self, bid: &Bid, now: Instant) -> bool {
        let bin = &self.bins[Self::bin_index(bid)];
        bin.iter()
            .flatten()
            .any(|e| &e.bid == bid && e.expiry > now)
    }

    /// Insert `bid`, replacing an existing entry for the same BID if one
    /// exists in its bin, otherwise a random slot.
    pub fn ignore(&mut self, bid: Bid, peer: Peer, ttl: Duration, now: Instant) {
        let bin = &mut self.bins[Self::bin_index(&bid)];
        let expiry = now + ttl;
        if let Some(existing) = bin.iter_mut().flatten().find(|e| e.bid == bid) {
            existing.expiry = expiry;
            existing.peer = peer;
            return;
        }
        let idx = rand::random::<usize>() % ASSOCIATIVITY;
        bin[idx] = Some(Entry { bid, peer, expiry });
    }
}
