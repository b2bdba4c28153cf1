//! Candidate queues (C3) — spec.md §3, §4.3 step 4/7, invariants Q1–Q3.
//!
//! Candidates occupy a contiguous prefix of a fixed-capacity array (Q1);
//! the remaining entries are logically empty. This is realised directly as
//! `Vec<Option<Candidate>>` rather than porting the C array-plus-shift code
//! literally, but every operation below preserves the shift semantics the
//! spec describes (insertion/removal shifts the tail, never leaves a hole).

use rhizome_core::{Bid, Manifest, Peer};

/// A pending fetch (spec.md §3 "Candidate").
pub struct Candidate {
    pub manifest: Manifest,
    pub peer: Peer,
    /// Lower is more urgent. Every current call site uses the default of
    /// 100; the field stays settable for testing §8 scenario 4.
    pub priority: i32,
}

impl Candidate {
    pub fn new(manifest: Manifest, peer: Peer) -> Self {
        Self { manifest, peer, priority: 100 }
    }
}

/// One size-classed queue (spec.md §3 "Queue").
pub struct Queue {
    /// `None` means unbounded; this queue accepts any payload size.
    pub size_threshold: Option<u64>,
    slots: Vec<Option<Candidate>>,
}

impl Queue {
    pub fn new(size_threshold: Option<u64>, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { size_threshold, slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Index of the first empty entry — Invariant Q1's "end of queue".
    pub fn len(&self) -> usize {
        self.slots.iter().take_while(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Invariant Q2: does this queue's size class admit `payload_length`?
    pub fn accepts(&self, payload_length: u64) -> bool {
        match self.size_threshold {
            Some(t) => payload_length < t,
            None => true,
        }
    }

    /// Read-only access to candidate at `idx`, for admission's scan.
    pub fn get(&self, idx: usize) -> Option<&Candidate> {
        self.slots.get(idx).and_then(|c| c.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.slots.iter().filter_map(|c| c.as_ref())
    }

    /// Remove the candidate at `idx`, shifting everything after it left by
    /// one. Returns the removed candidate, if any — it is the caller's
    /// responsibility to do something with it (or let it drop, freeing it,
    /// exactly as §4.3 step 4's eviction does).
    pub fn remove_at(&mut self, idx: usize) -> Option<Candidate> {
        let len = self.len();
        if idx >= len {
            return None;
        }
        let removed = self.slots[idx].take();
        for i in idx..len - 1 {
            self.slots[i] = self.slots[i + 1].take();
        }
        self.slots[len - 1] = None;
        removed
    }

    /// Remove and return the head candidate (index 0), if any.
    pub fn take_head(&mut self) -> Option<Candidate> {
        self.remove_at(0)
    }

    /// Insert `candidate` at `idx`, shifting the tail right by one.
    /// The candidate that falls off the end (if the queue is full) is
    /// returned to the caller to dispose of (§4.3 step 7's "evicted tail
    /// entry ... is freed").
    pub fn insert_at(&mut self, idx: usize, candidate: Candidate) -> Option<Candidate> {
        let cap = self.capacity();
        debug_assert!(idx <= self.len().min(cap));
        let len = self.len();
        let evicted = if len == cap { self.slots[cap - 1].take() } else { None };
        let shift_end = if len == cap { cap - 1 } else { len };
        let mut i = shift_end;
        while i > idx {
            self.slots[i] = self.slots[i - 1].take();
            i -= 1;
        }
        self.slots[idx] = Some(candidate);
        evicted
    }

    /// Put a candidate back at the head without eviction bookkeeping —
    /// used only by the driver's `SLOT_BUSY` path (§4.4), where a slot was
    /// just vacated by `take_head` so capacity is guaranteed available.
    pub fn requeue_head(&mut self, candidate: Candidate) {
        debug_assert!(!self.is_full());
        self.insert_at(0, candidate);
    }

    /// True if any populated candidate in this queue carries `bid`.
    pub fn contains_bid(&self, bid: &Bid) -> bool {
        self.iter().any(|c| &c.manifest.bid == bid)
    }
}
