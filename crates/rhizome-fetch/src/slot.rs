//! Slot bookkeeping (spec.md §3 "Slot", invariants S1–S3).
//!
//! The actual connect/send/receive work for an occupied slot runs inside a
//! spawned `tokio` task (`transfer::run_slot`); what lives here is just the
//! metadata the rest of the scheduler needs to reason about a slot without
//! reaching into that task — enough to answer `any_fetch_active`, scan for
//! BID/FHASH collisions (§4.5 steps 4/7), and check S1/S4/S5 by inspection.

use rhizome_core::{Bid, FileHash, Peer, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Free,
    Connecting,
    SendingRequest,
    RxHeaders,
    RxBody,
}

/// One queue's single active slot.
pub struct Slot {
    pub phase: Phase,
    pub peer: Option<Peer>,
    /// Set when this slot is transferring a payload (not manifest-by-prefix).
    pub bid: Option<Bid>,
    pub file_hash: Option<FileHash>,
    /// The in-flight manifest's version, for the §4.5 step 4 BID-match
    /// comparison (`OLDER_BUNDLE`/`NEWER_BUNDLE`/`SAME_BUNDLE`).
    pub version: Option<Version>,
}

impl Default for Slot {
    fn default() -> Self {
        Self::free()
    }
}

impl Slot {
    pub fn free() -> Self {
        Self { phase: Phase::Free, peer: None, bid: None, file_hash: None, version: None }
    }

    pub fn is_free(&self) -> bool {
        self.phase == Phase::Free
    }

    /// Invariant S1: a FREE slot holds no peer, BID, or FHASH.
    pub fn is_clean_when_free(&self) -> bool {
        !self.is_free() || (self.peer.is_none() && self.bid.is_none() && self.file_hash.is_none())
    }

    /// Occupy the slot for a payload fetch (manifest present).
    pub fn occupy_payload(&mut self, peer: Peer, bid: Bid, version: Version, file_hash: FileHash) {
        self.phase = Phase::Connecting;
        self.peer = Some(peer);
        self.bid = Some(bid);
        self.version = Some(version);
        self.file_hash = Some(file_hash);
    }

    /// Occupy the slot for a manifest-by-prefix fetch (no BID/FHASH known
    /// yet).
    pub fn occupy_manifest_prefix(&mut self, peer: Peer) {
        self.phase = Phase::Connecting;
        self.peer = Some(peer);
        self.bid = None;
        self.version = None;
        self.file_hash = None;
    }

    pub fn set_phase(&mut self, phase: Phase) {
        debug_assert_ne!(phase, Phase::Free, "use Slot::clear to free a slot");
        self.phase = phase;
    }

    /// Close the slot — §4.6 "close": clear all fields, set FREE.
    pub fn clear(&mut self) {
        *self = Slot::free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddrV4;

    fn peer() -> Peer {
        "127.0.0.1:4110".parse::<SocketAddrV4>().unwrap()
    }

    #[test]
    fn fresh_slot_is_free_and_clean() {
        let s = Slot::free();
        assert!(s.is_free());
        assert!(s.is_clean_when_free());
    }

    #[test]
    fn occupied_slot_is_not_clean_when_free() {
        let mut s = Slot::free();
        s.occupy_payload(peer(), Bid([1u8; 32]), 1, FileHash::new("AB"));
        assert!(!s.is_free());
        s.clear();
        assert!(s.is_free());
        assert!(s.is_clean_when_free());
    }
}
