//! `FetchScheduler` — the single owning context for queues, slots, and
//! caches (§9: "wrap them in a single owning context passed into every
//! operation rather than relying on file-scope state").
//!
//! Driven from one logical owner at a time via `tokio::sync::Mutex`, per
//! the concurrency translation in SPEC_FULL.md §4: the scheduler itself is
//! single-threaded in spirit (§5 of spec.md), the mutex exists only so the
//! owning daemon can call `suggest` from a different task than the one
//! running `tick`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rhizome_core::{Manifest, Peer, RhizomeConfig};
use rhizome_store::{ManifestStore, ManifestVerifier};
use tokio::sync::Mutex;

use crate::admission::{self, Suggestion};
use crate::driver::{self, PendingTransfer, PrefixFetchOutcome};
use crate::ignore_cache::IgnoreCache;
use crate::queue::Queue;
use crate::slot::Slot;
use crate::transfer;
use crate::version_cache::{VersionCache, VersionLookup};

pub struct FetchScheduler {
    pub(crate) queues: Vec<Queue>,
    /// One slot per queue, index-aligned — slot `i` belongs to `queues[i]`
    /// exactly as spec.md §3 describes ("each with one active slot").
    pub(crate) slots: Vec<Slot>,
    pub(crate) ignore_cache: IgnoreCache,
    /// Kept for completeness (C1's data structure, tested in isolation);
    /// not wired into the hot path — see version_cache.rs's module doc.
    #[allow(dead_code)]
    pub(crate) version_cache: VersionCache,
    pub(crate) store: Arc<dyn ManifestStore>,
    pub(crate) verifier: Arc<dyn ManifestVerifier>,
    pub(crate) import_dir: PathBuf,
    pub(crate) max_manifest_bytes: u64,
    pub(crate) idle_timeout: Duration,
}

/// A scheduler shared between the daemon's `suggest` callers and its
/// periodic tick — see the module doc.
pub type SharedScheduler = Arc<Mutex<FetchScheduler>>;

impl FetchScheduler {
    pub fn new(
        config: RhizomeConfig,
        store: Arc<dyn ManifestStore>,
        verifier: Arc<dyn ManifestVerifier>,
    ) -> Self {
        let queues: Vec<Queue> = config
            .queues
            .iter()
            .map(|shape| Queue::new(shape.size_threshold, shape.capacity))
            .collect();
        let slots = queues.iter().map(|_| Slot::free()).collect();
        Self {
            queues,
            slots,
            ignore_cache: IgnoreCache::new(),
            version_cache: VersionCache::new(),
            store,
            verifier,
            import_dir: config.import_dir,
            max_manifest_bytes: config.max_manifest_bytes,
            idle_timeout: Duration::from_millis(config.idle_timeout_ms),
        }
    }

    pub fn into_shared(self) -> SharedScheduler {
        Arc::new(Mutex::new(self))
    }

    /// Invariant Q2: smallest queue whose threshold exceeds `payload_length`.
    pub(crate) fn queue_index_for(&self, payload_length: u64) -> Option<usize> {
        self.queues.iter().position(|q| q.accepts(payload_length))
    }

    pub(crate) fn total_queued(&self) -> usize {
        self.queues.iter().map(Queue::len).sum()
    }

    /// `any_fetch_active()` — spec.md §6: a simple scan, preserved verbatim
    /// in shape per SPEC_FULL.md's SUPPLEMENT note.
    pub fn any_fetch_active(&self) -> bool {
        self.slots.iter().any(|s| !s.is_free())
    }
}

/// Consult the store for an existing version and translate it into the
/// "do not fetch" decision every caller (`admission`, `driver`) needs.
/// Store errors are treated as "unknown", which callers must treat as
/// "do not fetch" (spec.md §4.1 Failure, §7 Store taxonomy) — but a store
/// error must never be cached into C1, so this never touches the version
/// cache on failure.
pub(crate) fn store_says_have(sched: &FetchScheduler, manifest: &Manifest) -> bool {
    match sched.store.select_version(&manifest.bid) {
        Ok(Some(stored)) if stored >= manifest.version => true,
        Ok(_) => false,
        Err(e) => {
            tracing::warn!(bid = %manifest.bid.to_hex(), error = %e, "store lookup failed, treating as do-not-fetch");
            true
        }
    }
}

#[allow(dead_code)]
pub(crate) fn classify_lookup(sched: &FetchScheduler, manifest: &Manifest) -> Option<VersionLookup> {
    match sched.store.select_version(&manifest.bid) {
        Ok(Some(stored)) if stored >= manifest.version => Some(VersionLookup::HaveEqualOrNewer),
        Ok(_) => Some(VersionLookup::HaveOlderOrNone),
        Err(_) => None,
    }
}

/// Public API: offer a `(manifest, peer)` pair for admission (§4.3).
pub async fn suggest(sched: &SharedScheduler, manifest: Manifest, peer: Peer) -> Suggestion {
    let mut guard = sched.lock().await;
    admission::suggest(&mut guard, manifest, peer)
}

/// Public API: `request_manifest_by_prefix` — spec.md §6.
pub async fn request_manifest_by_prefix(
    sched: &SharedScheduler,
    peer: Peer,
    prefix: Vec<u8>,
) -> PrefixFetchOutcome {
    let pending = {
        let mut guard = sched.lock().await;
        driver::start_manifest_prefix_fetch(&mut guard, peer, prefix)
    };
    match pending {
        Ok(pending) => {
            spawn_transfer(sched.clone(), pending);
            PrefixFetchOutcome::Started
        }
        Err(outcome) => outcome,
    }
}

/// Public API: `any_fetch_active()`.
pub async fn any_fetch_active(sched: &SharedScheduler) -> bool {
    sched.lock().await.any_fetch_active()
}

/// Public API: the fetch driver's periodic tick (§4.4). Intended to be
/// driven by a `tokio::time::interval` in the daemon binary.
pub async fn tick(sched: &SharedScheduler) {
    let pending = {
        let mut guard = sched.lock().await;
        driver::tick(&mut guard)
    };
    for p in pending {
        spawn_transfer(sched.clone(), p);
    }
}

pub(crate) fn spawn_transfer(sched: SharedScheduler, pending: PendingTransfer) {
    tokio::spawn(transfer::run_slot(sched, pending));
}

/// Called after a slot becomes FREE: invites that queue and every
/// smaller-threshold queue to `start_next` (§4.4 tail).
pub(crate) async fn refill_from(sched: &SharedScheduler, slot_idx: usize) {
    let pending = {
        let mut guard = sched.lock().await;
        driver::refill_from(&mut guard, slot_idx)
    };
    for p in pending {
        spawn_transfer(sched.clone(), p);
    }
}
