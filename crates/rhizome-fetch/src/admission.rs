//! Admission — `suggest(manifest, peer)` (C4) — spec.md §4.3.

use std::time::{Duration, Instant};

use rhizome_core::{Manifest, Peer};

use crate::queue::Candidate;
use crate::scheduler::{store_says_have, FetchScheduler};

/// Outcome of `suggest`. Ownership of the offered manifest is consumed in
/// every case — on `Enqueued` it moved into a queue; on `Imported` it was
/// handed to the store by reference and then dropped; on `Rejected` it is
/// simply dropped. There is no variant that hands it back (§9: "on every
/// non-ENQUEUED outcome the manifest is freed").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suggestion {
    Enqueued,
    Imported,
    Rejected,
}

const IGNORE_TTL: Duration = Duration::from_millis(60_000);

pub fn suggest(sched: &mut FetchScheduler, manifest: Manifest, peer: Peer) -> Suggestion {
    suggest_with_priority(sched, manifest, peer, 100)
}

/// As [`suggest`], but with an explicit priority — exercised directly by
/// tests (spec.md §8 scenario 4); every real call site uses the default of
/// 100 via [`suggest`].
pub fn suggest_with_priority(
    sched: &mut FetchScheduler,
    manifest: Manifest,
    peer: Peer,
    priority: i32,
) -> Suggestion {
    // Step 1: already have it?
    if store_says_have(sched, &manifest) {
        tracing::debug!(bid = %manifest.bid.to_hex(), "suggest: already have equal or newer, rejected");
        return Suggestion::Rejected;
    }

    // Step 2: empty payload imports in-line unconditionally (verification
    // is not gated by self_signed here, unlike steps 4/6).
    if manifest.empty_payload() {
        if !sched.verifier.verify(&manifest) {
            sched.ignore_cache.ignore(manifest.bid, peer, IGNORE_TTL, Instant::now());
            tracing::debug!(bid = %manifest.bid.to_hex(), "suggest: empty-payload verify failed, ignored");
            return Suggestion::Rejected;
        }
        import_manifest(sched, &manifest);
        return Suggestion::Imported;
    }

    // Step 3: pick the target queue via Q2.
    let Some(target) = sched.queue_index_for(manifest.payload_length) else {
        tracing::warn!("suggest: no queue accepts payload_length, rejected");
        return Suggestion::Rejected;
    };

    // Step 4: scan all queues for duplicates and an insertion point.
    let mut insertion_index: Option<usize> = None;
    for qi in 0..sched.queues.len() {
        let mut j = 0;
        loop {
            let len = sched.queues[qi].len();
            if j >= len {
                if qi == target && insertion_index.is_none() {
                    insertion_index = Some(j);
                }
                break;
            }
            let candidate = sched.queues[qi].get(j).expect("j < len");
            if candidate.manifest.bid == manifest.bid {
                if candidate.manifest.version >= manifest.version {
                    tracing::debug!(bid = %manifest.bid.to_hex(), "suggest: older/equal duplicate, rejected");
                    return Suggestion::Rejected;
                }
                if !manifest.self_signed && !sched.verifier.verify(&manifest) {
                    sched.ignore_cache.ignore(manifest.bid, peer, IGNORE_TTL, Instant::now());
                    return Suggestion::Rejected;
                }
                sched.queues[qi].remove_at(j);
                // Do not advance `j` — the next candidate has shifted into
                // this index; keep scanning for further stale duplicates.
                continue;
            }
            if qi == target && insertion_index.is_none() && candidate.priority > priority {
                insertion_index = Some(j);
            }
            j += 1;
        }
    }

    // Step 5: no slot available in Qi.
    let Some(insertion_index) = insertion_index else {
        tracing::debug!(bid = %manifest.bid.to_hex(), "suggest: target queue full of higher-priority entries, rejected");
        return Suggestion::Rejected;
    };

    // Step 6: final verification.
    if !manifest.self_signed && !sched.verifier.verify(&manifest) {
        sched.ignore_cache.ignore(manifest.bid, peer, IGNORE_TTL, Instant::now());
        return Suggestion::Rejected;
    }

    // Step 7: insert.
    let bid = manifest.bid;
    let mut candidate = Candidate::new(manifest, peer);
    candidate.priority = priority;
    let evicted = sched.queues[target].insert_at(insertion_index, candidate);
    if let Some(evicted) = evicted {
        tracing::debug!(bid = %evicted.manifest.bid.to_hex(), "suggest: evicted tail candidate on insert");
    }
    tracing::trace!(bid = %bid.to_hex(), queue = target, index = insertion_index, "suggest: enqueued");
    log_queue_occupancy(sched);
    Suggestion::Enqueued
}

/// Finalise a manifest to the store with `ttl - 1`, per §4.6/§4.3.
pub(crate) fn import_manifest(sched: &FetchScheduler, manifest: &Manifest) {
    let ttl = manifest.ttl.saturating_sub(1);
    if let Err(e) = sched.store.import_bundle(manifest, ttl) {
        tracing::warn!(bid = %manifest.bid.to_hex(), error = %e, "import_bundle failed");
    }
}

fn log_queue_occupancy(sched: &FetchScheduler) {
    if !tracing::enabled!(tracing::Level::TRACE) {
        return;
    }
    for (i, q) in sched.queues.iter().enumerate() {
        tracing::trace!(queue = i, occupancy = q.len(), capacity = q.capacity(), "queue occupancy");
    }
}
