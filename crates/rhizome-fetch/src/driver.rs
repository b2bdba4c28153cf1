//! Fetch Driver (C5) — spec.md §4.4–§4.5.
//!
//! `try_fetch`/`start_next` are plain synchronous functions over
//! `&mut FetchScheduler`; the transfer itself is handed off to a
//! [`crate::transfer::run_slot`] task via the [`PendingTransfer`] values
//! they return, since it must do real network I/O (§9 concurrency
//! translation in SPEC_FULL.md).

use rhizome_core::{FileHash, Manifest, Peer};

use crate::admission::import_manifest;
use crate::queue::Candidate;
use crate::scheduler::{store_says_have, FetchScheduler};
use crate::transfer::TransferKind;

/// A slot transition from FREE that needs a spawned task to carry out the
/// actual connect/send/receive work. Returned by `try_fetch`/
/// `start_manifest_prefix_fetch` on `Started`, collected by the scheduler,
/// and handed to `tokio::spawn` once the scheduler lock is released.
pub struct PendingTransfer {
    pub slot_idx: usize,
    pub peer: Peer,
    pub kind: TransferKind,
    pub request: Vec<u8>,
    pub temp_path: std::path::PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixFetchOutcome {
    Started,
    SlotBusy,
    Error,
}

enum TryFetchOutcome {
    Started(PendingTransfer),
    Imported,
    SlotBusy(Manifest),
    SameBundle,
    OlderBundle,
    NewerBundle,
    SamePayload,
    Superseded,
    Error,
}

/// Locate the first free slot (ascending queue/size order) whose queue's
/// size class admits `payload_length` — spec.md §4.5 step 2.
fn find_free_slot_for(sched: &FetchScheduler, payload_length: u64) -> Option<usize> {
    (0..sched.queues.len()).find(|&i| sched.queues[i].accepts(payload_length) && sched.slots[i].is_free())
}

fn build_get_request(path: &str) -> Vec<u8> {
    format!("GET {path} HTTP/1.0\r\n\r\n").into_bytes()
}

/// `try_fetch(manifest, peer)` (C5) — spec.md §4.5.
fn try_fetch(sched: &mut FetchScheduler, manifest: Manifest, peer: Peer) -> TryFetchOutcome {
    // Step 1: empty payload imports in-line.
    if manifest.empty_payload() {
        import_manifest(sched, &manifest);
        return TryFetchOutcome::Imported;
    }

    // Step 2: locate an eligible free slot.
    let Some(slot_idx) = find_free_slot_for(sched, manifest.payload_length) else {
        return TryFetchOutcome::SlotBusy(manifest);
    };

    // Step 3: already superseded by the store.
    if store_says_have(sched, &manifest) {
        return TryFetchOutcome::Superseded;
    }

    // Step 4: scan every active slot's manifest for a BID match.
    for slot in &sched.slots {
        if slot.bid == Some(manifest.bid) {
            return match slot.version {
                Some(in_flight) if manifest.version < in_flight => TryFetchOutcome::OlderBundle,
                Some(in_flight) if manifest.version > in_flight => TryFetchOutcome::NewerBundle,
                _ => TryFetchOutcome::SameBundle,
            };
        }
    }

    // Step 5: manifest must carry a file hash to fetch a payload by.
    let Some(file_hash) = manifest.file_hash.clone() else {
        return TryFetchOutcome::Error;
    };

    // Step 6: payload already stored and valid.
    match sched.store.has_valid_payload(&file_hash) {
        Ok(true) => {
            import_manifest(sched, &manifest);
            return TryFetchOutcome::Imported;
        }
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(fhash = %file_hash, error = %e, "has_valid_payload lookup failed, proceeding with fetch");
        }
    }

    // Step 7: scan every active slot for an FHASH match.
    if sched.slots.iter().any(|s| s.file_hash.as_ref() == Some(&file_hash)) {
        return TryFetchOutcome::SamePayload;
    }

    // Step 8: compose the request, open the temp path, occupy the slot.
    if let Err(e) = std::fs::create_dir_all(&sched.import_dir) {
        tracing::warn!(error = %e, dir = ?sched.import_dir, "create_dir_all failed");
        return TryFetchOutcome::Error;
    }
    let temp_path = sched.import_dir.join(format!("payload.{}", manifest.bid.to_hex()));
    let request = build_get_request(&format!("/rhizome/file/{}", file_hash.as_str()));
    let bid = manifest.bid;
    let version = manifest.version;
    sched.slots[slot_idx].occupy_payload(peer, bid, version, file_hash.clone());

    TryFetchOutcome::Started(PendingTransfer {
        slot_idx,
        peer,
        kind: TransferKind::Payload { manifest, file_hash },
        request,
        temp_path,
    })
}

/// `start_next(Q)` — spec.md §4.4.
fn start_next(sched: &mut FetchScheduler, queue_idx: usize, spawn_list: &mut Vec<PendingTransfer>) {
    loop {
        let Some(candidate) = sched.queues[queue_idx].take_head() else {
            break;
        };
        let Candidate { manifest, peer, priority } = candidate;
        match try_fetch(sched, manifest, peer) {
            TryFetchOutcome::SlotBusy(manifest) => {
                sched.queues[queue_idx].requeue_head(Candidate { manifest, peer, priority });
                break;
            }
            TryFetchOutcome::Started(pending) => spawn_list.push(pending),
            TryFetchOutcome::Imported
            | TryFetchOutcome::SameBundle
            | TryFetchOutcome::OlderBundle
            | TryFetchOutcome::NewerBundle
            | TryFetchOutcome::SamePayload
            | TryFetchOutcome::Superseded
            | TryFetchOutcome::Error => {
                // Candidate already unqueued above; manifest dropped here.
            }
        }
    }
}

/// The periodic tick (§4.4): process every queue in ascending size order.
pub(crate) fn tick(sched: &mut FetchScheduler) -> Vec<PendingTransfer> {
    let mut spawn_list = Vec::new();
    for qi in 0..sched.queues.len() {
        start_next(sched, qi, &mut spawn_list);
    }
    spawn_list
}

/// When slot `slot_idx` frees up, invite it and every smaller-threshold
/// queue to `start_next` — §4.4's closing paragraph.
pub(crate) fn refill_from(sched: &mut FetchScheduler, slot_idx: usize) -> Vec<PendingTransfer> {
    let mut spawn_list = Vec::new();
    for qi in 0..=slot_idx.min(sched.queues.len().saturating_sub(1)) {
        start_next(sched, qi, &mut spawn_list);
    }
    spawn_list
}

/// `request_manifest_by_prefix` — spec.md §6.
pub(crate) fn start_manifest_prefix_fetch(
    sched: &mut FetchScheduler,
    peer: Peer,
    prefix: Vec<u8>,
) -> Result<PendingTransfer, PrefixFetchOutcome> {
    let Some(slot_idx) = find_free_slot_for(sched, sched.max_manifest_bytes) else {
        return Err(PrefixFetchOutcome::SlotBusy);
    };
    if let Err(e) = std::fs::create_dir_all(&sched.import_dir) {
        tracing::warn!(error = %e, dir = ?sched.import_dir, "create_dir_all failed");
        return Err(PrefixFetchOutcome::Error);
    }
    let prefix_hex = hex::encode_upper(&prefix);
    let temp_path = sched.import_dir.join(format!("manifest.{prefix_hex}"));
    let request = build_get_request(&format!("/rhizome/manifestbyprefix/{prefix_hex}"));
    sched.slots[slot_idx].occupy_manifest_prefix(peer);
    Ok(PendingTransfer {
        slot_idx,
        peer,
        kind: TransferKind::ManifestPrefix { prefix },
        request,
        temp_path,
    })
}
