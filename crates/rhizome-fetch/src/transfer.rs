//! Transfer State Machine (C6) — spec.md §4.6.
//!
//! Realised as a `tokio` task per occupied slot (SPEC_FULL.md §4's
//! concurrency translation) instead of raw `poll()`; the state sequence —
//! CONNECTING → SENDING_REQUEST → RX_HEADERS → RX_BODY → close — is the
//! same, with `tokio::time::timeout` standing in for the idle alarm.

use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

use rhizome_core::{FileHash, Manifest, Peer};

use crate::driver::PendingTransfer;
use crate::http;
use crate::scheduler::SharedScheduler;
use crate::slot::Phase;

/// Request buffer / header buffer cap (§9: "implementations SHOULD keep
/// two distinct buffers and still cap the header buffer at 1 KiB").
const MAX_HEADER_BYTES: usize = 1024;
const BODY_CHUNK: usize = 8192;

/// What a slot's transfer is fetching — a payload (manifest already
/// known) or a manifest by BID prefix (§6, SPEC_FULL.md SUPPLEMENT).
pub enum TransferKind {
    Payload { manifest: Manifest, file_hash: FileHash },
    ManifestPrefix { prefix: Vec<u8> },
}

#[derive(Debug, thiserror::Error)]
enum TransferError {
    #[error("connect failed: {0}")]
    Connect(std::io::Error),
    #[error("write failed: {0}")]
    Write(std::io::Error),
    #[error("read failed: {0}")]
    Read(std::io::Error),
    #[error("connection closed before headers were complete")]
    ClosedDuringHeaders,
    #[error("connection closed before body was complete")]
    ClosedDuringBody,
    #[error("header block exceeded 1 KiB without a blank line")]
    HeaderTooLong,
    #[error("malformed response: {0}")]
    BadResponse(#[from] http::ParseError),
    #[error("unexpected status {0}")]
    BadStatus(u16),
    #[error("temp file error: {0}")]
    File(std::io::Error),
    #[error("idle timeout elapsed")]
    Timeout,
}

/// Drive one slot's transfer to completion, then free the slot and invite
/// the driver to refill it (§4.6 close).
pub(crate) async fn run_slot(sched: SharedScheduler, pending: PendingTransfer) {
    let PendingTransfer { slot_idx, peer, kind, request, temp_path } = pending;
    let idle_timeout = sched.lock().await.idle_timeout;

    match run_transfer(&sched, slot_idx, peer, &request, &temp_path, idle_timeout).await {
        Ok(()) => {
            tracing::debug!(peer = %peer, path = ?temp_path, "transfer complete");
            finish(&sched, kind, &temp_path, peer).await;
        }
        Err(e) => {
            tracing::warn!(peer = %peer, error = %e, "transfer failed, closing slot");
        }
    }

    let _ = tokio::fs::remove_file(&temp_path).await;

    {
        let mut guard = sched.lock().await;
        guard.slots[slot_idx].clear();
    }
    crate::scheduler::refill_from(&sched, slot_idx).await;
}

async fn set_phase(sched: &SharedScheduler, slot_idx: usize, phase: Phase) {
    let mut guard = sched.lock().await;
    if !guard.slots[slot_idx].is_free() {
        guard.slots[slot_idx].set_phase(phase);
    }
}

async fn run_transfer(
    sched: &SharedScheduler,
    slot_idx: usize,
    peer: Peer,
    request: &[u8],
    temp_path: &Path,
    idle_timeout: Duration,
) -> Result<(), TransferError> {
    let mut stream = timeout(idle_timeout, TcpStream::connect(std::net::SocketAddr::V4(peer)))
        .await
        .map_err(|_| TransferError::Timeout)?
        .map_err(TransferError::Connect)?;

    set_phase(sched, slot_idx, Phase::SendingRequest).await;
    timeout(idle_timeout, stream.write_all(request))
        .await
        .map_err(|_| TransferError::Timeout)?
        .map_err(TransferError::Write)?;

    set_phase(sched, slot_idx, Phase::RxHeaders).await;
    let (response, leftover) = read_headers(&mut stream, idle_timeout).await?;
    if response.code != 200 {
        return Err(TransferError::BadStatus(response.code));
    }

    set_phase(sched, slot_idx, Phase::RxBody).await;
    write_body(&mut stream, temp_path, response.content_length, leftover, idle_timeout).await
}

async fn read_headers(
    stream: &mut TcpStream,
    idle_timeout: Duration,
) -> Result<(http::Response, Vec<u8>), TransferError> {
    let mut header_buf: Vec<u8> = Vec::new();
    loop {
        if header_buf.len() >= MAX_HEADER_BYTES - 1 {
            return Err(TransferError::HeaderTooLong);
        }
        let mut chunk = [0u8; 256];
        let max_read = (MAX_HEADER_BYTES - 1 - header_buf.len()).min(chunk.len());
        let n = timeout(idle_timeout, stream.read(&mut chunk[..max_read]))
            .await
            .map_err(|_| TransferError::Timeout)?
            .map_err(TransferError::Read)?;
        if n == 0 {
            return Err(TransferError::ClosedDuringHeaders);
        }
        header_buf.extend_from_slice(&chunk[..n]);
        if http::header_boundary(&header_buf).is_some() {
            let response = http::parse(&header_buf)?;
            let leftover = header_buf[response.content_start..].to_vec();
            return Ok((response, leftover));
        }
    }
}

async fn write_body(
    stream: &mut TcpStream,
    temp_path: &Path,
    content_length: u64,
    leftover: Vec<u8>,
    idle_timeout: Duration,
) -> Result<(), TransferError> {
    let mut file = tokio::fs::File::create(temp_path).await.map_err(TransferError::File)?;
    let mut received: u64 = 0;

    if !leftover.is_empty() {
        let take = (leftover.len() as u64).min(content_length.saturating_sub(received)) as usize;
        file.write_all(&leftover[..take]).await.map_err(TransferError::File)?;
        received += take as u64;
    }

    let mut buf = [0u8; BODY_CHUNK];
    while received < content_length {
        let remaining = (content_length - received) as usize;
        let max_read = remaining.min(BODY_CHUNK);
        let n = timeout(idle_timeout, stream.read(&mut buf[..max_read]))
            .await
            .map_err(|_| TransferError::Timeout)?
            .map_err(TransferError::Read)?;
        if n == 0 {
            return Err(TransferError::ClosedDuringBody);
        }
        file.write_all(&buf[..n]).await.map_err(TransferError::File)?;
        received += n as u64;
    }
    file.flush().await.map_err(TransferError::File)?;
    Ok(())
}

/// On RX_BODY completion: import a payload fetch, or decode and re-suggest
/// a manifest-by-prefix fetch — spec.md §4.6's completion clause.
async fn finish(sched: &SharedScheduler, kind: TransferKind, temp_path: &Path, peer: Peer) {
    match kind {
        TransferKind::Payload { manifest, .. } => {
            let guard = sched.lock().await;
            crate::admission::import_manifest(&guard, &manifest);
        }
        TransferKind::ManifestPrefix { prefix } => match tokio::fs::read(temp_path).await {
            Ok(bytes) => match rhizome_core::manifest_wire::decode(&bytes) {
                Some(manifest) => {
                    let mut guard = sched.lock().await;
                    let _ = crate::admission::suggest(&mut guard, manifest, peer);
                }
                None => {
                    tracing::warn!(prefix = %hex::encode_upper(&prefix), "manifest-by-prefix response did not decode");
                }
            },
            Err(e) => tracing::warn!(error = %e, "failed reading manifest-by-prefix temp file"),
        },
    }
}
