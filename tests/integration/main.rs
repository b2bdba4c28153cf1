//! End-to-end tests for the Rhizome fetch scheduler, exercised through its
//! public API (`rhizome_fetch::{suggest, tick}`) rather than through any
//! single module's internals.
//!
//! Each test builds a `SharedScheduler` over an in-memory `SqliteStore`
//! and a permissive `StubVerifier`; network-facing tests stand up a real
//! `tokio::net::TcpListener` as the remote peer, matching `transfer.rs`'s
//! own test style.

use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use rhizome_core::{Bid, FileHash, Manifest, Peer, RhizomeConfig};
use rhizome_fetch::{suggest, tick, FetchScheduler, Suggestion};
use rhizome_store::{ManifestStore, SqliteStore, StubVerifier};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn test_config(import_dir: std::path::PathBuf) -> RhizomeConfig {
    let mut config = RhizomeConfig::default();
    config.import_dir = import_dir;
    config.idle_timeout_ms = 2_000;
    config
}

fn manifest(bid_byte: u8, version: u64, payload_length: u64, file_hash: Option<&str>) -> Manifest {
    Manifest {
        bid: Bid([bid_byte; 32]),
        version,
        payload_length,
        file_hash: file_hash.map(FileHash::new),
        ttl: 5,
        self_signed: false,
        raw: b"manifest-bytes".to_vec(),
    }
}

fn peer_at(addr: SocketAddr) -> Peer {
    match addr {
        SocketAddr::V4(v4) => v4,
        SocketAddr::V6(_) => panic!("rhizome-fetch is IPv4-only, per spec.md §1"),
    }
}

fn loopback_peer(port: u16) -> Peer {
    SocketAddrV4::new(std::net::Ipv4Addr::LOCALHOST, port)
}

// ══════════════════════════════════════════════════════════════════════
//  Admission (C4) through the public `suggest` entry point
// ══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn empty_payload_manifest_is_imported_immediately() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let verifier = Arc::new(StubVerifier::new());
    let sched = FetchScheduler::new(test_config(std::env::temp_dir()), store.clone(), verifier).into_shared();

    let m = manifest(1, 1, 0, None);
    let bid = m.bid;
    let outcome = suggest(&sched, m, loopback_peer(9999)).await;

    assert!(matches!(outcome, Suggestion::Imported));
    assert_eq!(store.select_version(&bid).unwrap(), Some(1));
}

#[tokio::test]
async fn superseded_manifest_is_rejected_without_touching_queues() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let verifier = Arc::new(StubVerifier::new());
    let have = manifest(2, 5, 0, None);
    store.import_bundle(&have, have.ttl - 1).unwrap();

    let sched = FetchScheduler::new(test_config(std::env::temp_dir()), store, verifier).into_shared();

    let older = manifest(2, 3, 100, Some("deadbeef"));
    let outcome = suggest(&sched, older, loopback_peer(9999)).await;

    assert!(matches!(outcome, Suggestion::Rejected));
    assert!(!rhizome_fetch::any_fetch_active(&sched).await);
}

#[tokio::test]
async fn older_duplicate_already_queued_is_evicted_by_newer_offer() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let verifier = Arc::new(StubVerifier::new());
    let sched = FetchScheduler::new(test_config(std::env::temp_dir()), store, verifier).into_shared();

    let old = manifest(3, 1, 100, Some("aaaa"));
    let newer = manifest(3, 2, 100, Some("cccc"));

    let outcome_old = suggest(&sched, old, loopback_peer(1)).await;
    assert!(matches!(outcome_old, Suggestion::Enqueued));

    let outcome_newer = suggest(&sched, newer, loopback_peer(3)).await;
    assert!(matches!(outcome_newer, Suggestion::Enqueued));

    assert!(!rhizome_fetch::any_fetch_active(&sched).await);
}

// ══════════════════════════════════════════════════════════════════════
//  Fetch driver (C5) + transfer (C6/C7) end to end over a real socket
// ══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn tick_drives_a_queued_candidate_through_a_real_http_fetch() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let n = socket.read(&mut buf).await.unwrap();
        let request = String::from_utf8_lossy(&buf[..n]);
        assert!(request.starts_with("GET /rhizome/file/"));

        let body = b"rhizome payload bytes";
        let response = format!(
            "HTTP/1.0 200 OK\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.write_all(body).await.unwrap();
    });

    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let verifier = Arc::new(StubVerifier::new());
    let import_dir = tempfile::tempdir().unwrap();
    let sched = FetchScheduler::new(
        test_config(import_dir.path().to_path_buf()),
        store.clone(),
        verifier,
    )
    .into_shared();

    let m = manifest(4, 1, 21, Some("CAFEF00D"));
    let bid = m.bid;
    let fhash = m.file_hash.clone().unwrap();

    let outcome = suggest(&sched, m, peer_at(addr)).await;
    assert!(matches!(outcome, Suggestion::Enqueued));

    tick(&sched).await;

    // Wait for the spawned transfer task to finish and import the bundle.
    let mut imported = false;
    for _ in 0..50 {
        if store.has_valid_payload(&fhash).unwrap() {
            imported = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    server.await.unwrap();
    assert!(imported, "payload was never imported into the store");
    assert_eq!(store.select_version(&bid).unwrap(), Some(1));
    assert!(!rhizome_fetch::any_fetch_active(&sched).await);
}

#[tokio::test]
async fn an_unresponsive_peer_frees_the_slot_after_the_idle_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let verifier = Arc::new(StubVerifier::new());
    let import_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(import_dir.path().to_path_buf());
    config.idle_timeout_ms = 200;
    let sched = FetchScheduler::new(config, store.clone(), verifier).into_shared();

    let m = manifest(5, 1, 21, Some("FEEDFACE"));
    let fhash = m.file_hash.clone().unwrap();

    suggest(&sched, m, peer_at(addr)).await;
    tick(&sched).await;

    let mut freed = false;
    for _ in 0..50 {
        if !rhizome_fetch::any_fetch_active(&sched).await {
            freed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    server.abort();
    assert!(freed, "slot never freed after the idle timeout elapsed");
    assert!(!store.has_valid_payload(&fhash).unwrap());
}
