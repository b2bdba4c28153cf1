//! rhizomed — Rhizome payload fetch scheduler daemon.
//!
//! Thin ambient plumbing only (SPEC_FULL.md §2's AMBIENT crate layout):
//! loads config, opens the store, builds the scheduler, and runs its
//! periodic tick. Serving incoming fetch requests is the MDP/HTTP server
//! side and is explicitly out of scope (spec.md §1) — this binary only
//! issues outbound GETs on behalf of the local node.

use std::sync::Arc;

use anyhow::Result;
use rhizome_core::RhizomeConfig;
use rhizome_store::{SqliteStore, StubVerifier};

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity, e.g. RUST_LOG=debug cargo run -p rhizomed
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = RhizomeConfig::load()?;
    tracing::info!(
        queues = config.queues.len(),
        fetch_interval_ms = config.fetch_interval_ms,
        idle_timeout_ms = config.idle_timeout_ms,
        import_dir = ?config.import_dir,
        "rhizomed starting"
    );

    let db_path = rhizome_core::config::data_dir_for_store();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(SqliteStore::open(&db_path)?);

    // Real signature verification is an external collaborator (spec.md
    // §1) not designed here; the stub accepts everything until one is
    // wired in.
    let verifier = Arc::new(StubVerifier::new());

    let fetch_interval = std::time::Duration::from_millis(config.fetch_interval_ms);
    let scheduler = rhizome_fetch::FetchScheduler::new(config, store, verifier).into_shared();

    let tick_task = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(fetch_interval);
            loop {
                interval.tick().await;
                rhizome_fetch::tick(&scheduler).await;
            }
        })
    };

    tokio::select! {
        r = tick_task => tracing::error!("fetch driver tick task exited: {:?}", r),
    }

    Ok(())
}
