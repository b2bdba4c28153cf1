//! rhizome-fetch — the payload fetch scheduler (C1–C7), spec.md §2–§4.
//!
//! The public surface mirrors spec.md §6's "Exposed operations":
//! [`scheduler::suggest`], [`scheduler::request_manifest_by_prefix`],
//! [`scheduler::any_fetch_active`], and [`scheduler::tick`], all taking a
//! [`scheduler::SharedScheduler`] built from [`scheduler::FetchScheduler::new`].

mod admission;
mod driver;
mod http;
mod ignore_cache;
mod queue;
pub mod scheduler;
mod slot;
mod transfer;
mod version_cache;

pub use admission::Suggestion;
pub use driver::PrefixFetchOutcome;
pub use scheduler::{any_fetch_active, request_manifest_by_prefix, suggest, tick, FetchScheduler, SharedScheduler};
pub use slot::Phase as SlotPhase;
