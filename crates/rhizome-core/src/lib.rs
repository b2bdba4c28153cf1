//! rhizome-core — shared types and configuration for the Rhizome fetch
//! scheduler. No I/O beyond config file loading lives here; everything else
//! is a plain value type shared by `rhizome-store` and `rhizome-fetch`.

pub mod config;
pub mod manifest;
pub mod manifest_wire;
pub mod peer;

pub use config::RhizomeConfig;
pub use manifest::{Bid, FileHash, Manifest, Version};
pub use peer::Peer;
