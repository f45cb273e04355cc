//! Peer-to-peer plumbing: UDP discovery, the peer table, cascaded BFS
//! peer exchange, and the chain synchronizer.

pub mod cascade;
pub mod client;
pub mod discovery;
pub mod error;
pub mod peer_manager;
pub mod sync;

pub use cascade::CascadeDiscovery;
pub use client::{HealthSummary, NodeClient};
pub use discovery::{Discovery, DiscoveryConfig};
pub use error::NetworkError;
pub use peer_manager::{peer_maintenance_loop, PeerEntry, PeerManager, MAX_FAIL, PEER_TTL};
pub use sync::{Synchronizer, SYNC_INTERVAL};
