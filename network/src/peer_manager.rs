//! The peer table: addresses, liveness, failure tracking, eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

/// Consecutive failures after which a peer is evicted.
pub const MAX_FAIL: u32 = 3;
/// Peers unseen for this long are evicted by the maintenance sweep.
pub const PEER_TTL: Duration = Duration::from_secs(300);
/// How often the maintenance sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Per-peer metadata tracked by the [`PeerManager`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerEntry {
    pub address: String,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub height: u64,
    #[serde(skip)]
    pub consecutive_failures: u32,
}

/// Registry of known peers keyed by `host:port`.
pub struct PeerManager {
    peers: HashMap<String, PeerEntry>,
    max_peers: usize,
}

fn valid_address(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

impl PeerManager {
    pub fn new(max_peers: usize) -> Self {
        Self {
            peers: HashMap::new(),
            max_peers,
        }
    }

    /// Add a peer, refreshing `last_seen` when it is already known.
    /// Returns `true` only for a brand-new entry.
    pub fn add_peer(&mut self, address: &str) -> bool {
        if !valid_address(address) {
            tracing::debug!(address, "ignoring malformed peer address");
            return false;
        }
        let now = Utc::now();
        if let Some(existing) = self.peers.get_mut(address) {
            existing.last_seen = now;
            return false;
        }
        if self.peers.len() >= self.max_peers {
            tracing::debug!(address, "peer table full, not adding");
            return false;
        }
        self.peers.insert(
            address.to_string(),
            PeerEntry {
                address: address.to_string(),
                last_seen: now,
                version: None,
                height: 0,
                consecutive_failures: 0,
            },
        );
        tracing::info!(address, peers = self.peers.len(), "added peer");
        true
    }

    pub fn remove_peer(&mut self, address: &str) {
        if self.peers.remove(address).is_some() {
            tracing::info!(address, "removed peer");
        }
    }

    /// Refresh `last_seen` on any contact.
    pub fn touch(&mut self, address: &str) {
        if let Some(peer) = self.peers.get_mut(address) {
            peer.last_seen = Utc::now();
            peer.consecutive_failures = 0;
        }
    }

    /// Record advertised version and height from a successful exchange.
    pub fn update_status(&mut self, address: &str, version: Option<String>, height: u64) {
        if let Some(peer) = self.peers.get_mut(address) {
            peer.last_seen = Utc::now();
            peer.consecutive_failures = 0;
            if version.is_some() {
                peer.version = version;
            }
            peer.height = height;
        }
    }

    /// Count a failed exchange; the peer is evicted at [`MAX_FAIL`].
    /// Returns `true` when this failure evicted it.
    pub fn record_failure(&mut self, address: &str) -> bool {
        let Some(peer) = self.peers.get_mut(address) else {
            return false;
        };
        peer.consecutive_failures += 1;
        if peer.consecutive_failures >= MAX_FAIL {
            tracing::warn!(address, "peer evicted after repeated failures");
            self.peers.remove(address);
            return true;
        }
        false
    }

    /// Evict peers unseen for longer than `ttl`. Returns the evicted count.
    pub fn sweep(&mut self, ttl: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::seconds(ttl.as_secs() as i64);
        let before = self.peers.len();
        self.peers.retain(|address, peer| {
            let keep = peer.last_seen >= cutoff;
            if !keep {
                tracing::info!(address, "removed inactive peer");
            }
            keep
        });
        before - self.peers.len()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.peers.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn peers(&self) -> Vec<PeerEntry> {
        self.peers.values().cloned().collect()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.peers.keys().cloned().collect()
    }

    /// Up to `count` random peer addresses.
    pub fn sample(&self, count: usize) -> Vec<String> {
        let mut addresses = self.addresses();
        addresses.shuffle(&mut rand::thread_rng());
        addresses.truncate(count);
        addresses
    }
}

/// Periodic liveness sweep, run as a node task.
pub async fn peer_maintenance_loop(
    peers: Arc<RwLock<PeerManager>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    ticker.tick().await;
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!("peer maintenance shutting down");
                return;
            }
            _ = ticker.tick() => {}
        }
        let evicted = peers.write().await.sweep(PEER_TTL);
        if evicted > 0 {
            tracing::debug!(evicted, "peer sweep complete");
        }
    }
}
