//! Cascade discovery: a bounded BFS over the peer graph.
//!
//! Each hop fetches `/peers` from the previous frontier in small
//! concurrent batches, validates every new address through its health
//! endpoint (status and network flag), and feeds survivors into both the
//! peer table and the next frontier. A single-flight guard plus a
//! cooldown keep concurrent triggers from stampeding the network.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::RwLock;

use crate::client::NodeClient;
use crate::peer_manager::PeerManager;

/// BFS depth limit.
pub const MAX_HOPS: usize = 3;
/// Concurrent `/peers` fetches per batch.
const BATCH_SIZE: usize = 5;
/// Peer-exchange timeout per frontier node.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);
/// Health-validation timeout per candidate.
const VALIDATE_TIMEOUT: Duration = Duration::from_secs(5);
/// Minimum spacing between full cascade runs.
pub const CASCADE_COOLDOWN: Duration = Duration::from_secs(300);

pub struct CascadeDiscovery {
    exchange: NodeClient,
    probe: NodeClient,
    peers: Arc<RwLock<PeerManager>>,
    flag: String,
    max_hops: usize,
    cooldown: Duration,
    in_flight: AtomicBool,
    last_run: Mutex<Option<Instant>>,
}

impl CascadeDiscovery {
    pub fn new(peers: Arc<RwLock<PeerManager>>, flag: impl Into<String>) -> Self {
        Self {
            exchange: NodeClient::new(EXCHANGE_TIMEOUT),
            probe: NodeClient::new(VALIDATE_TIMEOUT),
            peers,
            flag: flag.into(),
            max_hops: MAX_HOPS,
            cooldown: CASCADE_COOLDOWN,
            in_flight: AtomicBool::new(false),
            last_run: Mutex::new(None),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_limits(mut self, max_hops: usize, cooldown: Duration) -> Self {
        self.max_hops = max_hops;
        self.cooldown = cooldown;
        self
    }

    /// Walk the peer graph. Returns the number of newly added peers;
    /// zero when coalesced into an in-flight run or within the cooldown.
    pub async fn run(&self) -> usize {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("cascade discovery already in flight");
            return 0;
        }

        let added = self.walk().await;
        self.in_flight.store(false, Ordering::Release);
        added
    }

    async fn walk(&self) -> usize {
        {
            let mut last = self.last_run.lock().expect("cascade cooldown lock");
            if let Some(at) = *last {
                if at.elapsed() < self.cooldown {
                    tracing::debug!("cascade discovery still cooling down");
                    return 0;
                }
            }
            *last = Some(Instant::now());
        }

        let mut frontier = self.peers.read().await.addresses();
        let mut known: HashSet<String> = frontier.iter().cloned().collect();
        let mut added = 0usize;

        for hop in 1..=self.max_hops {
            if frontier.is_empty() {
                break;
            }
            tracing::debug!(hop, frontier = frontier.len(), "cascade hop starting");

            // Gather candidate addresses from this hop's frontier.
            let mut candidates: Vec<String> = Vec::new();
            for batch in frontier.chunks(BATCH_SIZE) {
                let fetches = batch.iter().map(|addr| self.exchange.peers(addr));
                for (addr, outcome) in batch.iter().zip(join_all(fetches).await) {
                    match outcome {
                        Ok(list) => {
                            for entry in list {
                                candidates.push(entry.address);
                            }
                        }
                        Err(e) => {
                            tracing::debug!(peer = %addr, error = %e, "peer exchange failed");
                        }
                    }
                }
            }

            candidates.retain(|address| !known.contains(address));
            candidates.sort();
            candidates.dedup();

            // Validate survivors concurrently through their health endpoint.
            let checks = join_all(candidates.iter().map(|addr| self.validate(addr))).await;
            let mut next = Vec::new();
            for (address, healthy) in candidates.into_iter().zip(checks) {
                if !healthy {
                    continue;
                }
                known.insert(address.clone());
                if self.peers.write().await.add_peer(&address) {
                    added += 1;
                }
                next.push(address);
            }

            if next.is_empty() {
                tracing::debug!(hop, "cascade hop added no peers, stopping early");
                break;
            }
            frontier = next;
        }

        tracing::info!(added, known = known.len(), "cascade discovery completed");
        added
    }

    async fn validate(&self, address: &str) -> bool {
        match self.probe.health(address).await {
            Ok(health) => {
                matches!(health.status.as_str(), "ok" | "healthy")
                    && health.network_flag.as_deref() == Some(self.flag.as_str())
            }
            Err(e) => {
                tracing::debug!(peer = %address, error = %e, "candidate failed health validation");
                false
            }
        }
    }
}
