//! Chain synchronizer: pull missing blocks from peers that are ahead.
//!
//! Longest-valid-chain in its simplest form: blocks are fetched in
//! height order and fed through normal acceptance. A peer serving a
//! block that fails validation is marked suspect and skipped; accepted
//! blocks are never reorganized.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};

use certchain_chain::{ChainError, ChainManager};

use crate::client::NodeClient;
use crate::error::NetworkError;
use crate::peer_manager::PeerManager;

/// Interval between sync rounds.
pub const SYNC_INTERVAL: Duration = Duration::from_secs(60);
/// Peers sampled per round.
const SAMPLE_SIZE: usize = 3;
/// Timeout for block transfers.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Synchronizer {
    client: NodeClient,
    chain: Arc<ChainManager>,
    peers: Arc<RwLock<PeerManager>>,
}

impl Synchronizer {
    pub fn new(chain: Arc<ChainManager>, peers: Arc<RwLock<PeerManager>>) -> Self {
        Self {
            client: NodeClient::new(TRANSFER_TIMEOUT),
            chain,
            peers,
        }
    }

    /// One sync round over a random sample of peers.
    pub async fn sync_once(&self) {
        let sample = self.peers.read().await.sample(SAMPLE_SIZE);
        for address in sample {
            match self.sync_from(&address).await {
                Ok(0) => {}
                Ok(pulled) => {
                    tracing::info!(peer = %address, pulled, "synced blocks from peer");
                }
                Err(e) => {
                    tracing::warn!(peer = %address, error = %e, "sync failed, marking peer suspect");
                    self.peers.write().await.record_failure(&address);
                }
            }
        }
    }

    /// Pull every block the peer has beyond our tip, in order.
    async fn sync_from(&self, address: &str) -> Result<u64, NetworkError> {
        let remote_tip = self.client.latest_block(address).await?;
        let remote_height = remote_tip.header.height;
        let local_height = self.chain.height().await;

        {
            let mut peers = self.peers.write().await;
            peers.update_status(address, None, remote_height);
        }

        if remote_height <= local_height {
            return Ok(0);
        }
        tracing::info!(
            peer = %address,
            local = local_height,
            remote = remote_height,
            "peer is ahead, pulling missing blocks"
        );

        let mut pulled = 0u64;
        for height in (local_height + 1)..=remote_height {
            let block = self.client.block_at(address, height).await?;
            match self.chain.accept_block(block).await {
                Ok(()) => pulled += 1,
                // Another task got there first; not the peer's fault.
                Err(ChainError::DuplicateBlock) => {}
                Err(e) => {
                    return Err(NetworkError::InvalidPeerData(format!(
                        "block {height} rejected: {e}"
                    )));
                }
            }
        }
        Ok(pulled)
    }

    /// Periodic sync task: one round immediately on start, then every
    /// [`SYNC_INTERVAL`].
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(SYNC_INTERVAL);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("synchronizer shutting down");
                    return;
                }
                _ = ticker.tick() => {}
            }
            self.sync_once().await;
        }
    }
}
