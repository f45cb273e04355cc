//! The mining loop: periodically pack pooled transactions into a
//! candidate block and search for a nonce.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use certchain_ledger::Block;

use crate::manager::ChainManager;

/// How often the loop checks the mempool for work.
pub const MINING_INTERVAL: Duration = Duration::from_secs(30);

/// Attempt to mine one block from the current mempool. Returns `true`
/// when a block was mined and accepted.
///
/// The nonce search runs on a blocking thread and honors `cancelled`
/// between nonce windows, so shutdown never waits on a full sweep.
pub async fn mine_once(
    chain: &ChainManager,
    cancelled: Arc<AtomicBool>,
) -> Result<bool, crate::ChainError> {
    let (txs, prev_hash, tip_height, bits) = chain.mining_snapshot().await;
    if txs.is_empty() {
        return Ok(false);
    }

    let mut candidate = Block::new(txs, prev_hash, tip_height + 1);
    candidate.header.bits = bits;
    tracing::info!(
        height = candidate.header.height,
        txs = candidate.transactions.len(),
        bits,
        "mining candidate block"
    );

    let header = candidate.header.clone();
    let flag = Arc::clone(&cancelled);
    let mined = tokio::task::spawn_blocking(move || certchain_work::mine(&header, &flag))
        .await
        .unwrap_or(None);

    match mined {
        Some(nonce) => {
            candidate.header.nonce = nonce;
            chain.accept_block(candidate).await?;
            Ok(true)
        }
        None => {
            // Nonce space exhausted or cancelled; the next tick rebuilds
            // the candidate with a fresh timestamp.
            tracing::debug!(height = tip_height + 1, "nonce search ended without a block");
            Ok(false)
        }
    }
}

/// Run the periodic mining loop until shutdown.
pub async fn mining_loop(
    chain: Arc<ChainManager>,
    mut shutdown: broadcast::Receiver<()>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // Consume the immediate first tick so mining starts one interval in.
    ticker.tick().await;

    let cancelled = Arc::new(AtomicBool::new(false));
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                cancelled.store(true, Ordering::Relaxed);
                tracing::info!("mining loop shutting down");
                return;
            }
            _ = ticker.tick() => {}
        }

        // Set the flag from a watcher while the blocking search runs.
        let mut watcher_rx = shutdown.resubscribe();
        let watcher_flag = Arc::clone(&cancelled);
        let watcher = tokio::spawn(async move {
            let _ = watcher_rx.recv().await;
            watcher_flag.store(true, Ordering::Relaxed);
        });

        match mine_once(&chain, Arc::clone(&cancelled)).await {
            Ok(true) => {}
            Ok(false) => {}
            Err(e) => tracing::error!(error = %e, "failed to add mined block"),
        }
        watcher.abort();

        if cancelled.load(Ordering::Relaxed) {
            tracing::info!("mining loop shutting down");
            return;
        }
    }
}
