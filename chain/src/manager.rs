//! The chain manager proper.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use certchain_ledger::{Block, Transaction};
use certchain_store::ChainStore;
use certchain_types::{CertRecord, TxStatus};

use crate::error::ChainError;
use crate::mempool::Mempool;

/// Chain-level tunables, lifted from the node configuration.
#[derive(Clone, Debug)]
pub struct ChainConfig {
    /// Starting difficulty in leading-zero bits.
    pub initial_difficulty: u32,
    /// Blocks between difficulty adjustments.
    pub difficulty_adjust: u64,
    /// Mining pool cap per candidate block.
    pub max_trans_per_block: usize,
    /// Target seconds per block, used by the retarget arithmetic.
    pub target_block_time_secs: u64,
    /// When false, owner signatures are not verified on submission.
    pub require_signature: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            initial_difficulty: 16,
            difficulty_adjust: 2016,
            max_trans_per_block: 1000,
            target_block_time_secs: 600,
            require_signature: true,
        }
    }
}

struct ChainState {
    blocks: Vec<Block>,
    bits: u32,
}

/// Owns the chain, the mempool and the difficulty state. Everything else
/// reads through query methods and writes through commands.
pub struct ChainManager {
    state: RwLock<ChainState>,
    pool: Mutex<Mempool>,
    store: Arc<dyn ChainStore>,
    config: ChainConfig,
}

impl ChainManager {
    /// Load the persisted chain, or create the genesis block on a fresh
    /// database.
    pub fn new(store: Arc<dyn ChainStore>, config: ChainConfig) -> Result<Self, ChainError> {
        let blocks = match store.tip_height()? {
            Some(tip) => {
                let mut blocks = Vec::with_capacity(tip as usize + 1);
                for height in 0..=tip {
                    blocks.push(store.block_by_height(height)?);
                }
                for pair in blocks.windows(2) {
                    if pair[1].header.prev_block_hash != pair[0].hash() {
                        return Err(ChainError::InvalidBlock(format!(
                            "persisted chain is broken at height {}",
                            pair[1].header.height
                        )));
                    }
                }
                tracing::info!(blocks = blocks.len(), "loaded chain from store");
                blocks
            }
            None => {
                tracing::info!("empty database, creating genesis block");
                let genesis = Block::genesis();
                store.save_block(&genesis)?;
                for record in project_block(&genesis) {
                    store.save_cert(&record)?;
                }
                vec![genesis]
            }
        };

        let bits = replay_difficulty(config.initial_difficulty, &blocks, &config);

        Ok(Self {
            state: RwLock::new(ChainState { blocks, bits }),
            pool: Mutex::new(Mempool::new()),
            store,
            config,
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    // ── Commands ─────────────────────────────────────────────────────────

    /// Validate a submission and enqueue it into the mempool.
    pub async fn add_transaction(&self, tx: Transaction) -> Result<String, ChainError> {
        tx.validate_static()?;
        tx.validate_freshness(Utc::now())?;
        if self.config.require_signature {
            tx.verify()?;
        }

        // Uniqueness against the accepted chain: index first, then a
        // newest-to-oldest chain scan when the index has no row (repairs
        // a lost index after a crash).
        match self.store.cert_by_inquiry(&tx.inquiry_id) {
            Ok(_) => return Err(ChainError::DuplicateInquiry),
            Err(e) if e.is_not_found() => {
                let state = self.state.read().await;
                let on_chain = state.blocks.iter().rev().any(|block| {
                    block
                        .transactions
                        .iter()
                        .any(|chained| chained.inquiry_id == tx.inquiry_id)
                });
                if on_chain {
                    return Err(ChainError::DuplicateInquiry);
                }
            }
            Err(e) => return Err(e.into()),
        }

        let mut pool = self.pool.lock().await;
        if pool.contains_inquiry(&tx.inquiry_id) {
            return Err(ChainError::DuplicateInquiry);
        }
        if pool.contains_id(&tx.id) {
            return Err(ChainError::DuplicateInPool);
        }

        let id = tx.id.clone();
        pool.push(tx);
        tracing::info!(tx = %id, pooled = pool.len(), "transaction added to mempool");
        Ok(id)
    }

    /// Validate and append a block at the tip, persist it, project its
    /// transactions into the indexes and drop them from the mempool.
    pub async fn accept_block(&self, mut block: Block) -> Result<(), ChainError> {
        block.verify_structure()?;

        let mut state = self.state.write().await;
        let tip = state.blocks.last().expect("chain always holds genesis");
        let tip_height = tip.header.height;

        if block.header.height <= tip_height {
            let existing = &state.blocks[block.header.height as usize];
            if existing.hash() == block.hash() {
                return Err(ChainError::DuplicateBlock);
            }
            return Err(ChainError::InvalidBlock(format!(
                "height {} already occupied by a different block",
                block.header.height
            )));
        }
        if block.header.height != tip_height + 1 {
            return Err(ChainError::InvalidBlock(format!(
                "expected height {}, got {}",
                tip_height + 1,
                block.header.height
            )));
        }
        if block.header.prev_block_hash != tip.hash() {
            return Err(ChainError::InvalidBlock(
                "previous block hash does not match the tip".into(),
            ));
        }
        if block.header.height > 0 && !certchain_work::validate_header(&block.header) {
            return Err(ChainError::WorkInvalid);
        }

        for tx in &mut block.transactions {
            tx.status = TxStatus::Mined;
        }

        state.blocks.push(block);
        let accepted = state.blocks.last().expect("just pushed");
        if let Err(e) = self.store.save_block(accepted) {
            tracing::error!(error = %e, "failed to persist block, rolling back append");
            state.blocks.pop();
            // Pooled transactions were never removed, so they stay pooled.
            return Err(ChainError::Store(e));
        }

        let height = accepted.header.height;
        let hash = accepted.hash();
        let mut mined_ids = HashSet::new();
        for record in project_block(accepted) {
            if let Err(e) = self.store.save_cert(&record) {
                tracing::error!(error = %e, inquiry = %record.inquiry_id, "failed to save certification index");
            }
        }
        for tx in &accepted.transactions {
            mined_ids.insert(tx.id.clone());
        }

        {
            let mut pool = self.pool.lock().await;
            pool.remove_ids(&mined_ids);
        }

        let new_bits = apply_retarget(&state.blocks, state.bits, &self.config);
        state.bits = new_bits;

        tracing::info!(height, hash = %hash, txs = mined_ids.len(), "block accepted");
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub async fn cert_by_public_key(&self, public_key: &str) -> Result<CertRecord, ChainError> {
        match self.store.cert_by_public_key(public_key) {
            Ok(record) => Ok(record),
            Err(e) if e.is_not_found() => {
                self.scan_chain(|tx| tx.public_key == public_key).await
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn cert_by_identity(
        &self,
        name: &str,
        surname: &str,
    ) -> Result<CertRecord, ChainError> {
        match self.store.cert_by_identity(name, surname) {
            Ok(record) => Ok(record),
            Err(e) if e.is_not_found() => {
                self.scan_chain(|tx| tx.name == name && tx.surname == surname)
                    .await
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn cert_by_inquiry(&self, inquiry_id: &str) -> Result<CertRecord, ChainError> {
        match self.store.cert_by_inquiry(inquiry_id) {
            Ok(record) => Ok(record),
            Err(e) if e.is_not_found() => self.scan_chain(|tx| tx.inquiry_id == inquiry_id).await,
            Err(e) => Err(e.into()),
        }
    }

    /// Newest-to-oldest scan used when the store lacks an index row; a
    /// hit is written back to repair the index.
    async fn scan_chain(
        &self,
        matches: impl Fn(&Transaction) -> bool,
    ) -> Result<CertRecord, ChainError> {
        let state = self.state.read().await;
        for block in state.blocks.iter().rev() {
            for tx in &block.transactions {
                if matches(tx) {
                    let record = project_tx(tx, block);
                    if let Err(e) = self.store.save_cert(&record) {
                        tracing::warn!(error = %e, "failed to repair certification index");
                    }
                    return Ok(record);
                }
            }
        }
        Err(ChainError::NotFound)
    }

    pub async fn height(&self) -> u64 {
        let state = self.state.read().await;
        state.blocks.last().expect("chain always holds genesis").header.height
    }

    pub async fn tip(&self) -> Block {
        let state = self.state.read().await;
        state.blocks.last().expect("chain always holds genesis").clone()
    }

    pub async fn block_at(&self, height: u64) -> Option<Block> {
        let state = self.state.read().await;
        state.blocks.get(height as usize).cloned()
    }

    pub async fn all_blocks(&self) -> Vec<Block> {
        self.state.read().await.blocks.clone()
    }

    pub async fn current_bits(&self) -> u32 {
        self.state.read().await.bits
    }

    pub async fn mempool_len(&self) -> usize {
        self.pool.lock().await.len()
    }

    /// Snapshot for the mining loop: up to the per-block cap, in
    /// insertion order, plus the tip linkage and current difficulty.
    pub async fn mining_snapshot(&self) -> (Vec<Transaction>, String, u64, u32) {
        let txs = {
            let pool = self.pool.lock().await;
            pool.snapshot(self.config.max_trans_per_block)
        };
        let state = self.state.read().await;
        let tip = state.blocks.last().expect("chain always holds genesis");
        (txs, tip.hash(), tip.header.height, state.bits)
    }
}

/// Project every transaction of an accepted block into index records.
fn project_block(block: &Block) -> Vec<CertRecord> {
    block
        .transactions
        .iter()
        .map(|tx| project_tx(tx, block))
        .collect()
}

fn project_tx(tx: &Transaction, block: &Block) -> CertRecord {
    CertRecord {
        public_key: tx.public_key.clone(),
        name: tx.name.clone(),
        surname: tx.surname.clone(),
        inquiry_id: tx.inquiry_id.clone(),
        datetime: tx.datetime,
        block_hash: block.hash(),
        height: block.header.height,
    }
}

/// Recompute the retarget state for a block just appended (or replayed
/// at startup): at every window boundary, compare the window's wall time
/// with the configured target and step the difficulty.
fn apply_retarget(blocks: &[Block], bits: u32, config: &ChainConfig) -> u32 {
    let window = config.difficulty_adjust;
    let tip = blocks.last().expect("non-empty chain").header.height;
    if window == 0 || tip == 0 || tip % window != 0 || tip < window {
        return bits;
    }

    let first = &blocks[(tip - window + 1) as usize];
    let last = &blocks[tip as usize];
    let actual = last
        .header
        .timestamp
        .signed_duration_since(first.header.timestamp)
        .num_seconds()
        .max(0) as u64;
    let expected = config.target_block_time_secs.saturating_mul(window);

    let next = certchain_work::retarget(bits, actual, expected);
    if next != bits {
        tracing::info!(height = tip, old_bits = bits, new_bits = next, "difficulty retargeted");
    } else {
        tracing::debug!(height = tip, bits, "difficulty adjustment check: holding");
    }
    next
}

fn replay_difficulty(initial: u32, blocks: &[Block], config: &ChainConfig) -> u32 {
    let window = config.difficulty_adjust;
    if window == 0 {
        return initial;
    }
    let mut bits = initial;
    let tip = blocks.last().map(|b| b.header.height).unwrap_or(0);
    let mut boundary = window;
    while boundary <= tip {
        bits = apply_retarget(&blocks[..=boundary as usize], bits, config);
        boundary += window;
    }
    bits
}
