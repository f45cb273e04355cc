//! Persisted blocks, keyed by height and by hash.

use certchain_ledger::Block;

use crate::StoreError;

pub trait BlockStore {
    /// Persist a block under both its height and hash keys and advance
    /// the chain tip, atomically.
    fn save_block(&self, block: &Block) -> Result<(), StoreError>;

    fn block_by_height(&self, height: u64) -> Result<Block, StoreError>;

    fn block_by_hash(&self, hash: &str) -> Result<Block, StoreError>;

    /// Height of the latest persisted block; `None` on a fresh database.
    fn tip_height(&self) -> Result<Option<u64>, StoreError>;

    fn block_count(&self) -> Result<u64, StoreError>;
}
