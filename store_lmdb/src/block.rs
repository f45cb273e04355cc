//! LMDB implementation of `BlockStore`.

use certchain_ledger::Block;
use certchain_store::{BlockStore, StoreError};

use crate::environment::LmdbStore;
use crate::LmdbError;

/// Meta key holding the latest persisted height (big-endian u64).
const TIP_KEY: &[u8] = b"chain:tip";

impl BlockStore for LmdbStore {
    fn save_block(&self, block: &Block) -> Result<(), StoreError> {
        let bytes = block.to_wire_bytes();
        let height = block.header.height;
        let hash = block.hash();

        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.blocks_by_height
            .put(&mut wtxn, &height.to_be_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        self.blocks_by_hash
            .put(&mut wtxn, hash.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        self.meta
            .put(&mut wtxn, TIP_KEY, &height.to_be_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn block_by_height(&self, height: u64) -> Result<Block, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bytes = self
            .blocks_by_height
            .get(&rtxn, &height.to_be_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("block at height {height}")))?;
        Block::from_wire_bytes(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn block_by_hash(&self, hash: &str) -> Result<Block, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bytes = self
            .blocks_by_hash
            .get(&rtxn, hash.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("block {hash}")))?;
        Block::from_wire_bytes(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn tip_height(&self) -> Result<Option<u64>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self.meta.get(&rtxn, TIP_KEY).map_err(LmdbError::from)?;
        match val {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                    StoreError::Serialization("chain:tip has unexpected byte length".into())
                })?;
                Ok(Some(u64::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.blocks_by_height.len(&rtxn).map_err(LmdbError::from)?)
    }
}
