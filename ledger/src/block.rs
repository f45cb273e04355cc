//! Blocks: linked headers over Merkle-rooted bodies, plus the binary
//! wire form used for persistence and sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use certchain_crypto::{hex_to_32, sha256};

use crate::codec::Reader;
use crate::error::LedgerError;
use crate::merkle::merkle_root;
use crate::transaction::Transaction;

/// Wire magic prefix for serialized blocks.
pub const BLOCK_MAGIC: u32 = 0xD9B4_BEF9;
/// Current block format version.
pub const BLOCK_VERSION: u32 = 1;
/// Previous-hash sentinel carried by the genesis block.
pub const GENESIS_PREV_HASH: &str = "0";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_block_hash: String,
    pub merkle_root: String,
    pub timestamp: DateTime<Utc>,
    pub bits: u32,
    pub nonce: u32,
    pub height: u64,
}

impl BlockHeader {
    /// The hash preimage: header fields in order with fixed widths
    /// (hex digests as zero-padded raw 32-byte values).
    pub fn hash_preimage(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + 32 + 32 + 8 + 4 + 4 + 8);
        buf.extend_from_slice(&self.version.to_be_bytes());
        buf.extend_from_slice(&hex_to_32(&self.prev_block_hash));
        buf.extend_from_slice(&hex_to_32(&self.merkle_root));
        buf.extend_from_slice(&self.timestamp.timestamp().to_be_bytes());
        buf.extend_from_slice(&self.bits.to_be_bytes());
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf
    }

    pub fn hash_bytes(&self) -> [u8; 32] {
        sha256(&self.hash_preimage())
    }

    /// Block hash as lowercase hex.
    pub fn hash(&self) -> String {
        hex::encode(self.hash_bytes())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Build an unmined candidate block: timestamp now (second
    /// resolution), Merkle root computed, bits and nonce left blank.
    pub fn new(transactions: Vec<Transaction>, prev_block_hash: String, height: u64) -> Self {
        let now = Utc::now();
        let timestamp = DateTime::<Utc>::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        Self::with_timestamp(transactions, prev_block_hash, height, timestamp)
    }

    pub fn with_timestamp(
        transactions: Vec<Transaction>,
        prev_block_hash: String,
        height: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let ids: Vec<String> = transactions.iter().map(|tx| tx.id.clone()).collect();
        Self {
            header: BlockHeader {
                version: BLOCK_VERSION,
                prev_block_hash,
                merkle_root: merkle_root(&ids),
                timestamp,
                bits: 0,
                nonce: 0,
                height,
            },
            transactions,
        }
    }

    /// The genesis block: a single sentinel transaction, previous hash
    /// `"0"`, height 0, fixed epoch timestamp. Deterministic across
    /// nodes so freshly bootstrapped peers agree on block 1's parent.
    pub fn genesis() -> Self {
        Self::with_timestamp(
            vec![Transaction::genesis_sentinel()],
            GENESIS_PREV_HASH.to_string(),
            0,
            DateTime::UNIX_EPOCH,
        )
    }

    pub fn hash(&self) -> String {
        self.header.hash()
    }

    /// Structural validation: non-empty body, Merkle root integrity,
    /// per-transaction field checks and id recomputation.
    pub fn verify_structure(&self) -> Result<(), LedgerError> {
        if self.transactions.is_empty() {
            return Err(LedgerError::EmptyBlock);
        }

        let ids: Vec<String> = self.transactions.iter().map(|tx| tx.id.clone()).collect();
        if merkle_root(&ids) != self.header.merkle_root {
            return Err(LedgerError::MerkleMismatch);
        }

        for tx in &self.transactions {
            tx.validate_static()?;
            if !tx.is_genesis() && tx.id != tx.compute_id() {
                return Err(LedgerError::IdMismatch(tx.id.clone()));
            }
        }
        Ok(())
    }

    /// Binary wire form: magic, big-endian payload length, header fields
    /// (32-byte zero-padded hashes), a u32 transaction count, then the
    /// concatenated transactions.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&self.header.version.to_be_bytes());
        payload.extend_from_slice(&hex_to_32(&self.header.prev_block_hash));
        payload.extend_from_slice(&hex_to_32(&self.header.merkle_root));
        payload.extend_from_slice(&self.header.timestamp.timestamp().to_be_bytes());
        payload.extend_from_slice(&self.header.bits.to_be_bytes());
        payload.extend_from_slice(&self.header.nonce.to_be_bytes());
        payload.extend_from_slice(&self.header.height.to_be_bytes());
        payload.extend_from_slice(&(self.transactions.len() as u32).to_be_bytes());
        for tx in &self.transactions {
            payload.extend_from_slice(&tx.serialize());
        }

        let mut buf = Vec::with_capacity(8 + payload.len());
        buf.extend_from_slice(&BLOCK_MAGIC.to_be_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(&payload);
        buf
    }

    pub fn from_wire_bytes(data: &[u8]) -> Result<Self, LedgerError> {
        let mut reader = Reader::new(data);
        let magic = reader.read_u32()?;
        if magic != BLOCK_MAGIC {
            return Err(LedgerError::Codec(format!("bad magic: {magic:#010x}")));
        }
        let payload_len = reader.read_u32()? as usize;
        if reader.remaining() != payload_len {
            return Err(LedgerError::Codec(format!(
                "payload length {payload_len} does not match {} remaining bytes",
                reader.remaining()
            )));
        }

        let version = reader.read_u32()?;
        let prev_bytes = reader.read_bytes32()?;
        let merkle_bytes = reader.read_bytes32()?;
        let secs = reader.read_i64()?;
        let timestamp = DateTime::<Utc>::from_timestamp(secs, 0)
            .ok_or_else(|| LedgerError::Codec(format!("timestamp {secs} out of range")))?;
        let bits = reader.read_u32()?;
        let nonce = reader.read_u32()?;
        let height = reader.read_u64()?;
        let tx_count = reader.read_u32()? as usize;

        let mut transactions = Vec::with_capacity(tx_count.min(16_384));
        for _ in 0..tx_count {
            transactions.push(Transaction::read_from(&mut reader)?);
        }
        if reader.remaining() != 0 {
            return Err(LedgerError::Codec(format!(
                "{} trailing bytes after block",
                reader.remaining()
            )));
        }

        // The wire carries a padded digest; the authoritative Merkle root
        // is recomputed from the body and checked against the wire copy.
        let ids: Vec<String> = transactions.iter().map(|tx| tx.id.clone()).collect();
        let merkle = merkle_root(&ids);
        if hex_to_32(&merkle) != merkle_bytes {
            return Err(LedgerError::MerkleMismatch);
        }

        // An all-zero previous hash at height 0 is the genesis sentinel "0".
        let prev_block_hash = if height == 0 && prev_bytes == [0u8; 32] {
            GENESIS_PREV_HASH.to_string()
        } else {
            hex::encode(prev_bytes)
        };

        Ok(Self {
            header: BlockHeader {
                version,
                prev_block_hash,
                merkle_root: merkle,
                timestamp,
                bits,
                nonce,
                height,
            },
            transactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tx(inquiry: &str) -> Transaction {
        Transaction::new("pk-pem", "Alice", "Doe", inquiry, Utc::now(), "c2ln")
    }

    #[test]
    fn new_block_computes_merkle_root() {
        let t = tx("inq-1");
        let block = Block::new(vec![t.clone()], "0".repeat(64), 1);
        assert_eq!(block.header.merkle_root, t.id);
        assert_eq!(block.header.bits, 0);
        assert_eq!(block.header.nonce, 0);
    }

    #[test]
    fn hash_covers_nonce() {
        let mut block = Block::new(vec![tx("inq-1")], "0".repeat(64), 1);
        let before = block.hash();
        block.header.nonce = 7;
        assert_ne!(block.hash(), before);
    }

    #[test]
    fn hash_covers_height() {
        let a = Block::with_timestamp(vec![tx("i")], "0".repeat(64), 1, DateTime::UNIX_EPOCH);
        let mut b = a.clone();
        b.header.height = 2;
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn genesis_is_deterministic() {
        assert_eq!(Block::genesis().hash(), Block::genesis().hash());
        assert_eq!(Block::genesis().header.prev_block_hash, "0");
        assert_eq!(Block::genesis().header.height, 0);
    }

    #[test]
    fn genesis_validates_structurally() {
        assert_eq!(Block::genesis().verify_structure(), Ok(()));
    }

    #[test]
    fn empty_block_is_rejected() {
        let block = Block::new(vec![], "0".repeat(64), 1);
        assert_eq!(block.verify_structure(), Err(LedgerError::EmptyBlock));
    }

    #[test]
    fn merkle_tamper_is_detected() {
        let mut block = Block::new(vec![tx("inq-1"), tx("inq-2")], "0".repeat(64), 1);
        block.header.merkle_root = "ff".repeat(32);
        assert_eq!(block.verify_structure(), Err(LedgerError::MerkleMismatch));
    }

    #[test]
    fn wire_roundtrip() {
        let mut block = Block::new(vec![tx("inq-1"), tx("inq-2"), tx("inq-3")], "ab".repeat(32), 9);
        block.header.bits = 4;
        block.header.nonce = 123_456;
        let back = Block::from_wire_bytes(&block.to_wire_bytes()).unwrap();
        assert_eq!(back, block);
        assert_eq!(back.hash(), block.hash());
    }

    #[test]
    fn genesis_wire_roundtrip_preserves_sentinel_prev() {
        let genesis = Block::genesis();
        let back = Block::from_wire_bytes(&genesis.to_wire_bytes()).unwrap();
        assert_eq!(back, genesis);
        assert_eq!(back.header.prev_block_hash, "0");
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = Block::genesis().to_wire_bytes();
        bytes[0] ^= 0xFF;
        assert!(Block::from_wire_bytes(&bytes).is_err());
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let bytes = Block::genesis().to_wire_bytes();
        assert!(Block::from_wire_bytes(&bytes[..bytes.len() - 3]).is_err());
    }
}
