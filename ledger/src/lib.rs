//! The certification ledger data model: attestation transactions, blocks,
//! Merkle trees, and the binary wire codec used for persistence and
//! inter-node transfer.

pub mod block;
pub mod codec;
pub mod error;
pub mod merkle;
pub mod transaction;

pub use block::{Block, BlockHeader, BLOCK_MAGIC, BLOCK_VERSION};
pub use error::LedgerError;
pub use merkle::merkle_root;
pub use transaction::{Transaction, GENESIS_INQUIRY, GENESIS_PUBLIC_KEY};
