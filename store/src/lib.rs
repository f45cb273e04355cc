//! Abstract storage traits for the certchain node.
//!
//! Every backend implements these traits; the rest of the codebase
//! depends only on them. Not-found is reported distinctly from backend
//! failure so callers can fall back to a chain scan without masking
//! real I/O errors.

pub mod block;
pub mod cert;
pub mod error;
pub mod meta;

pub use block::BlockStore;
pub use cert::CertStore;
pub use error::StoreError;
pub use meta::MetaStore;

/// Everything the chain manager needs from a backend.
pub trait ChainStore: BlockStore + CertStore + Send + Sync {}

impl<T: BlockStore + CertStore + Send + Sync> ChainStore for T {}
