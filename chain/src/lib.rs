//! The chain manager: mempool, block acceptance, mining loop, difficulty
//! state and the certification query engine.
//!
//! Single-writer discipline: every chain mutation goes through the write
//! half of one lock; queries share the read half. The mempool has its
//! own lock and is never held across a store or network call.

pub mod error;
pub mod manager;
pub mod mempool;
pub mod mining;

pub use error::ChainError;
pub use manager::{ChainConfig, ChainManager};
pub use mempool::Mempool;
pub use mining::{mine_once, mining_loop, MINING_INTERVAL};
