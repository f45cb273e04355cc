//! Proof-of-work engine.
//!
//! `bits` counts the leading zero bits a valid header hash must carry, so
//! the target is `1 << (256 - bits)`. The engine only ever sees block
//! headers; transaction bodies are none of its business.

pub mod difficulty;
pub mod generator;
pub mod validator;

pub use difficulty::retarget;
pub use generator::mine;
pub use validator::{target_from_bits, validate_hash, validate_header};

/// Lowest allowed difficulty.
pub const MIN_BITS: u32 = 1;
/// Highest allowed difficulty.
pub const MAX_BITS: u32 = 32;
/// How many nonces to try between cancellation checks.
pub const CANCEL_CHECK_INTERVAL: u32 = 100_000;
