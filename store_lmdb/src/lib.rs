//! LMDB (heed) backend for the certchain store traits.
//!
//! One environment, six named databases. Multi-key writes (block
//! height+hash+tip, the three cert index rows) share a single write
//! transaction, so a crash can never leave a partial record behind.

mod block;
mod cert;
pub mod environment;
pub mod error;
mod meta;

pub use environment::LmdbStore;
pub use error::LmdbError;
