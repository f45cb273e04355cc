//! Index projection of an accepted certification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The record stored under each secondary index key once a transaction
/// is accepted into a block. Rebuildable from the chain alone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertRecord {
    pub public_key: String,
    pub name: String,
    pub surname: String,
    pub inquiry_id: String,
    pub datetime: DateTime<Utc>,
    pub block_hash: String,
    pub height: u64,
}

impl CertRecord {
    /// Composite key used by the identity index.
    pub fn identity_key(name: &str, surname: &str) -> String {
        format!("{name}:{surname}")
    }
}
