//! Lifecycle status of an attestation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a transaction sits in its lifecycle: pooled, included in an
/// accepted block, or past its certification expiry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    #[default]
    Pending,
    Mined,
    Expired,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Mined => "mined",
            Self::Expired => "expired",
        }
    }

    /// Parse the wire representation. Unknown strings fall back to `Pending`
    /// so a corrupt status byte never poisons an otherwise valid record.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "mined" => Self::Mined,
            "expired" => Self::Expired,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_roundtrip() {
        for status in [TxStatus::Pending, TxStatus::Mined, TxStatus::Expired] {
            assert_eq!(TxStatus::from_wire(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_status_is_pending() {
        assert_eq!(TxStatus::from_wire("garbled"), TxStatus::Pending);
    }

    #[test]
    fn serde_lowercase() {
        assert_eq!(serde_json::to_string(&TxStatus::Mined).unwrap(), "\"mined\"");
    }
}
