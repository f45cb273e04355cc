//! The attestation transaction: a signed record binding a public key to
//! a verified human identity.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use certchain_crypto::{sha256_multi, CryptoError};
use certchain_types::TxStatus;

use crate::codec::{write_string, Reader};
use crate::error::LedgerError;

/// Placeholder public key carried by the genesis sentinel transaction.
pub const GENESIS_PUBLIC_KEY: &str = "0000000000000000000000000000000000000000";
/// Inquiry token of the genesis sentinel.
pub const GENESIS_INQUIRY: &str = "genesis";

/// Submissions older than this are rejected.
const MAX_TX_AGE_HOURS: i64 = 24;
/// Allowed clock skew into the future.
const MAX_TX_SKEW_MINS: i64 = 5;

/// A certification request: binds `public_key` to `(name, surname)` via a
/// third-party-verified `inquiry_id`, signed by the key owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub public_key: String,
    pub name: String,
    pub surname: String,
    pub inquiry_id: String,
    pub datetime: DateTime<Utc>,
    pub signature: String,
    pub status: TxStatus,
}

impl Transaction {
    /// Build a transaction, deriving `id` from the canonical fields.
    ///
    /// The datetime is truncated to second resolution so the id survives
    /// a trip through the wire codec.
    pub fn new(
        public_key: impl Into<String>,
        name: impl Into<String>,
        surname: impl Into<String>,
        inquiry_id: impl Into<String>,
        datetime: DateTime<Utc>,
        signature: impl Into<String>,
    ) -> Self {
        let datetime =
            DateTime::<Utc>::from_timestamp(datetime.timestamp(), 0).unwrap_or(datetime);
        let mut tx = Self {
            id: String::new(),
            public_key: public_key.into(),
            name: name.into(),
            surname: surname.into(),
            inquiry_id: inquiry_id.into(),
            datetime,
            signature: signature.into(),
            status: TxStatus::Pending,
        };
        tx.id = tx.compute_id();
        tx
    }

    /// The sentinel transaction embedded in the genesis block. Its id is
    /// the literal string `genesis`, not a hash.
    pub fn genesis_sentinel() -> Self {
        Self {
            id: GENESIS_INQUIRY.to_string(),
            public_key: GENESIS_PUBLIC_KEY.to_string(),
            name: "Genesis".to_string(),
            surname: "Block".to_string(),
            inquiry_id: GENESIS_INQUIRY.to_string(),
            datetime: DateTime::UNIX_EPOCH,
            signature: String::new(),
            status: TxStatus::Mined,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.public_key == GENESIS_PUBLIC_KEY && self.inquiry_id == GENESIS_INQUIRY
    }

    /// SHA-256 over the canonical concatenation
    /// `public_key ++ name ++ surname ++ inquiry_id ++ be_i64(unix_seconds)`.
    pub fn compute_id(&self) -> String {
        hex::encode(sha256_multi(&[
            self.public_key.as_bytes(),
            self.name.as_bytes(),
            self.surname.as_bytes(),
            self.inquiry_id.as_bytes(),
            &self.datetime.timestamp().to_be_bytes(),
        ]))
    }

    /// The message the owner signs:
    /// `public_key|name|surname|inquiry_id|unix_seconds`.
    pub fn signable_message(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.public_key,
            self.name,
            self.surname,
            self.inquiry_id,
            self.datetime.timestamp()
        )
    }

    /// Required-field and format checks. The genesis sentinel is the one
    /// transaction allowed an empty signature.
    pub fn validate_static(&self) -> Result<(), LedgerError> {
        if self.public_key.is_empty() {
            return Err(LedgerError::MissingField("public_key"));
        }
        if self.name.is_empty() {
            return Err(LedgerError::MissingField("name"));
        }
        if self.surname.is_empty() {
            return Err(LedgerError::MissingField("surname"));
        }
        if self.inquiry_id.is_empty() {
            return Err(LedgerError::MissingField("inquiry_id"));
        }
        if self.signature.is_empty() {
            if !self.is_genesis() {
                return Err(LedgerError::MissingField("signature"));
            }
        } else if BASE64.decode(&self.signature).is_err() {
            return Err(LedgerError::MalformedPayload(
                "signature is not valid base64".into(),
            ));
        }
        Ok(())
    }

    /// Submission-time freshness window: [-24h, +5min] around the
    /// receiving node's clock. A datetime exactly on the 24 h boundary
    /// is still accepted.
    pub fn validate_freshness(&self, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let age = now.signed_duration_since(self.datetime);
        if age > Duration::hours(MAX_TX_AGE_HOURS) {
            return Err(LedgerError::StaleTime);
        }
        if self.datetime > now + Duration::minutes(MAX_TX_SKEW_MINS) {
            return Err(LedgerError::FutureTime);
        }
        Ok(())
    }

    /// Verify the owner signature over the signable message. The genesis
    /// sentinel is exempt, and only it.
    pub fn verify(&self) -> Result<(), LedgerError> {
        if self.is_genesis() {
            return Ok(());
        }
        certchain_crypto::verify_signature(
            &self.public_key,
            self.signable_message().as_bytes(),
            &self.signature,
        )
        .map_err(|e| match e {
            CryptoError::InvalidSignature => LedgerError::InvalidSignature,
            other => LedgerError::MalformedPayload(other.to_string()),
        })
    }

    /// Whether the certification itself has outlived `expiry_secs`.
    pub fn is_expired(&self, expiry_secs: u64, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.datetime).num_seconds() > expiry_secs as i64
    }

    /// Wire form: length-prefixed strings in field order, with the
    /// timestamp as a big-endian i64 between inquiry and signature.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_string(&mut buf, &self.id);
        write_string(&mut buf, &self.public_key);
        write_string(&mut buf, &self.name);
        write_string(&mut buf, &self.surname);
        write_string(&mut buf, &self.inquiry_id);
        buf.extend_from_slice(&self.datetime.timestamp().to_be_bytes());
        write_string(&mut buf, &self.signature);
        write_string(&mut buf, self.status.as_str());
        buf
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, LedgerError> {
        let mut reader = Reader::new(data);
        let tx = Self::read_from(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(LedgerError::Codec(format!(
                "{} trailing bytes after transaction",
                reader.remaining()
            )));
        }
        Ok(tx)
    }

    /// Read one transaction from a wire buffer. The id is recomputed and
    /// cross-checked, never trusted from the wire.
    pub(crate) fn read_from(reader: &mut Reader<'_>) -> Result<Self, LedgerError> {
        let id = reader.read_string()?;
        let public_key = reader.read_string()?;
        let name = reader.read_string()?;
        let surname = reader.read_string()?;
        let inquiry_id = reader.read_string()?;
        let secs = reader.read_i64()?;
        let datetime = DateTime::<Utc>::from_timestamp(secs, 0)
            .ok_or_else(|| LedgerError::Codec(format!("timestamp {secs} out of range")))?;
        let signature = reader.read_string()?;
        let status = TxStatus::from_wire(&reader.read_string()?);

        let tx = Self {
            id,
            public_key,
            name,
            surname,
            inquiry_id,
            datetime,
            signature,
            status,
        };
        if !tx.is_genesis() && tx.id != tx.compute_id() {
            return Err(LedgerError::IdMismatch(tx.id));
        }
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certchain_crypto::{generate_keypair, sign_message};

    fn signed_tx(datetime: DateTime<Utc>) -> Transaction {
        let (private_pem, public_pem) = generate_keypair();
        let mut tx = Transaction::new(public_pem, "Alice", "Doe", "inq-1", datetime, "");
        let sig = sign_message(&private_pem, tx.signable_message().as_bytes()).unwrap();
        tx.signature = sig;
        tx
    }

    #[test]
    fn id_is_deterministic_over_canonical_fields() {
        let now = Utc::now();
        let a = Transaction::new("pk", "Alice", "Doe", "inq-1", now, "sig");
        let b = Transaction::new("pk", "Alice", "Doe", "inq-1", now, "other-sig");
        // signature is not part of the id
        assert_eq!(a.id, b.id);

        let c = Transaction::new("pk", "Alice", "Doe", "inq-2", now, "sig");
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn signable_message_format() {
        let dt = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let tx = Transaction::new("PK", "A", "B", "I", dt, "");
        assert_eq!(tx.signable_message(), "PK|A|B|I|1700000000");
    }

    #[test]
    fn validate_static_rejects_empty_fields() {
        let now = Utc::now();
        let tx = Transaction::new("", "Alice", "Doe", "inq", now, "c2ln");
        assert_eq!(
            tx.validate_static(),
            Err(LedgerError::MissingField("public_key"))
        );

        let tx = Transaction::new("pk", "", "Doe", "inq", now, "c2ln");
        assert_eq!(tx.validate_static(), Err(LedgerError::MissingField("name")));

        let tx = Transaction::new("pk", "Alice", "Doe", "inq", now, "");
        assert_eq!(
            tx.validate_static(),
            Err(LedgerError::MissingField("signature"))
        );
    }

    #[test]
    fn validate_static_rejects_bad_base64_signature() {
        let tx = Transaction::new("pk", "Alice", "Doe", "inq", Utc::now(), "!!!");
        assert!(matches!(
            tx.validate_static(),
            Err(LedgerError::MalformedPayload(_))
        ));
    }

    #[test]
    fn genesis_sentinel_passes_static_validation() {
        let tx = Transaction::genesis_sentinel();
        assert_eq!(tx.validate_static(), Ok(()));
        assert_eq!(tx.verify(), Ok(()));
    }

    #[test]
    fn empty_signature_is_only_allowed_for_genesis() {
        let tx = Transaction::new("pk", "Eve", "Mallory", "inq", Utc::now(), "");
        assert!(tx.validate_static().is_err());
    }

    #[test]
    fn freshness_window_boundaries() {
        let now = Utc::now();
        let exactly_24h = Transaction::new("pk", "A", "B", "i", now - Duration::hours(24), "x");
        assert_eq!(exactly_24h.validate_freshness(now), Ok(()));

        let too_old =
            Transaction::new("pk", "A", "B", "i", now - Duration::hours(24) - Duration::seconds(1), "x");
        assert_eq!(too_old.validate_freshness(now), Err(LedgerError::StaleTime));

        let future = Transaction::new("pk", "A", "B", "i", now + Duration::minutes(6), "x");
        assert_eq!(future.validate_freshness(now), Err(LedgerError::FutureTime));
    }

    #[test]
    fn verify_accepts_valid_signature() {
        let tx = signed_tx(Utc::now());
        assert_eq!(tx.verify(), Ok(()));
    }

    #[test]
    fn verify_rejects_tampered_fields() {
        let mut tx = signed_tx(Utc::now());
        tx.name = "Mallory".into();
        assert_eq!(tx.verify(), Err(LedgerError::InvalidSignature));
    }

    #[test]
    fn wire_roundtrip() {
        let tx = signed_tx(Utc::now());
        let bytes = tx.serialize();
        let back = Transaction::deserialize(&bytes).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn wire_rejects_tampered_id() {
        let mut tx = signed_tx(Utc::now());
        tx.id = "00".repeat(32);
        let bytes = tx.serialize();
        assert!(matches!(
            Transaction::deserialize(&bytes),
            Err(LedgerError::IdMismatch(_))
        ));
    }

    #[test]
    fn certification_expiry() {
        let now = Utc::now();
        let tx = Transaction::new("pk", "A", "B", "i", now - Duration::days(400), "x");
        let year = 365 * 24 * 3600;
        assert!(tx.is_expired(year, now));
        assert!(!tx.is_expired(year * 2, now));
    }

    #[test]
    fn genesis_wire_roundtrip_keeps_literal_id() {
        let tx = Transaction::genesis_sentinel();
        let back = Transaction::deserialize(&tx.serialize()).unwrap();
        assert_eq!(back.id, "genesis");
        assert_eq!(back, tx);
    }
}
