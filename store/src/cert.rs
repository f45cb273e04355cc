//! Secondary certification indexes: by public key, by identity, by
//! inquiry token.

use chrono::{DateTime, Utc};

use certchain_types::CertRecord;

use crate::StoreError;

pub trait CertStore {
    /// Write all three index rows for a record atomically.
    fn save_cert(&self, record: &CertRecord) -> Result<(), StoreError>;

    fn cert_by_public_key(&self, public_key: &str) -> Result<CertRecord, StoreError>;

    fn cert_by_identity(&self, name: &str, surname: &str) -> Result<CertRecord, StoreError>;

    fn cert_by_inquiry(&self, inquiry_id: &str) -> Result<CertRecord, StoreError>;

    /// Delete index rows whose embedded datetime is older than the
    /// threshold. Local index hygiene only; the chain is untouched.
    /// Returns the number of rows removed.
    fn expire_certs(&self, older_than: DateTime<Utc>) -> Result<usize, StoreError>;

    fn cert_count(&self) -> Result<u64, StoreError>;
}
