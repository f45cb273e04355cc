//! LMDB implementation of `CertStore`.

use chrono::{DateTime, Utc};

use certchain_store::{CertStore, StoreError};
use certchain_types::CertRecord;

use crate::environment::LmdbStore;
use crate::LmdbError;

fn encode(record: &CertRecord) -> Result<Vec<u8>, LmdbError> {
    serde_json::to_vec(record).map_err(|e| LmdbError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<CertRecord, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl CertStore for LmdbStore {
    fn save_cert(&self, record: &CertRecord) -> Result<(), StoreError> {
        let bytes = encode(record)?;
        let identity_key = CertRecord::identity_key(&record.name, &record.surname);

        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.certs_pk
            .put(&mut wtxn, record.public_key.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        self.certs_identity
            .put(&mut wtxn, identity_key.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        self.certs_inquiry
            .put(&mut wtxn, record.inquiry_id.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn cert_by_public_key(&self, public_key: &str) -> Result<CertRecord, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bytes = self
            .certs_pk
            .get(&rtxn, public_key.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound("certification by public key".into()))?;
        decode(bytes)
    }

    fn cert_by_identity(&self, name: &str, surname: &str) -> Result<CertRecord, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let key = CertRecord::identity_key(name, surname);
        let bytes = self
            .certs_identity
            .get(&rtxn, key.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("certification for {key}")))?;
        decode(bytes)
    }

    fn cert_by_inquiry(&self, inquiry_id: &str) -> Result<CertRecord, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bytes = self
            .certs_inquiry
            .get(&rtxn, inquiry_id.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("certification for inquiry {inquiry_id}")))?;
        decode(bytes)
    }

    fn expire_certs(&self, older_than: DateTime<Utc>) -> Result<usize, StoreError> {
        let databases = [&self.certs_pk, &self.certs_identity, &self.certs_inquiry];
        let mut removed = 0usize;

        // Collect keys under a read transaction, then delete in one write
        // transaction per database.
        for db in databases {
            let stale: Vec<Vec<u8>> = {
                let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
                let iter = db.iter(&rtxn).map_err(LmdbError::from)?;
                let mut keys = Vec::new();
                for entry in iter {
                    let (key, value) = entry.map_err(LmdbError::from)?;
                    match decode(value) {
                        Ok(record) if record.datetime < older_than => keys.push(key.to_vec()),
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "skipping undecodable cert row in expiry scan");
                        }
                    }
                }
                keys
            };

            if stale.is_empty() {
                continue;
            }
            let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
            for key in &stale {
                db.delete(&mut wtxn, key).map_err(LmdbError::from)?;
                removed += 1;
            }
            wtxn.commit().map_err(LmdbError::from)?;
        }

        Ok(removed)
    }

    fn cert_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.certs_pk.len(&rtxn).map_err(LmdbError::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::test_support::temp_store;
    use chrono::Duration;

    fn record(inquiry: &str, datetime: DateTime<Utc>) -> CertRecord {
        CertRecord {
            public_key: format!("pem-{inquiry}"),
            name: "Alice".into(),
            surname: "Doe".into(),
            inquiry_id: inquiry.into(),
            datetime,
            block_hash: "ab".repeat(32),
            height: 1,
        }
    }

    #[test]
    fn save_populates_all_three_indexes() {
        let (_dir, store) = temp_store();
        let rec = record("inq-1", Utc::now());
        store.save_cert(&rec).unwrap();

        assert_eq!(store.cert_by_public_key(&rec.public_key).unwrap(), rec);
        assert_eq!(store.cert_by_identity("Alice", "Doe").unwrap(), rec);
        assert_eq!(store.cert_by_inquiry("inq-1").unwrap(), rec);
        assert_eq!(store.cert_count().unwrap(), 1);
    }

    #[test]
    fn missing_record_is_not_found() {
        let (_dir, store) = temp_store();
        assert!(store.cert_by_inquiry("nope").unwrap_err().is_not_found());
        assert!(store
            .cert_by_identity("No", "Body")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn newer_record_overwrites_identity_row() {
        let (_dir, store) = temp_store();
        let old = record("inq-1", Utc::now() - Duration::hours(1));
        let new = record("inq-2", Utc::now());
        store.save_cert(&old).unwrap();
        store.save_cert(&new).unwrap();

        // Same identity key, youngest record wins.
        assert_eq!(store.cert_by_identity("Alice", "Doe").unwrap(), new);
        // Both inquiry rows remain addressable.
        assert_eq!(store.cert_by_inquiry("inq-1").unwrap(), old);
        assert_eq!(store.cert_by_inquiry("inq-2").unwrap(), new);
    }

    #[test]
    fn expire_removes_only_stale_rows() {
        let (_dir, store) = temp_store();
        let now = Utc::now();
        let mut stale = record("inq-old", now - Duration::days(400));
        stale.surname = "Elder".into();
        let fresh = record("inq-new", now);
        store.save_cert(&stale).unwrap();
        store.save_cert(&fresh).unwrap();

        let removed = store.expire_certs(now - Duration::days(365)).unwrap();
        // one row per index
        assert_eq!(removed, 3);

        assert!(store.cert_by_inquiry("inq-old").unwrap_err().is_not_found());
        assert!(store
            .cert_by_identity("Alice", "Elder")
            .unwrap_err()
            .is_not_found());
        assert_eq!(store.cert_by_inquiry("inq-new").unwrap(), fresh);
    }

    #[test]
    fn expire_on_empty_store_is_a_noop() {
        let (_dir, store) = temp_store();
        assert_eq!(store.expire_certs(Utc::now()).unwrap(), 0);
    }
}
