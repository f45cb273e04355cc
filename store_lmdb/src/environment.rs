//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::LmdbError;

/// Number of named LMDB databases.
const MAX_DBS: u32 = 8;
/// Default LMDB map size: 1 GiB.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

/// The LMDB-backed store: wraps the environment and all database handles.
///
/// Implements the `certchain-store` traits; clones share the underlying
/// environment.
#[derive(Clone)]
pub struct LmdbStore {
    pub(crate) env: Arc<Env>,

    /// Block wire bytes keyed by big-endian height.
    pub(crate) blocks_by_height: Database<Bytes, Bytes>,
    /// Block wire bytes keyed by the hex block hash.
    pub(crate) blocks_by_hash: Database<Bytes, Bytes>,

    /// Cert records (JSON) keyed by PEM public key.
    pub(crate) certs_pk: Database<Bytes, Bytes>,
    /// Cert records keyed by `name:surname`.
    pub(crate) certs_identity: Database<Bytes, Bytes>,
    /// Cert records keyed by inquiry id.
    pub(crate) certs_inquiry: Database<Bytes, Bytes>,

    /// Chain tip and schema metadata.
    pub(crate) meta: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Open or create the store at `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)
            .map_err(|e| LmdbError::Heed(format!("failed to create data directory: {e}")))?;

        let env = unsafe {
            EnvOpenOptions::new()
                .max_dbs(MAX_DBS)
                .map_size(map_size)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let blocks_by_height = env.create_database(&mut wtxn, Some("blocks_by_height"))?;
        let blocks_by_hash = env.create_database(&mut wtxn, Some("blocks_by_hash"))?;
        let certs_pk = env.create_database(&mut wtxn, Some("certs_pk"))?;
        let certs_identity = env.create_database(&mut wtxn, Some("certs_identity"))?;
        let certs_inquiry = env.create_database(&mut wtxn, Some("certs_inquiry"))?;
        let meta = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        Ok(Self {
            env: Arc::new(env),
            blocks_by_height,
            blocks_by_hash,
            certs_pk,
            certs_identity,
            certs_inquiry,
            meta,
        })
    }

    /// Force a sync of dirty pages before process exit.
    pub fn force_sync(&self) -> Result<(), LmdbError> {
        let wtxn = self.env.write_txn()?;
        wtxn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn temp_store() -> (tempfile::TempDir, LmdbStore) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let store = LmdbStore::open(dir.path(), 16 * 1024 * 1024).expect("failed to open env");
        (dir, store)
    }
}
