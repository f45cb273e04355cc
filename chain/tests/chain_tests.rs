//! Integration tests for the chain manager: submission, mining, block
//! acceptance, index maintenance and difficulty retargeting against a
//! real LMDB store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};

use certchain_chain::{mine_once, ChainConfig, ChainError, ChainManager};
use certchain_crypto::{generate_keypair, sign_message};
use certchain_ledger::{Block, Transaction};
use certchain_store::{BlockStore, CertStore, ChainStore, StoreError};
use certchain_store_lmdb::LmdbStore;
use certchain_types::CertRecord;

fn temp_store() -> (tempfile::TempDir, Arc<LmdbStore>) {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = LmdbStore::open(dir.path(), 16 * 1024 * 1024).expect("open store");
    (dir, Arc::new(store))
}

fn test_config() -> ChainConfig {
    ChainConfig {
        initial_difficulty: 4,
        ..ChainConfig::default()
    }
}

fn manager(store: Arc<LmdbStore>) -> ChainManager {
    ChainManager::new(store, test_config()).expect("chain manager")
}

fn signed_tx(inquiry: &str) -> Transaction {
    let (private_pem, public_pem) = generate_keypair();
    let mut tx = Transaction::new(public_pem, "Alice", "Doe", inquiry, Utc::now(), "");
    tx.signature = sign_message(&private_pem, tx.signable_message().as_bytes()).unwrap();
    tx
}

fn mined_block(txs: Vec<Transaction>, prev: String, height: u64, bits: u32) -> Block {
    let mut block = Block::new(txs, prev, height);
    block.header.bits = bits;
    let nonce = certchain_work::mine(&block.header, &AtomicBool::new(false)).expect("mineable");
    block.header.nonce = nonce;
    block
}

fn not_cancelled() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

// ── Genesis & persistence ───────────────────────────────────────────────

#[tokio::test]
async fn fresh_store_gets_a_genesis_block() {
    let (_dir, store) = temp_store();
    let chain = manager(Arc::clone(&store));

    assert_eq!(chain.height().await, 0);
    let tip = chain.tip().await;
    assert_eq!(tip.header.prev_block_hash, "0");
    assert_eq!(tip.transactions[0].inquiry_id, "genesis");
    assert_eq!(store.block_count().unwrap(), 1);
}

#[tokio::test]
async fn reload_resumes_the_persisted_chain() {
    let (_dir, store) = temp_store();
    {
        let chain = manager(Arc::clone(&store));
        let tx = signed_tx("inq-reload");
        chain.add_transaction(tx).await.unwrap();
        assert!(mine_once(&chain, not_cancelled()).await.unwrap());
        assert_eq!(chain.height().await, 1);
    }

    // A second manager over the same store must not mint a new genesis.
    let reloaded = manager(Arc::clone(&store));
    assert_eq!(reloaded.height().await, 1);
    assert_eq!(store.block_count().unwrap(), 2);
}

// ── Submission validation ───────────────────────────────────────────────

#[tokio::test]
async fn missing_field_is_rejected() {
    let (_dir, store) = temp_store();
    let chain = manager(store);

    let tx = Transaction::new("", "Alice", "Doe", "inq-1", Utc::now(), "c2ln");
    assert!(matches!(
        chain.add_transaction(tx).await,
        Err(ChainError::MissingField(_))
    ));
    assert_eq!(chain.mempool_len().await, 0);
}

#[tokio::test]
async fn stale_and_future_timestamps_are_rejected() {
    let (_dir, store) = temp_store();
    let chain = manager(store);

    let mut stale = signed_tx("inq-stale");
    stale.datetime = Utc::now() - Duration::hours(25);
    stale.id = stale.compute_id();
    assert!(matches!(
        chain.add_transaction(stale).await,
        Err(ChainError::StaleTime)
    ));

    let mut future = signed_tx("inq-future");
    future.datetime = Utc::now() + Duration::minutes(10);
    future.id = future.compute_id();
    assert!(matches!(
        chain.add_transaction(future).await,
        Err(ChainError::FutureTime)
    ));
}

#[tokio::test]
async fn forged_signature_is_rejected() {
    let (_dir, store) = temp_store();
    let chain = manager(store);

    let mut tx = signed_tx("inq-forged");
    tx.name = "Mallory".into();
    tx.id = tx.compute_id();
    assert!(matches!(
        chain.add_transaction(tx).await,
        Err(ChainError::InvalidSignature)
    ));
    assert_eq!(chain.mempool_len().await, 0);
}

#[tokio::test]
async fn pooled_inquiry_cannot_be_resubmitted() {
    let (_dir, store) = temp_store();
    let chain = manager(store);

    let tx = signed_tx("inq-dup");
    chain.add_transaction(tx.clone()).await.unwrap();
    assert!(matches!(
        chain.add_transaction(tx).await,
        Err(ChainError::DuplicateInquiry)
    ));
    assert_eq!(chain.mempool_len().await, 1);
}

// ── Submit-then-mine ────────────────────────────────────────────────────

#[tokio::test]
async fn submit_then_mine_then_query() {
    let (_dir, store) = temp_store();
    let chain = manager(store);

    let tx = signed_tx("inq-1");
    let pk = tx.public_key.clone();
    chain.add_transaction(tx).await.unwrap();
    assert_eq!(chain.mempool_len().await, 1);

    assert!(mine_once(&chain, not_cancelled()).await.unwrap());

    assert_eq!(chain.height().await, 1);
    assert_eq!(chain.mempool_len().await, 0);
    let tip = chain.tip().await;
    assert_eq!(tip.transactions[0].inquiry_id, "inq-1");

    let record = chain.cert_by_public_key(&pk).await.unwrap();
    assert_eq!(record.inquiry_id, "inq-1");
    assert_eq!(record.height, 1);
    assert_eq!(record.block_hash, tip.hash());

    let by_identity = chain.cert_by_identity("Alice", "Doe").await.unwrap();
    assert_eq!(by_identity, record);
    let by_inquiry = chain.cert_by_inquiry("inq-1").await.unwrap();
    assert_eq!(by_inquiry, record);
}

#[tokio::test]
async fn mined_inquiry_cannot_be_resubmitted() {
    let (_dir, store) = temp_store();
    let chain = manager(store);

    let tx = signed_tx("inq-1");
    chain.add_transaction(tx.clone()).await.unwrap();
    assert!(mine_once(&chain, not_cancelled()).await.unwrap());

    assert!(matches!(
        chain.add_transaction(tx).await,
        Err(ChainError::DuplicateInquiry)
    ));
    assert_eq!(chain.mempool_len().await, 0);
    assert_eq!(chain.height().await, 1);
}

#[tokio::test]
async fn empty_mempool_mines_nothing() {
    let (_dir, store) = temp_store();
    let chain = manager(store);
    assert!(!mine_once(&chain, not_cancelled()).await.unwrap());
    assert_eq!(chain.height().await, 0);
}

#[tokio::test]
async fn candidate_respects_the_per_block_cap() {
    let (_dir, store) = temp_store();
    let config = ChainConfig {
        initial_difficulty: 4,
        max_trans_per_block: 2,
        ..ChainConfig::default()
    };
    let chain = ChainManager::new(store, config).unwrap();

    for i in 0..3 {
        chain.add_transaction(signed_tx(&format!("inq-{i}"))).await.unwrap();
    }
    assert!(mine_once(&chain, not_cancelled()).await.unwrap());

    let tip = chain.tip().await;
    assert_eq!(tip.transactions.len(), 2);
    // first two in insertion order were taken
    assert_eq!(tip.transactions[0].inquiry_id, "inq-0");
    assert_eq!(tip.transactions[1].inquiry_id, "inq-1");
    assert_eq!(chain.mempool_len().await, 1);
}

// ── Block acceptance ────────────────────────────────────────────────────

#[tokio::test]
async fn accept_block_checks_linkage_and_work() {
    let (_dir, store) = temp_store();
    let chain = manager(store);
    let tip = chain.tip().await;

    // wrong previous hash
    let bad_prev = mined_block(vec![signed_tx("inq-a")], "ab".repeat(32), 1, 4);
    assert!(matches!(
        chain.accept_block(bad_prev).await,
        Err(ChainError::InvalidBlock(_))
    ));

    // wrong height
    let bad_height = mined_block(vec![signed_tx("inq-b")], tip.hash(), 5, 4);
    assert!(matches!(
        chain.accept_block(bad_height).await,
        Err(ChainError::InvalidBlock(_))
    ));

    // unmined block fails the work check
    let mut unmined = Block::new(vec![signed_tx("inq-c")], tip.hash(), 1);
    unmined.header.bits = 32;
    assert!(matches!(
        chain.accept_block(unmined).await,
        Err(ChainError::WorkInvalid)
    ));

    assert_eq!(chain.height().await, 0);
}

#[tokio::test]
async fn reaccepting_a_block_is_a_rejected_noop() {
    let (_dir, store) = temp_store();
    let chain = manager(Arc::clone(&store));

    let tip = chain.tip().await;
    let block = mined_block(vec![signed_tx("inq-1")], tip.hash(), 1, 4);
    chain.accept_block(block.clone()).await.unwrap();
    assert_eq!(chain.height().await, 1);
    let accepted = chain.tip().await;

    assert!(matches!(
        chain.accept_block(block).await,
        Err(ChainError::DuplicateBlock)
    ));
    assert_eq!(chain.height().await, 1);
    assert_eq!(chain.tip().await, accepted);
    assert_eq!(store.block_count().unwrap(), 2);
}

// ── Store failure rollback ──────────────────────────────────────────────

struct FailingStore {
    inner: Arc<LmdbStore>,
    fail_saves: AtomicBool,
}

impl BlockStore for FailingStore {
    fn save_block(&self, block: &Block) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("injected failure".into()));
        }
        self.inner.save_block(block)
    }
    fn block_by_height(&self, height: u64) -> Result<Block, StoreError> {
        self.inner.block_by_height(height)
    }
    fn block_by_hash(&self, hash: &str) -> Result<Block, StoreError> {
        self.inner.block_by_hash(hash)
    }
    fn tip_height(&self) -> Result<Option<u64>, StoreError> {
        self.inner.tip_height()
    }
    fn block_count(&self) -> Result<u64, StoreError> {
        self.inner.block_count()
    }
}

impl CertStore for FailingStore {
    fn save_cert(&self, record: &CertRecord) -> Result<(), StoreError> {
        self.inner.save_cert(record)
    }
    fn cert_by_public_key(&self, public_key: &str) -> Result<CertRecord, StoreError> {
        self.inner.cert_by_public_key(public_key)
    }
    fn cert_by_identity(&self, name: &str, surname: &str) -> Result<CertRecord, StoreError> {
        self.inner.cert_by_identity(name, surname)
    }
    fn cert_by_inquiry(&self, inquiry_id: &str) -> Result<CertRecord, StoreError> {
        self.inner.cert_by_inquiry(inquiry_id)
    }
    fn expire_certs(&self, older_than: chrono::DateTime<Utc>) -> Result<usize, StoreError> {
        self.inner.expire_certs(older_than)
    }
    fn cert_count(&self) -> Result<u64, StoreError> {
        self.inner.cert_count()
    }
}

#[tokio::test]
async fn store_failure_rolls_back_the_append_and_keeps_the_pool() {
    let (_dir, lmdb) = temp_store();
    let failing = Arc::new(FailingStore {
        inner: lmdb,
        fail_saves: AtomicBool::new(false),
    });
    let chain =
        ChainManager::new(Arc::clone(&failing) as Arc<dyn ChainStore>, test_config()).unwrap();

    chain.add_transaction(signed_tx("inq-1")).await.unwrap();
    failing.fail_saves.store(true, Ordering::Relaxed);

    let err = mine_once(&chain, not_cancelled()).await.unwrap_err();
    assert!(matches!(err, ChainError::Store(_)));

    // in-memory append was rolled back; the transaction stays pooled
    assert_eq!(chain.height().await, 0);
    assert_eq!(chain.mempool_len().await, 1);

    // the next tick succeeds once the store recovers
    failing.fail_saves.store(false, Ordering::Relaxed);
    assert!(mine_once(&chain, not_cancelled()).await.unwrap());
    assert_eq!(chain.height().await, 1);
    assert_eq!(chain.mempool_len().await, 0);
}

// ── Index repair ────────────────────────────────────────────────────────

#[tokio::test]
async fn queries_fall_back_to_a_chain_scan_and_repair_the_index() {
    let (_dir, store) = temp_store();
    let chain = manager(Arc::clone(&store));

    let tx = signed_tx("inq-1");
    let pk = tx.public_key.clone();
    chain.add_transaction(tx).await.unwrap();
    assert!(mine_once(&chain, not_cancelled()).await.unwrap());

    // Simulate a lost index: expire every cert row.
    store.expire_certs(Utc::now() + Duration::hours(1)).unwrap();
    assert!(store.cert_by_public_key(&pk).unwrap_err().is_not_found());

    // The scan finds the record and rebuilds the store row.
    let record = chain.cert_by_public_key(&pk).await.unwrap();
    assert_eq!(record.inquiry_id, "inq-1");
    let repaired = store.cert_by_public_key(&pk).unwrap();
    assert_eq!(repaired, record);
}

#[tokio::test]
async fn unknown_queries_return_not_found() {
    let (_dir, store) = temp_store();
    let chain = manager(store);
    assert!(matches!(
        chain.cert_by_public_key("nope").await,
        Err(ChainError::NotFound)
    ));
    assert!(matches!(
        chain.cert_by_identity("No", "Body").await,
        Err(ChainError::NotFound)
    ));
}

// ── Difficulty retarget ─────────────────────────────────────────────────

#[tokio::test]
async fn fast_window_raises_the_difficulty() {
    let (_dir, store) = temp_store();
    let config = ChainConfig {
        initial_difficulty: 4,
        difficulty_adjust: 2,
        target_block_time_secs: 3600,
        ..ChainConfig::default()
    };
    let chain = ChainManager::new(store, config).unwrap();
    assert_eq!(chain.current_bits().await, 4);

    for i in 0..2 {
        chain.add_transaction(signed_tx(&format!("inq-{i}"))).await.unwrap();
        assert!(mine_once(&chain, not_cancelled()).await.unwrap());
    }

    // Two blocks milliseconds apart against a 2-hour expected window.
    assert_eq!(chain.height().await, 2);
    assert_eq!(chain.current_bits().await, 5);
}
