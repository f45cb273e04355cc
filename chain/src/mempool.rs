//! Pending-transaction pool.
//!
//! Insertion-ordered so candidate blocks pick transactions fairly;
//! membership keyed by transaction id, with an inquiry view for replay
//! suppression.

use std::collections::HashSet;

use certchain_ledger::Transaction;

#[derive(Default)]
pub struct Mempool {
    txs: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.txs.iter().any(|tx| tx.id == id)
    }

    pub fn contains_inquiry(&self, inquiry_id: &str) -> bool {
        self.txs.iter().any(|tx| tx.inquiry_id == inquiry_id)
    }

    /// Enqueue an already-validated transaction.
    pub fn push(&mut self, tx: Transaction) {
        self.txs.push(tx);
    }

    /// Clone up to `max` transactions in insertion order.
    pub fn snapshot(&self, max: usize) -> Vec<Transaction> {
        self.txs.iter().take(max).cloned().collect()
    }

    /// Drop every transaction whose id is in `mined`.
    pub fn remove_ids(&mut self, mined: &HashSet<String>) {
        self.txs.retain(|tx| !mined.contains(&tx.id));
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }
}
