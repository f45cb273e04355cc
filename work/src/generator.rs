//! Nonce search.

use std::sync::atomic::{AtomicBool, Ordering};

use certchain_ledger::BlockHeader;

use crate::validator::validate_hash;
use crate::CANCEL_CHECK_INTERVAL;

/// Search the nonce space for the first value whose header hash meets the
/// target encoded in `header.bits`.
///
/// Returns `None` when the space is exhausted or `cancelled` flips,
/// never a partial result. The caller rewinds the timestamp and retries
/// on the next tick.
pub fn mine(header: &BlockHeader, cancelled: &AtomicBool) -> Option<u32> {
    let mut candidate = header.clone();
    let mut nonce: u32 = 0;

    loop {
        candidate.nonce = nonce;
        if validate_hash(&candidate.hash_bytes(), candidate.bits) {
            tracing::debug!(nonce, bits = candidate.bits, "found valid nonce");
            return Some(nonce);
        }

        if nonce % CANCEL_CHECK_INTERVAL == 0 && nonce > 0 {
            if cancelled.load(Ordering::Relaxed) {
                tracing::debug!(tried = nonce, "mining cancelled");
                return None;
            }
            tracing::trace!(tried = nonce, "mining progress");
        }

        nonce = match nonce.checked_add(1) {
            Some(n) => n,
            None => return None,
        };
    }
}
