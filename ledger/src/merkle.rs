//! Merkle root over transaction ids.

use certchain_crypto::merkle_pair;

/// Standard binary Merkle tree over hex transaction ids, duplicating the
/// last node when a level is odd. Zero transactions yield the empty
/// string; a single transaction yields its own id.
pub fn merkle_root(ids: &[String]) -> String {
    if ids.is_empty() {
        return String::new();
    }
    if ids.len() == 1 {
        return ids[0].clone();
    }

    let mut level: Vec<String> = ids.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            next.push(merkle_pair(left, right));
        }
        level = next;
    }
    level.into_iter().next().expect("one root remains")
}
