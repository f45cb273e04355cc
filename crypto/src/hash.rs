//! SHA-256 hashing for transactions, blocks and Merkle trees.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 digest of arbitrary data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// SHA-256(SHA-256(data)) as lowercase hex.
pub fn double_sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(&sha256(data)))
}

/// Decode a hex digest into a zero-padded 32-byte array.
///
/// Short or non-hex input yields the zero-extended prefix, so the genesis
/// sentinel `"0"` maps to 32 zero bytes.
pub fn hex_to_32(s: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    if let Ok(bytes) = hex::decode(s) {
        let n = bytes.len().min(32);
        out[..n].copy_from_slice(&bytes[..n]);
    }
    out
}

/// Hash a Merkle pair: concatenate the raw 32-byte values of two hex
/// digests and hash them once.
pub fn merkle_pair(left_hex: &str, right_hex: &str) -> String {
    hex::encode(sha256_multi(&[&hex_to_32(left_hex), &hex_to_32(right_hex)]))
}
