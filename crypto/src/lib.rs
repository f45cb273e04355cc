//! Cryptographic primitives: SHA-256 digests, Merkle pair hashing, and
//! Ed25519 signatures over PEM-encoded keys.
//!
//! All digests transit as lowercase hex strings.

pub mod error;
pub mod hash;
pub mod sign;

pub use error::CryptoError;
pub use hash::{
    double_sha256_hex, hex_to_32, merkle_pair, sha256, sha256_hex, sha256_multi,
};
pub use sign::{fingerprint, generate_keypair, sign_message, verify_signature};
