//! Ed25519 signing and verification over PEM-encoded keys.
//!
//! Public keys travel as PEM-encoded SPKI documents, signatures as
//! standard base64. Key fingerprints are SHA-256 over the DER-encoded
//! subject-public-key-info.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::CryptoError;
use crate::hash::sha256;

/// Verify a base64 signature over `message` against a PEM-encoded public key.
///
/// Malformed inputs (bad PEM, bad base64, wrong signature length) are
/// reported distinctly from a signature that simply does not verify.
pub fn verify_signature(
    public_key_pem: &str,
    message: &[u8],
    signature_b64: &str,
) -> Result<(), CryptoError> {
    let key = VerifyingKey::from_public_key_pem(public_key_pem)
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;

    let sig_bytes = BASE64
        .decode(signature_b64)
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
    let sig_bytes: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::MalformedSignature("expected 64 bytes".into()))?;
    let signature = Signature::from_bytes(&sig_bytes);

    key.verify(message, &signature)
        .map_err(|_| CryptoError::InvalidSignature)
}

/// Sign a message with a PEM-encoded (PKCS#8) private key, returning the
/// signature as base64.
pub fn sign_message(private_key_pem: &str, message: &[u8]) -> Result<String, CryptoError> {
    let key = SigningKey::from_pkcs8_pem(private_key_pem)
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
    let signature = key.sign(message);
    Ok(BASE64.encode(signature.to_bytes()))
}

/// Generate a fresh keypair as `(private_pem, public_pem)`.
pub fn generate_keypair() -> (String, String) {
    let signing = SigningKey::generate(&mut OsRng);
    let private_pem = signing
        .to_pkcs8_pem(LineEnding::LF)
        .expect("ed25519 keys always encode to PKCS#8")
        .to_string();
    let public_pem = signing
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .expect("ed25519 keys always encode to SPKI");
    (private_pem, public_pem)
}

/// SHA-256 fingerprint of the DER-encoded subject-public-key-info,
/// lowercase hex.
pub fn fingerprint(public_key_pem: &str) -> Result<String, CryptoError> {
    let key = VerifyingKey::from_public_key_pem(public_key_pem)
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
    let der = key
        .to_public_key_der()
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
    Ok(hex::encode(sha256(der.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let (private_pem, public_pem) = generate_keypair();
        let sig = sign_message(&private_pem, b"attest this").unwrap();
        assert!(verify_signature(&public_pem, b"attest this", &sig).is_ok());
    }

    #[test]
    fn wrong_message_fails() {
        let (private_pem, public_pem) = generate_keypair();
        let sig = sign_message(&private_pem, b"original").unwrap();
        assert!(matches!(
            verify_signature(&public_pem, b"tampered", &sig),
            Err(CryptoError::InvalidSignature)
        ));
    }

    #[test]
    fn wrong_key_fails() {
        let (private_pem, _) = generate_keypair();
        let (_, other_public) = generate_keypair();
        let sig = sign_message(&private_pem, b"msg").unwrap();
        assert!(matches!(
            verify_signature(&other_public, b"msg", &sig),
            Err(CryptoError::InvalidSignature)
        ));
    }

    #[test]
    fn garbage_pem_is_malformed_key() {
        assert!(matches!(
            verify_signature("not a pem", b"msg", ""),
            Err(CryptoError::MalformedKey(_))
        ));
    }

    #[test]
    fn garbage_base64_is_malformed_signature() {
        let (_, public_pem) = generate_keypair();
        assert!(matches!(
            verify_signature(&public_pem, b"msg", "!!not-base64!!"),
            Err(CryptoError::MalformedSignature(_))
        ));
    }

    #[test]
    fn random_bytes_of_correct_length_do_not_verify() {
        let (_, public_pem) = generate_keypair();
        let forged = BASE64.encode([0x5au8; 64]);
        assert!(matches!(
            verify_signature(&public_pem, b"msg", &forged),
            Err(CryptoError::InvalidSignature)
        ));
    }

    #[test]
    fn fingerprint_is_stable_and_hex() {
        let (_, public_pem) = generate_keypair();
        let fp1 = fingerprint(&public_pem).unwrap();
        let fp2 = fingerprint(&public_pem).unwrap();
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.len(), 64);
        assert!(fp1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_keys_distinct_fingerprints() {
        let (_, pk1) = generate_keypair();
        let (_, pk2) = generate_keypair();
        assert_ne!(fingerprint(&pk1).unwrap(), fingerprint(&pk2).unwrap());
    }
}
