use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// The public or private key could not be parsed from PEM.
    #[error("malformed key: {0}")]
    MalformedKey(String),

    /// The signature could not be decoded from base64 or has the wrong length.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// The signature decoded fine but does not verify against the key.
    #[error("signature verification failed")]
    InvalidSignature,
}
