use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifierError {
    /// Transport-level failure reaching the verification service
    /// (connect, timeout). Retryable; surfaced as 502 upstream failure.
    #[error("verification service unreachable: {0}")]
    Upstream(String),

    /// The service answered but the body was not the expected shape.
    #[error("unexpected verification response: {0}")]
    Decode(String),
}
