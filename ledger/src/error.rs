use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("transaction datetime is too old")]
    StaleTime,

    #[error("transaction datetime is in the future")]
    FutureTime,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("block has no transactions")]
    EmptyBlock,

    #[error("merkle root mismatch")]
    MerkleMismatch,

    #[error("transaction id does not match its contents: {0}")]
    IdMismatch(String),

    #[error("codec error: {0}")]
    Codec(String),
}
