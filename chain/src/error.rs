use certchain_ledger::LedgerError;
use certchain_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("{0} is required")]
    MissingField(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("transaction datetime is too old")]
    StaleTime,

    #[error("transaction datetime is in the future")]
    FutureTime,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("inquiry ID already exists")]
    DuplicateInquiry,

    #[error("transaction already in pool")]
    DuplicateInPool,

    #[error("block already accepted")]
    DuplicateBlock,

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("proof of work does not meet the target")]
    WorkInvalid,

    #[error("not found")]
    NotFound,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<LedgerError> for ChainError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::MissingField(field) => Self::MissingField(field.to_string()),
            LedgerError::MalformedPayload(msg) => Self::MalformedPayload(msg),
            LedgerError::StaleTime => Self::StaleTime,
            LedgerError::FutureTime => Self::FutureTime,
            LedgerError::InvalidSignature => Self::InvalidSignature,
            other => Self::InvalidBlock(other.to_string()),
        }
    }
}
