use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested key does not exist. Callers may fall back to a
    /// chain scan on this variant only.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend I/O or environment failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
