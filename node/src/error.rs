use thiserror::Error;

use certchain_chain::ChainError;
use certchain_network::NetworkError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("network bind error: {0}")]
    Bind(String),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    /// Process exit code: 1 configuration, 2 storage open, 3 network bind.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::Storage(_) => 2,
            Self::Bind(_) => 3,
            _ => 1,
        }
    }
}
