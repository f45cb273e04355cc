use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request to {addr} failed: {reason}")]
    Http { addr: String, reason: String },

    #[error("{addr} answered with status {status}")]
    Status { addr: String, status: u16 },

    #[error("undecodable response from {addr}: {reason}")]
    Decode { addr: String, reason: String },

    #[error("peer sent invalid data: {0}")]
    InvalidPeerData(String),

    #[error("failed to bind discovery socket: {0}")]
    Bind(#[from] std::io::Error),
}
