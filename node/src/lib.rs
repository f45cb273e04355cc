//! Node assembly: configuration, subsystem wiring and graceful shutdown.

pub mod config;
pub mod error;
pub mod node;
pub mod shutdown;

pub use config::{load_seed_file, Config};
pub use error::NodeError;
pub use node::CertNode;
pub use shutdown::ShutdownController;
