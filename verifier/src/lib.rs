//! Adapter to the external identity-verification service.
//!
//! Two implementations of [`IdentityVerifier`]: a live HTTP client for
//! the Persona inquiry API, and a deterministic in-memory mock for tests
//! and API-keyless deployments.

pub mod error;
pub mod mock;
pub mod persona;
pub mod policy;

pub use error::VerifierError;
pub use mock::MockVerifier;
pub use persona::PersonaClient;
pub use policy::{evaluate_policy, VerificationResult, DEFAULT_MAX_INQUIRY_AGE_SECS};

use async_trait::async_trait;

/// Confirms an inquiry token with the external verification service and
/// checks it against the identity being certified.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_identity(
        &self,
        inquiry_id: &str,
        expected_name: &str,
        expected_surname: &str,
    ) -> Result<VerificationResult, VerifierError>;
}
