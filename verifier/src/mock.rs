//! In-memory verifier for tests and keyless deployments.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::policy::{evaluate_policy, VerificationResult, DEFAULT_MAX_INQUIRY_AGE_SECS};
use crate::{IdentityVerifier, VerifierError};

#[derive(Clone)]
struct MockInquiry {
    status: String,
    first_name: String,
    last_name: String,
    created_at: DateTime<Utc>,
}

/// Deterministic in-memory stand-in for the verification service.
pub struct MockVerifier {
    inquiries: Mutex<HashMap<String, MockInquiry>>,
    max_inquiry_age_secs: u64,
}

impl MockVerifier {
    pub fn new() -> Self {
        Self {
            inquiries: Mutex::new(HashMap::new()),
            max_inquiry_age_secs: DEFAULT_MAX_INQUIRY_AGE_SECS,
        }
    }

    /// Register an inquiry created "now".
    pub fn insert_inquiry(&self, inquiry_id: &str, status: &str, first_name: &str, last_name: &str) {
        self.insert_inquiry_at(inquiry_id, status, first_name, last_name, Utc::now());
    }

    /// Register an inquiry with an explicit creation time (for staleness
    /// tests).
    pub fn insert_inquiry_at(
        &self,
        inquiry_id: &str,
        status: &str,
        first_name: &str,
        last_name: &str,
        created_at: DateTime<Utc>,
    ) {
        self.inquiries.lock().expect("mock lock").insert(
            inquiry_id.to_string(),
            MockInquiry {
                status: status.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                created_at,
            },
        );
    }
}

impl Default for MockVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityVerifier for MockVerifier {
    async fn verify_identity(
        &self,
        inquiry_id: &str,
        expected_name: &str,
        expected_surname: &str,
    ) -> Result<VerificationResult, VerifierError> {
        let inquiry = self
            .inquiries
            .lock()
            .expect("mock lock")
            .get(inquiry_id)
            .cloned();

        let Some(inquiry) = inquiry else {
            return Ok(VerificationResult {
                status: "not_found".into(),
                first_name: String::new(),
                last_name: String::new(),
                created_at: Utc::now(),
                verified: false,
            });
        };

        let mut result = VerificationResult {
            status: inquiry.status,
            first_name: inquiry.first_name,
            last_name: inquiry.last_name,
            created_at: inquiry.created_at,
            verified: false,
        };
        evaluate_policy(
            &mut result,
            expected_name,
            expected_surname,
            Utc::now(),
            self.max_inquiry_age_secs,
        );
        Ok(result)
    }
}
