//! Live adapter for the Persona inquiry API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::policy::{evaluate_policy, VerificationResult};
use crate::{IdentityVerifier, VerifierError};

/// Request timeout against the verification service.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PersonaClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
    max_inquiry_age_secs: u64,
}

/// JSON shape of `GET /inquiries/{id}`, reduced to the attributes the
/// policy consumes.
#[derive(Deserialize)]
struct InquiryResponse {
    data: InquiryData,
}

#[derive(Deserialize)]
struct InquiryData {
    attributes: InquiryAttributes,
}

#[derive(Deserialize)]
struct InquiryAttributes {
    status: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    fields: InquiryFields,
}

#[derive(Deserialize, Default)]
struct InquiryFields {
    #[serde(default)]
    name_first: String,
    #[serde(default)]
    name_last: String,
}

impl PersonaClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, max_inquiry_age_secs: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client with static configuration");
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            http,
            max_inquiry_age_secs,
        }
    }

    async fn get_inquiry(&self, inquiry_id: &str) -> Result<Option<InquiryResponse>, VerifierError> {
        let url = format!("{}/inquiries/{}", self.base_url.trim_end_matches('/'), inquiry_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| VerifierError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // Any 4xx/5xx is treated as verification failure, not as a
            // node-side error.
            tracing::warn!(%status, inquiry_id, "verification service rejected inquiry lookup");
            return Ok(None);
        }

        let body: InquiryResponse = response
            .json()
            .await
            .map_err(|e| VerifierError::Decode(e.to_string()))?;
        Ok(Some(body))
    }
}

#[async_trait]
impl IdentityVerifier for PersonaClient {
    async fn verify_identity(
        &self,
        inquiry_id: &str,
        expected_name: &str,
        expected_surname: &str,
    ) -> Result<VerificationResult, VerifierError> {
        let Some(inquiry) = self.get_inquiry(inquiry_id).await? else {
            return Ok(VerificationResult {
                status: "rejected".into(),
                first_name: String::new(),
                last_name: String::new(),
                created_at: Utc::now(),
                verified: false,
            });
        };

        let attrs = inquiry.data.attributes;
        let mut result = VerificationResult {
            status: attrs.status,
            first_name: attrs.fields.name_first,
            last_name: attrs.fields.name_last,
            created_at: attrs.created_at,
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
