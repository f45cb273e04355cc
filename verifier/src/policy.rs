//! The verification policy shared by the live and mock adapters.

use chrono::{DateTime, Utc};
use unicode_normalization::UnicodeNormalization;

/// Default maximum age of an inquiry: 24 hours.
pub const DEFAULT_MAX_INQUIRY_AGE_SECS: u64 = 24 * 3600;

/// What the verification service reported for an inquiry.
#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub status: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub verified: bool,
}

fn nfc(s: &str) -> String {
    s.nfc().collect()
}

/// Case-sensitive comparison after NFC normalization, so the same name
/// typed with composed and decomposed accents still matches.
fn names_match(a: &str, b: &str) -> bool {
    nfc(a) == nfc(b)
}

/// Apply the acceptance policy: status completed/approved, names match,
/// inquiry no older than `max_age_secs`.
pub fn evaluate_policy(
    result: &mut VerificationResult,
    expected_name: &str,
    expected_surname: &str,
    now: DateTime<Utc>,
    max_age_secs: u64,
) {
    let status_ok = matches!(result.status.as_str(), "completed" | "approved");
    let name_ok = names_match(&result.first_name, expected_name)
        && names_match(&result.last_name, expected_surname);
    let age = now.signed_duration_since(result.created_at).num_seconds();
    let fresh = (0..=max_age_secs as i64).contains(&age) || age < 0;

    result.verified = status_ok && name_ok && fresh;
}
