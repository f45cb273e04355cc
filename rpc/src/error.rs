//! API error envelope: every failing request maps to a kind, an HTTP
//! status and a `{error, code, detail}` JSON body. Absent query targets
//! are the exception: they return 404 with an empty body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use certchain_chain::ChainError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("identity not verified: {0}")]
    IdentityUnverified(String),

    #[error("identity verification unavailable: {0}")]
    Upstream(String),

    #[error("not found")]
    NotFound,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    detail: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Chain(e) => match e {
                ChainError::MissingField(_) => (StatusCode::BAD_REQUEST, "MissingField"),
                ChainError::MalformedPayload(_) => (StatusCode::BAD_REQUEST, "MalformedPayload"),
                ChainError::StaleTime => (StatusCode::BAD_REQUEST, "StaleTime"),
                ChainError::FutureTime => (StatusCode::BAD_REQUEST, "FutureTime"),
                ChainError::InvalidSignature => (StatusCode::BAD_REQUEST, "InvalidSignature"),
                ChainError::DuplicateInquiry => (StatusCode::CONFLICT, "DuplicateInquiry"),
                ChainError::DuplicateInPool => (StatusCode::CONFLICT, "DuplicateInPool"),
                ChainError::NotFound => (StatusCode::NOT_FOUND, "NotFound"),
                ChainError::Store(_)
                | ChainError::InvalidBlock(_)
                | ChainError::WorkInvalid
                | ChainError::DuplicateBlock => (StatusCode::INTERNAL_SERVER_ERROR, "Internal"),
            },
            Self::IdentityUnverified(_) => (StatusCode::BAD_REQUEST, "IdentityUnverified"),
            Self::Upstream(_) => (StatusCode::BAD_GATEWAY, "UpstreamFailure"),
            Self::NotFound => (StatusCode::NOT_FOUND, "NotFound"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status == StatusCode::NOT_FOUND {
            // Absent query targets: 404, empty body.
            return status.into_response();
        }

        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            tracing::error!(error = %self, code, "request failed");
        } else {
            tracing::debug!(error = %self, code, "request rejected");
        }

        let body = ErrorBody {
            error: code_summary(code).to_string(),
            code,
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn code_summary(code: &str) -> &'static str {
    match code {
        "MissingField" => "a required field is empty",
        "MalformedPayload" => "the request payload could not be decoded",
        "StaleTime" => "transaction datetime is too old",
        "FutureTime" => "transaction datetime is in the future",
        "InvalidSignature" => "the signature does not verify",
        "IdentityUnverified" => "the identity could not be verified",
        "DuplicateInquiry" => "the inquiry is already recorded",
        "DuplicateInPool" => "the transaction is already pending",
        "UpstreamFailure" => "the verification service is unavailable",
        _ => "internal error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_error_status_mapping() {
        let cases = [
            (ChainError::MissingField("name".into()), 400),
            (ChainError::StaleTime, 400),
            (ChainError::FutureTime, 400),
            (ChainError::InvalidSignature, 400),
            (ChainError::DuplicateInquiry, 409),
            (ChainError::DuplicateInPool, 409),
            (ChainError::NotFound, 404),
            (ChainError::WorkInvalid, 500),
        ];
        for (err, status) in cases {
            let (got, _) = ApiError::Chain(err).status_and_code();
            assert_eq!(got.as_u16(), status);
        }
    }

    #[test]
    fn upstream_maps_to_502() {
        let (status, code) = ApiError::Upstream("timeout".into()).status_and_code();
        assert_eq!(status.as_u16(), 502);
        assert_eq!(code, "UpstreamFailure");
    }
}
