//! Error types for request handling.
//!
//! Every error stays inside the request that produced it and is turned into
//! a client response here. Nothing is retried.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::client::UpstreamError;
use crate::security::access_control::DenyReason;

/// Failure while handling a single proxied request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The edge layer did not supply a required client-context value.
    #[error("Missing request context: {0}")]
    MissingContext(&'static str),

    /// Region or IP policy match.
    #[error("{}", .0.message())]
    AccessDenied(DenyReason),

    /// The outbound call failed.
    #[error("Upstream request failed: {0}")]
    UpstreamUnavailable(#[from] UpstreamError),

    /// The upstream body could not be buffered for substitution.
    #[error("Failed to read upstream body: {0}")]
    BodyRead(String),

    /// The rewritten URL is not a valid URI.
    #[error("Invalid outbound URI: {0}")]
    OutboundUri(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingContext(_) => StatusCode::BAD_REQUEST,
            ProxyError::AccessDenied(_) => StatusCode::FORBIDDEN,
            ProxyError::UpstreamUnavailable(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UpstreamUnavailable(_) | ProxyError::BodyRead(_) => StatusCode::BAD_GATEWAY,
            ProxyError::OutboundUri(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            ProxyError::MissingContext(_) => "missing_context",
            ProxyError::AccessDenied(_) => "denied",
            ProxyError::UpstreamUnavailable(_) => "upstream_error",
            ProxyError::BodyRead(_) => "body_error",
            ProxyError::OutboundUri(_) => "bad_uri",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ProxyError::AccessDenied(reason) => reason.message().to_string(),
            ProxyError::UpstreamUnavailable(_) | ProxyError::BodyRead(_) => {
                "Upstream request failed".to_string()
            }
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}

/// The body could not be decoded as UTF-8 text. Callers fall back to the
/// original bytes.
#[derive(Debug, Error)]
#[error("Response body is not valid UTF-8: {0}")]
pub struct BodyDecodeError(#[from] pub std::str::Utf8Error);
