//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for tracing
//! - Build the outbound request from the inbound one
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Inbound headers are copied verbatim; only `Host` and `Referer` change
//! - The inbound body is moved, never buffered

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::error::ProxyError;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates UUID v4 request IDs for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Read the request ID assigned by the request-ID layer.
pub fn request_id<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Build the outbound request: same method, headers and body, new URI,
/// `Host` set to the upstream and `Referer` set to the client-facing origin.
pub fn build_outbound(
    inbound: Request<Body>,
    uri: Uri,
    upstream: &str,
    inbound_host: &str,
) -> Result<Request<Body>, ProxyError> {
    let (parts, body) = inbound.into_parts();

    let host = HeaderValue::from_str(upstream).map_err(|e| ProxyError::OutboundUri(e.to_string()))?;
    let scheme = uri.scheme_str().unwrap_or("https");
    let referer = HeaderValue::from_str(&format!("{scheme}://{inbound_host}"))
        .map_err(|e| ProxyError::OutboundUri(e.to_string()))?;

    let mut request = Request::new(body);
    *request.method_mut() = parts.method;
    *request.uri_mut() = uri;
    *request.headers_mut() = parts.headers;
    request.headers_mut().insert(header::HOST, host);
    request.headers_mut().insert(header::REFERER, referer);

    Ok(request)
}
