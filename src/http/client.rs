//! Upstream HTTP client.
//!
//! # Responsibilities
//! - Issue exactly one outbound request per call (no retries, no pooling
//!   guarantees)
//! - Stream request and response bodies
//! - Negotiate and decode gzip, brotli and deflate responses
//! - Hand switched connections back through [`UpstreamUpgrade`]
//! - Classify transport failures as timeout or unreachable
//!
//! The [`UpstreamClient`] trait is the seam between the handler and the
//! network; production uses reqwest.

use std::time::Duration;

use axum::body::{Body, HttpBody};
use axum::http::{header, Request, Response, StatusCode};
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::http::websocket::{is_websocket_upgrade, UpgradedIo, UpstreamUpgrade};

/// Outbound call failure.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream timed out: {0}")]
    Timeout(String),

    #[error("upstream unreachable: {0}")]
    Unreachable(String),
}

impl UpstreamError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, UpstreamError::Timeout(_))
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout(e.to_string())
        } else {
            UpstreamError::Unreachable(e.to_string())
        }
    }
}

/// Sends a fully built outbound request to the upstream.
pub trait UpstreamClient: Send + Sync {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, UpstreamError>>;
}

/// reqwest-backed upstream client.
#[derive(Debug, Clone)]
pub struct ReqwestUpstream {
    client: reqwest::Client,
    /// HTTP/1.1 only; upgrades cannot run over HTTP/2.
    upgrade_client: reqwest::Client,
}

impl ReqwestUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: Self::builder(config).build()?,
            upgrade_client: Self::builder(config).http1_only().build()?,
        })
    }

    fn builder(config: &UpstreamConfig) -> reqwest::ClientBuilder {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::default()
        } else {
            reqwest::redirect::Policy::none()
        };

        let builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(redirect);
        match config.timeout_secs {
            Some(secs) => builder.timeout(Duration::from_secs(secs)),
            None => builder,
        }
    }

    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, UpstreamError> {
        let (mut parts, body) = request.into_parts();
        let upgrade = is_websocket_upgrade(&parts.headers);
        // reqwest advertises only the encodings it can decode.
        parts.headers.remove(header::ACCEPT_ENCODING);

        let client = if upgrade { &self.upgrade_client } else { &self.client };
        let mut outbound = client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers);
        // An empty inbound body is sent as no body at all.
        if body.size_hint().exact() != Some(0) {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = outbound.send().await?;

        let mut response = Response::builder()
            .status(upstream.status())
            .body(Body::empty())
            .map_err(|e| UpstreamError::Unreachable(e.to_string()))?;
        *response.headers_mut() = upstream.headers().clone();

        if upgrade && upstream.status() == StatusCode::SWITCHING_PROTOCOLS {
            let pending = Box::pin(async move {
                let io = upstream.upgrade().await?;
                Ok::<Box<dyn UpgradedIo>, UpstreamError>(Box::new(io))
            });
            response.extensions_mut().insert(UpstreamUpgrade::new(pending));
        } else {
            *response.body_mut() = Body::from_stream(upstream.bytes_stream());
        }

        Ok(response)
    }
}

impl UpstreamClient for ReqwestUpstream {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, UpstreamError>> {
        Box::pin(self.forward(request))
    }
}
