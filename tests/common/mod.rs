//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body, Bytes};
use axum::http::{request, HeaderMap, Method, Response, StatusCode, Uri};
use axum::Router;
use futures_util::future::BoxFuture;
use tower::ServiceExt;

use workers_proxy::config::ProxyConfig;
use workers_proxy::http::{UpgradedIo, UpstreamClient, UpstreamError, UpstreamUpgrade};
use workers_proxy::HttpServer;

/// A request as the mock upstream received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

type Responder = dyn Fn() -> Result<Response<Body>, UpstreamError> + Send + Sync;

/// Upstream that records every request and answers with a programmed response.
pub struct MockUpstream {
    requests: Mutex<Vec<RecordedRequest>>,
    respond: Box<Responder>,
}

impl MockUpstream {
    pub fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn() -> Result<Response<Body>, UpstreamError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    /// Answer every request with `status`, `headers` and `body`.
    pub fn responding(
        status: u16,
        headers: &'static [(&'static str, &'static str)],
        body: &'static [u8],
    ) -> Arc<Self> {
        Self::new(move || {
            let mut builder = Response::builder().status(status);
            for (name, value) in headers {
                builder = builder.header(*name, *value);
            }
            Ok(builder.body(Body::from(body)).unwrap())
        })
    }

    pub fn ok() -> Arc<Self> {
        Self::responding(200, &[("content-type", "application/json")], b"{}")
    }

    /// Switch protocols on every request and echo whatever the client sends.
    pub fn upgrading() -> Arc<Self> {
        Self::new(|| {
            let (io, peer) = tokio::io::duplex(1024);
            tokio::spawn(async move {
                let (mut reader, mut writer) = tokio::io::split(peer);
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });

            let mut response = Response::builder()
                .status(101)
                .header("upgrade", "websocket")
                .header("connection", "Upgrade")
                .body(Body::empty())
                .unwrap();
            response.extensions_mut().insert(UpstreamUpgrade::new(Box::pin(async move {
                Ok::<Box<dyn UpgradedIo>, UpstreamError>(Box::new(io))
            })));
            Ok(response)
        })
    }

    pub fn failing(error: fn() -> UpstreamError) -> Arc<Self> {
        Self::new(move || Err(error()))
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last(&self) -> RecordedRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("upstream was not called")
    }
}

impl UpstreamClient for MockUpstream {
    fn send(
        &self,
        request: axum::http::Request<Body>,
    ) -> BoxFuture<'_, Result<Response<Body>, UpstreamError>> {
        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
            self.requests.lock().unwrap().push(RecordedRequest {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
            });
            (self.respond)()
        })
    }
}

/// Router wired to `upstream`.
pub fn proxy(config: ProxyConfig, upstream: Arc<MockUpstream>) -> Router {
    HttpServer::with_client(config, upstream).router()
}

const CLIENT_CONTEXT: [(&str, &str); 4] = [
    ("host", "proxy.example"),
    ("cf-ipcountry", "US"),
    ("cf-connecting-ip", "203.0.113.5"),
    ("user-agent", "Mozilla/5.0 (X11; Linux x86_64)"),
];

/// Inbound request from an unblocked desktop client in the US.
pub fn inbound(method: Method, uri: &str) -> request::Builder {
    inbound_with(method, uri, &[])
}

/// Like [`inbound`], with some headers replaced or added.
pub fn inbound_with(method: Method, uri: &str, headers: &[(&str, &str)]) -> request::Builder {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    for (name, value) in CLIENT_CONTEXT {
        if !headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)) {
            builder = builder.header(name, value);
        }
    }
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder
}

pub async fn send(router: Router, request: axum::http::Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = router.oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap();
    (parts.status, parts.headers, body)
}
