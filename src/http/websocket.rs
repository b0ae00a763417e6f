//! WebSocket upgrade handling.
//!
//! # Responsibilities
//! - Detect WebSocket upgrade requests
//! - Carry the upstream's switched connection out of the client
//! - Splice the client connection to the upstream once both have switched
//!
//! # Data Flow
//! ```text
//! Client ←──── raw bytes ────→ Proxy ←──── raw bytes ────→ Upstream
//! ```
//!
//! # Design Decisions
//! - The upstream's 101 response is returned exactly as sent; no header or
//!   body rewriting applies
//! - Byte-level relay; frames are never parsed

use std::sync::{Arc, Mutex};

use axum::http::{header, HeaderMap};
use futures_util::future::BoxFuture;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::http::client::UpstreamError;

/// Duplex byte stream left over after a protocol switch.
pub trait UpgradedIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> UpgradedIo for T {}

pub type UpgradeFuture = BoxFuture<'static, Result<Box<dyn UpgradedIo>, UpstreamError>>;

/// Upstream side of a switched connection.
///
/// Inserted into the extensions of a `101 Switching Protocols` response by
/// the upstream client. The future can be taken once.
#[derive(Clone)]
pub struct UpstreamUpgrade(Arc<Mutex<Option<UpgradeFuture>>>);

impl UpstreamUpgrade {
    pub fn new(pending: UpgradeFuture) -> Self {
        Self(Arc::new(Mutex::new(Some(pending))))
    }

    pub fn take(&self) -> Option<UpgradeFuture> {
        self.0.lock().ok()?.take()
    }
}

/// True when the request asks for a WebSocket upgrade.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Relay bytes between the client and the upstream in the background.
///
/// Runs after the 101 response has been written to the client.
pub fn spawn_relay(client: OnUpgrade, upstream: UpgradeFuture) {
    tokio::spawn(async move {
        let client = match client.await {
            Ok(upgraded) => upgraded,
            Err(e) => {
                tracing::warn!(error = %e, "Client connection upgrade failed");
                return;
            }
        };
        let mut upstream = match upstream.await {
            Ok(io) => io,
            Err(e) => {
                tracing::warn!(error = %e, "Upstream connection upgrade failed");
                return;
            }
        };

        let mut client = TokioIo::new(client);
        match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
            Ok((to_upstream, to_client)) => {
                tracing::debug!(to_upstream, to_client, "Upgraded connection closed");
            }
            Err(e) => {
                tracing::debug!(error = %e, "Upgraded connection ended");
            }
        }
    });
}
