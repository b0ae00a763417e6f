//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → context.rs (client region / IP / user agent)
//!     → [proxy handler: access check, URL rewrite]
//!     → request.rs (outbound request) → client.rs (upstream call)
//!     → websocket.rs (upgrade relay) or response.rs (header rewrite)
//!     → Send to client
//! ```

pub mod client;
pub mod context;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use client::{ReqwestUpstream, UpstreamClient, UpstreamError};
pub use context::RequestContext;
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
pub use websocket::{UpgradedIo, UpstreamUpgrade};
