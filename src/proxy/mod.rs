//! Request-handling pipeline.
//!
//! # Data Flow
//! ```text
//! RequestContext + inbound request
//!     → handler.rs (select upstream, rewrite URL, check access, dispatch)
//!     → body.rs (text substitution for UTF-8 HTML)
//!     → outbound response
//! ```

pub mod body;
pub mod handler;

pub use handler::ProxyHandler;
