//! Single-upstream HTTP reverse proxy library.
//!
//! Every inbound request is checked against region/IP deny lists, forwarded
//! to one fixed upstream over HTTPS, and its response has headers rewritten
//! and, for UTF-8 HTML, hostnames substituted in the body.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::ProxyHandler;
