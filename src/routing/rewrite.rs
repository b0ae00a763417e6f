//! Outbound URL rewriting.
//!
//! # Rules
//! - Scheme is always `https`
//! - Host is the selected upstream host
//! - Inbound path `/` becomes the base path verbatim
//! - Any other path is `base + inbound`, concatenated without inserting or
//!   removing a separator (unless `normalize_join` is set)
//! - Query string is carried over unchanged

use std::str::FromStr;

use axum::http::uri::{Authority, Scheme};
use axum::http::{header, HeaderMap, Uri};

use crate::config::UpstreamConfig;
use crate::error::ProxyError;

/// Compiled path rewrite settings.
#[derive(Debug, Clone)]
pub struct PathRewrite {
    base: String,
    normalize_join: bool,
}

impl PathRewrite {
    pub fn new(base: impl Into<String>, normalize_join: bool) -> Self {
        Self {
            base: base.into(),
            normalize_join,
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(config.path.clone(), config.normalize_join)
    }

    /// Outbound path for an inbound path.
    pub fn outbound_path(&self, inbound: &str) -> String {
        if inbound == "/" {
            return self.base.clone();
        }
        match inbound.strip_prefix('/') {
            Some(rest) if self.normalize_join && self.base.ends_with('/') => {
                format!("{}{}", self.base, rest)
            }
            _ => format!("{}{}", self.base, inbound),
        }
    }

    /// Full outbound URI for an inbound URI.
    pub fn outbound_uri(&self, upstream: &str, inbound: &Uri) -> Result<Uri, ProxyError> {
        let mut path_and_query = self.outbound_path(inbound.path());
        if path_and_query.is_empty() {
            path_and_query.push('/');
        }
        if let Some(query) = inbound.query() {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }

        Uri::builder()
            .scheme(Scheme::HTTPS)
            .authority(upstream)
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| ProxyError::OutboundUri(e.to_string()))
    }
}

/// Hostname the client addressed, lowercased and without port.
///
/// Taken from the absolute request URI when present, otherwise from the
/// `Host` header.
pub fn inbound_hostname(uri: &Uri, headers: &HeaderMap) -> Option<String> {
    if let Some(host) = uri.host() {
        return Some(host.to_ascii_lowercase());
    }
    let value = headers.get(header::HOST)?.to_str().ok()?;
    Authority::from_str(value)
        .ok()
        .map(|authority| authority.host().to_ascii_lowercase())
}
