//! Client context supplied by the edge layer.
//!
//! The edge (CDN, load balancer) terminates the client connection and
//! records the client's region, IP and user agent in request headers. The
//! header names are configurable; the handler only ever sees the parsed
//! [`RequestContext`].

use std::net::IpAddr;

use axum::http::HeaderMap;

use crate::config::ContextConfig;
use crate::error::ProxyError;

/// Per-request client context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Upper-cased region code. `None` only when the region is optional.
    pub region: Option<String>,
    pub client_ip: String,
    pub user_agent: String,
}

impl RequestContext {
    pub fn new(
        region: Option<String>,
        client_ip: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            region: region.map(|r| r.to_uppercase()),
            client_ip: client_ip.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Read the context from request headers.
    ///
    /// `peer` is the TCP peer address, used for the client IP only when
    /// `peer_ip_fallback` is enabled.
    pub fn from_headers(
        headers: &HeaderMap,
        config: &ContextConfig,
        peer: Option<IpAddr>,
    ) -> Result<Self, ProxyError> {
        let region = header_str(headers, &config.region_header);
        if region.is_none() && config.require_region {
            return Err(ProxyError::MissingContext("region"));
        }

        let client_ip = match header_str(headers, &config.ip_header) {
            Some(ip) => ip.to_string(),
            None => match peer {
                Some(addr) if config.peer_ip_fallback => addr.to_string(),
                _ => return Err(ProxyError::MissingContext("client ip")),
            },
        };

        let user_agent = header_str(headers, &config.user_agent_header)
            .ok_or(ProxyError::MissingContext("user agent"))?;

        Ok(Self::new(region.map(str::to_string), client_ip, user_agent))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
