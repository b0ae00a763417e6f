//! Region and IP access policy.
//!
//! Checked before any upstream call. A region match wins over an IP match.

use std::collections::HashSet;

use crate::config::AccessConfig;
use crate::http::context::RequestContext;

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Region,
    Ip,
}

impl DenyReason {
    /// Fixed body returned to the client.
    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::Region => "Access denied: WorkersProxy is not available in your region yet.",
            DenyReason::Ip => "Access denied: Your IP address is blocked by WorkersProxy.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Region => "region",
            DenyReason::Ip => "ip",
        }
    }
}

/// Compiled deny lists.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    blocked_regions: HashSet<String>,
    blocked_ips: HashSet<String>,
}

impl AccessPolicy {
    pub fn from_config(config: &AccessConfig) -> Self {
        Self {
            blocked_regions: config
                .blocked_regions
                .iter()
                .map(|r| r.to_uppercase())
                .collect(),
            blocked_ips: config.blocked_ips.iter().cloned().collect(),
        }
    }

    /// Returns the reason to deny, if any.
    pub fn check(&self, ctx: &RequestContext) -> Option<DenyReason> {
        if let Some(region) = &ctx.region {
            if self.blocked_regions.contains(region) {
                return Some(DenyReason::Region);
            }
        }
        if self.blocked_ips.contains(&ctx.client_ip) {
            return Some(DenyReason::Ip);
        }
        None
    }
}
