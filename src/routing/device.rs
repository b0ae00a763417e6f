//! Device classification and upstream selection.
//!
//! The selector is keyed by device class so mobile clients can be sent to a
//! different upstream. With no `mobile_host` configured both classes resolve
//! to the same host.

use crate::config::UpstreamConfig;

/// User-agent substrings that mark a mobile client (case-sensitive).
const MOBILE_AGENTS: [&str; 6] = ["Android", "iPhone", "SymbianOS", "Windows Phone", "iPad", "iPod"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Mobile,
    Desktop,
}

impl DeviceClass {
    pub fn from_user_agent(user_agent: &str) -> Self {
        if MOBILE_AGENTS.iter().any(|agent| user_agent.contains(agent)) {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Desktop => "desktop",
        }
    }
}

/// Picks the upstream host for a device class.
#[derive(Debug, Clone)]
pub struct UpstreamSelector {
    desktop: String,
    mobile: String,
}

impl UpstreamSelector {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            desktop: config.host.clone(),
            mobile: config.mobile_host.clone().unwrap_or_else(|| config.host.clone()),
        }
    }

    pub fn select(&self, device: DeviceClass) -> &str {
        match device {
            DeviceClass::Mobile => &self.mobile,
            DeviceClass::Desktop => &self.desktop,
        }
    }
}
