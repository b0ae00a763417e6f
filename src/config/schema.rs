//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.
//! Defaults reproduce the stock deployment: forward everything to
//! `api.openai.com`, deny the loopback and unspecified addresses, and rewrite
//! upstream hostnames in HTML bodies to the client-facing hostname.

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream host, base path and client settings.
    pub upstream: UpstreamConfig,

    /// Region and IP deny lists.
    pub access: AccessConfig,

    /// Where the client context is read from.
    pub context: ContextConfig,

    /// Response header policy.
    pub response: ResponseConfig,

    /// Text substitutions applied to HTML bodies.
    pub body_rewrite: BodyRewriteConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Hostname every request is forwarded to.
    pub host: String,

    /// Hostname used for mobile clients. Falls back to `host`.
    pub mobile_host: Option<String>,

    /// Prefix concatenated in front of the inbound path.
    pub path: String,

    /// Collapse the duplicate `/` produced when `path` ends with `/`.
    /// Off by default: the outbound path is a literal concatenation.
    pub normalize_join: bool,

    /// Follow upstream redirects instead of returning them to the client.
    pub follow_redirects: bool,

    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Total upstream timeout in seconds. Unset means no timeout.
    pub timeout_secs: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "api.openai.com".to_string(),
            mobile_host: None,
            path: "/".to_string(),
            normalize_join: false,
            follow_redirects: true,
            connect_timeout_secs: 10,
            timeout_secs: None,
        }
    }
}

/// Access restrictions.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Region codes denied with 403 (compared case-insensitively).
    pub blocked_regions: Vec<String>,

    /// Client IP literals denied with 403 (exact match).
    pub blocked_ips: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            blocked_regions: Vec::new(),
            blocked_ips: vec!["0.0.0.0".to_string(), "127.0.0.1".to_string()],
        }
    }
}

/// Names of the headers the edge layer stores client context in.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContextConfig {
    pub region_header: String,
    pub ip_header: String,
    pub user_agent_header: String,

    /// Reject requests without a region header. When false, a missing
    /// region is treated as "not blocked".
    pub require_region: bool,

    /// Use the TCP peer address when the IP header is absent.
    pub peer_ip_fallback: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            region_header: "cf-ipcountry".to_string(),
            ip_header: "cf-connecting-ip".to_string(),
            user_agent_header: "user-agent".to_string(),
            require_region: true,
            peer_ip_fallback: false,
        }
    }
}

/// Response header policy.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Force `Cache-Control: no-store` on every rewritten response.
    pub disable_cache: bool,
}

/// A single search/replace pair. Both sides may contain the `$upstream`
/// and `$custom_domain` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Replacement {
    pub search: String,
    pub replace: String,
}

/// Body rewrite configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyRewriteConfig {
    /// Substitutions, applied in order.
    pub replacements: Vec<Replacement>,

    /// Treat search strings as literals instead of regular expressions.
    pub escape_patterns: bool,

    /// Largest body buffered for substitution, in bytes. Larger bodies pass
    /// through unchanged.
    pub max_body_bytes: usize,
}

impl Default for BodyRewriteConfig {
    fn default() -> Self {
        Self {
            replacements: vec![Replacement {
                search: "$upstream".to_string(),
                replace: "$custom_domain".to_string(),
            }],
            escape_patterns: false,
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
