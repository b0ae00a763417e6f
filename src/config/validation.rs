//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that the upstream host and base path form a valid URL
//! - Check header names and listener addresses
//! - Check that body substitution patterns compile
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::uri::{Authority, PathAndQuery};
use axum::http::HeaderName;

use crate::config::schema::ProxyConfig;
use crate::proxy::body::Substitutions;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_host(&mut errors, "upstream.host", &config.upstream.host);
    if let Some(mobile) = &config.upstream.mobile_host {
        check_host(&mut errors, "upstream.mobile_host", mobile);
    }

    let path = &config.upstream.path;
    if !path.is_empty() && !path.starts_with('/') {
        errors.push(ValidationError::new("upstream.path", "must be empty or start with '/'"));
    } else if !path.is_empty() && PathAndQuery::from_str(path).is_err() {
        errors.push(ValidationError::new("upstream.path", "is not a valid URL path"));
    }

    for (field, name) in [
        ("context.region_header", &config.context.region_header),
        ("context.ip_header", &config.context.ip_header),
        ("context.user_agent_header", &config.context.user_agent_header),
    ] {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(field, "is not a valid header name"));
        }
    }

    for (i, replacement) in config.body_rewrite.replacements.iter().enumerate() {
        if replacement.search.is_empty() {
            errors.push(ValidationError::new(
                format!("body_rewrite.replacements[{i}].search"),
                "must not be empty",
            ));
        }
    }
    // Placeholders resolve per request; compile once against the configured
    // upstream to surface broken expressions at startup.
    if let Err(e) = Substitutions::resolve(
        &config.body_rewrite.replacements,
        config.body_rewrite.escape_patterns,
        &config.upstream.host,
        "localhost",
    ) {
        errors.push(ValidationError::new("body_rewrite.replacements", e.to_string()));
    }

    if config.body_rewrite.max_body_bytes == 0 {
        errors.push(ValidationError::new("body_rewrite.max_body_bytes", "must be greater than zero"));
    }

    if SocketAddr::from_str(&config.listener.bind_address).is_err() {
        errors.push(ValidationError::new("listener.bind_address", "is not a socket address"));
    }
    if config.observability.metrics_enabled
        && SocketAddr::from_str(&config.observability.metrics_address).is_err()
    {
        errors.push(ValidationError::new("observability.metrics_address", "is not a socket address"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_host(errors: &mut Vec<ValidationError>, field: &str, host: &str) {
    if host.is_empty() {
        errors.push(ValidationError::new(field, "must not be empty"));
    } else if host.contains('/') || host.contains('@') || Authority::from_str(host).is_err() {
        errors.push(ValidationError::new(field, "is not a valid hostname"));
    }
}
