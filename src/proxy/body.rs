//! Response body text substitution.
//!
//! Only `text/html` bodies declared as `UTF-8` are touched. Search strings
//! are regular expressions unless `escape_patterns` is set, so a `.` in a
//! hostname matches any character. Replacement text is inserted literally.
//!
//! Patterns are compiled once per configured upstream host. A search string
//! that mentions `$custom_domain` depends on the inbound host and is
//! compiled per request.

use std::borrow::Cow;

use axum::body::{Body, Bytes};
use futures_util::{stream, StreamExt};
use regex::{NoExpand, Regex};
use thiserror::Error;

use crate::config::{BodyRewriteConfig, Replacement, UpstreamConfig};
use crate::error::BodyDecodeError;

const UPSTREAM_PLACEHOLDER: &str = "$upstream";
const CUSTOM_DOMAIN_PLACEHOLDER: &str = "$custom_domain";

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error(transparent)]
    Decode(#[from] BodyDecodeError),

    #[error("Invalid substitution pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl RewriteError {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewriteError::Decode(_) => "decode_failed",
            RewriteError::Pattern(_) => "pattern_failed",
        }
    }
}

/// Substitute the placeholders in a configured string.
pub fn resolve_placeholders(value: &str, upstream: &str, custom_domain: &str) -> String {
    value
        .replace(UPSTREAM_PLACEHOLDER, upstream)
        .replace(CUSTOM_DOMAIN_PLACEHOLDER, custom_domain)
}

/// True when the response should have its body rewritten.
pub fn is_rewritable(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.contains("text/html") && ct.contains("UTF-8"))
}

fn compile_search(search: &str, escape_patterns: bool) -> Result<Regex, regex::Error> {
    if escape_patterns {
        Regex::new(&regex::escape(search))
    } else {
        Regex::new(search)
    }
}

/// Replacement pairs resolved for one request.
#[derive(Debug)]
pub struct Substitutions<'a> {
    pairs: Vec<(Cow<'a, Regex>, String)>,
}

impl Substitutions<'static> {
    /// Resolve and compile every rule for one upstream and inbound host.
    pub fn resolve(
        rules: &[Replacement],
        escape_patterns: bool,
        upstream: &str,
        custom_domain: &str,
    ) -> Result<Self, regex::Error> {
        let pairs = rules
            .iter()
            .map(|rule| {
                let search = resolve_placeholders(&rule.search, upstream, custom_domain);
                let replace = resolve_placeholders(&rule.replace, upstream, custom_domain);
                Ok((Cow::Owned(compile_search(&search, escape_patterns)?), replace))
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { pairs })
    }
}

impl Substitutions<'_> {
    /// Apply every pair, in order, to every match.
    pub fn apply(&self, text: &str) -> String {
        let mut text = text.to_string();
        for (pattern, replace) in &self.pairs {
            let replaced = pattern.replace_all(&text, NoExpand(replace)).into_owned();
            text = replaced;
        }
        text
    }
}

/// Search patterns compiled for one upstream host, in rule order.
/// `None` marks a pattern that depends on the inbound host.
#[derive(Debug, Clone)]
struct HostPatterns {
    upstream: String,
    patterns: Vec<Option<Regex>>,
}

impl HostPatterns {
    fn compile(rules: &[Replacement], escape_patterns: bool, upstream: &str) -> Self {
        let patterns = rules
            .iter()
            .map(|rule| {
                if rule.search.contains(CUSTOM_DOMAIN_PLACEHOLDER) {
                    return None;
                }
                let search = rule.search.replace(UPSTREAM_PLACEHOLDER, upstream);
                compile_search(&search, escape_patterns).ok()
            })
            .collect();
        Self {
            upstream: upstream.to_string(),
            patterns,
        }
    }
}

/// Outcome of reading a body up to the rewrite cap.
pub enum Buffered {
    /// The whole body fit.
    Complete(Bytes),
    /// The cap was exceeded; the body is intact, read prefix included.
    Oversized(Body),
}

/// Read `body` into memory unless it grows past `limit` bytes.
///
/// Fails only when the body stream itself fails.
pub async fn buffer_body(body: Body, limit: usize) -> Result<Buffered, axum::Error> {
    let mut rest = body.into_data_stream();
    let mut buf = Vec::new();

    while let Some(chunk) = rest.next().await {
        let chunk = chunk?;
        buf.extend_from_slice(&chunk);
        if buf.len() > limit {
            let prefix = stream::once(async move { Ok::<_, axum::Error>(Bytes::from(buf)) });
            return Ok(Buffered::Oversized(Body::from_stream(prefix.chain(rest))));
        }
    }

    Ok(Buffered::Complete(Bytes::from(buf)))
}

/// Configured body rewriter.
#[derive(Debug, Clone)]
pub struct BodyRewriter {
    rules: Vec<Replacement>,
    escape_patterns: bool,
    max_body_bytes: usize,
    compiled: Vec<HostPatterns>,
}

impl BodyRewriter {
    pub fn from_config(config: &BodyRewriteConfig, upstream: &UpstreamConfig) -> Self {
        let hosts = std::iter::once(upstream.host.as_str()).chain(upstream.mobile_host.as_deref());
        let compiled = hosts
            .map(|host| HostPatterns::compile(&config.replacements, config.escape_patterns, host))
            .collect();
        Self {
            rules: config.replacements.clone(),
            escape_patterns: config.escape_patterns,
            max_body_bytes: config.max_body_bytes,
            compiled,
        }
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    fn substitutions(
        &self,
        upstream: &str,
        custom_domain: &str,
    ) -> Result<Substitutions<'_>, regex::Error> {
        let Some(host) = self.compiled.iter().find(|h| h.upstream == upstream) else {
            return Substitutions::resolve(&self.rules, self.escape_patterns, upstream, custom_domain);
        };

        let pairs = self
            .rules
            .iter()
            .zip(&host.patterns)
            .map(|(rule, pattern)| {
                let pattern = match pattern {
                    Some(regex) => Cow::Borrowed(regex),
                    None => {
                        let search = resolve_placeholders(&rule.search, upstream, custom_domain);
                        Cow::Owned(compile_search(&search, self.escape_patterns)?)
                    }
                };
                let replace = resolve_placeholders(&rule.replace, upstream, custom_domain);
                Ok((pattern, replace))
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Substitutions { pairs })
    }

    /// Decode `body` as UTF-8 and apply the substitutions.
    pub fn rewrite(
        &self,
        body: &[u8],
        upstream: &str,
        custom_domain: &str,
    ) -> Result<String, RewriteError> {
        let text = std::str::from_utf8(body).map_err(BodyDecodeError::from)?;
        let substitutions = self.substitutions(upstream, custom_domain)?;
        Ok(substitutions.apply(text))
    }
}
