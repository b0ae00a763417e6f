//! Response header rewriting.
//!
//! # Responsibilities
//! - Open the response to cross-origin readers
//! - Strip headers that would break the proxied page (CSP, Clear-Site-Data)
//! - Optionally force `Cache-Control: no-store`
//! - Point `x-pjax-url` back at the proxy hostname
//!
//! Upgrade responses never reach this module.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

const X_PJAX_URL: HeaderName = HeaderName::from_static("x-pjax-url");

const STRIPPED: [HeaderName; 3] = [
    header::CONTENT_SECURITY_POLICY,
    header::CONTENT_SECURITY_POLICY_REPORT_ONLY,
    HeaderName::from_static("clear-site-data"),
];

/// Response header policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderRewrite {
    pub disable_cache: bool,
}

impl HeaderRewrite {
    pub fn apply(&self, headers: &mut HeaderMap, upstream: &str, inbound_host: &str) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        for name in &STRIPPED {
            headers.remove(name);
        }
        if self.disable_cache {
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        }

        let pjax = headers
            .get(&X_PJAX_URL)
            .and_then(|v| v.to_str().ok())
            .map(|url| url.replace(&format!("//{upstream}"), &format!("//{inbound_host}")));
        if let Some(url) = pjax {
            match HeaderValue::from_str(&url) {
                Ok(value) => {
                    headers.insert(X_PJAX_URL, value);
                }
                Err(e) => tracing::warn!(error = %e, "Leaving x-pjax-url unchanged"),
            }
        }
    }
}
