//! The proxy handler.
//!
//! One call handles one inbound request:
//!
//! ```text
//! Start → AccessCheck ─┬─ Denied (403, no upstream call)
//!                      └─ Dispatch ─┬─ UpgradePassthrough (response untouched, bytes relayed)
//!                                   └─ RewriteAndReturn (headers + optional body)
//! ```
//!
//! HTML bodies larger than `max_body_bytes` are returned without substitution.
//!
//! The handler holds only immutable settings compiled from [`ProxyConfig`],
//! so concurrent calls share nothing mutable.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, Response};
use hyper::upgrade::OnUpgrade;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::client::UpstreamClient;
use crate::http::context::RequestContext;
use crate::http::request::build_outbound;
use crate::http::response::HeaderRewrite;
use crate::http::websocket::{self, is_websocket_upgrade, UpstreamUpgrade};
use crate::observability::metrics;
use crate::proxy::body::{buffer_body, is_rewritable, BodyRewriter, Buffered};
use crate::routing::device::{DeviceClass, UpstreamSelector};
use crate::routing::rewrite::{inbound_hostname, PathRewrite};
use crate::security::access_control::AccessPolicy;

struct Settings {
    selector: UpstreamSelector,
    paths: PathRewrite,
    policy: AccessPolicy,
    headers: HeaderRewrite,
    body: BodyRewriter,
}

/// Forwards requests to the configured upstream.
#[derive(Clone)]
pub struct ProxyHandler {
    settings: Arc<Settings>,
    client: Arc<dyn UpstreamClient>,
}

impl ProxyHandler {
    pub fn new(config: &ProxyConfig, client: Arc<dyn UpstreamClient>) -> Self {
        let settings = Settings {
            selector: UpstreamSelector::from_config(&config.upstream),
            paths: PathRewrite::from_config(&config.upstream),
            policy: AccessPolicy::from_config(&config.access),
            headers: HeaderRewrite {
                disable_cache: config.response.disable_cache,
            },
            body: BodyRewriter::from_config(&config.body_rewrite, &config.upstream),
        };
        Self {
            settings: Arc::new(settings),
            client,
        }
    }

    /// Handle one inbound request.
    pub async fn handle(
        &self,
        ctx: &RequestContext,
        mut request: Request<Body>,
    ) -> Result<Response<Body>, ProxyError> {
        let settings = &*self.settings;

        let device = DeviceClass::from_user_agent(&ctx.user_agent);
        let upstream = settings.selector.select(device);

        let inbound_host = inbound_hostname(request.uri(), request.headers())
            .ok_or(ProxyError::MissingContext("host"))?;
        let uri = settings.paths.outbound_uri(upstream, request.uri())?;

        if let Some(reason) = settings.policy.check(ctx) {
            tracing::debug!(
                reason = reason.as_str(),
                region = ?ctx.region,
                client_ip = %ctx.client_ip,
                "Access denied"
            );
            metrics::record_denied(reason);
            return Err(ProxyError::AccessDenied(reason));
        }

        let upgrade = is_websocket_upgrade(request.headers());
        let client_upgrade = if upgrade {
            request.extensions_mut().remove::<OnUpgrade>()
        } else {
            None
        };
        let outbound = build_outbound(request, uri, upstream, &inbound_host)?;

        tracing::debug!(
            method = %outbound.method(),
            uri = %outbound.uri(),
            device = device.as_str(),
            upgrade,
            "Forwarding to upstream"
        );

        let mut response = self.client.send(outbound).await?;

        if upgrade {
            let upstream_upgrade = response
                .extensions_mut()
                .remove::<UpstreamUpgrade>()
                .and_then(|u| u.take());
            match (client_upgrade, upstream_upgrade) {
                (Some(client), Some(pending)) => websocket::spawn_relay(client, pending),
                _ => tracing::debug!(
                    status = %response.status(),
                    "Upgrade not switched, returning upstream response"
                ),
            }
            return Ok(response);
        }

        let (mut parts, body) = response.into_parts();
        settings.headers.apply(&mut parts.headers, upstream, &inbound_host);

        let content_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        if !is_rewritable(content_type) {
            return Ok(Response::from_parts(parts, body));
        }

        let limit = settings.body.max_body_bytes();
        if declared_length(&parts.headers).is_some_and(|len| len > limit as u64) {
            tracing::debug!(limit, "Body larger than rewrite limit, returning original body");
            metrics::record_body_rewrite("too_large");
            return Ok(Response::from_parts(parts, body));
        }

        let bytes = match buffer_body(body, limit)
            .await
            .map_err(|e| ProxyError::BodyRead(e.to_string()))?
        {
            Buffered::Complete(bytes) => bytes,
            Buffered::Oversized(body) => {
                tracing::debug!(limit, "Body larger than rewrite limit, returning original body");
                metrics::record_body_rewrite("too_large");
                return Ok(Response::from_parts(parts, body));
            }
        };

        let body = match settings.body.rewrite(&bytes, upstream, &inbound_host) {
            Ok(text) => {
                metrics::record_body_rewrite("rewritten");
                parts.headers.remove(header::CONTENT_LENGTH);
                Body::from(text)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Body substitution skipped, returning original body");
                metrics::record_body_rewrite(e.as_str());
                Body::from(bytes)
            }
        };

        Ok(Response::from_parts(parts, body))
    }
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}
