//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router that sends every method and path to the proxy
//! - Wire up middleware (request ID, tracing)
//! - Extract the client context and call the proxy handler
//! - Turn handler errors into responses and record metrics
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{ContextConfig, ProxyConfig};
use crate::error::ProxyError;
use crate::http::client::{ReqwestUpstream, UpstreamClient, UpstreamError};
use crate::http::context::RequestContext;
use crate::http::request::{request_id, UuidRequestId};
use crate::observability::metrics;
use crate::proxy::ProxyHandler;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub handler: ProxyHandler,
    pub context: Arc<ContextConfig>,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server that forwards through a reqwest client.
    pub fn new(config: ProxyConfig) -> Result<Self, UpstreamError> {
        let client = ReqwestUpstream::new(&config.upstream)?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Create a server with a caller-supplied upstream client.
    pub fn with_client(config: ProxyConfig, client: Arc<dyn UpstreamClient>) -> Self {
        let state = AppState {
            handler: ProxyHandler::new(&config, client),
            context: Arc::new(config.context.clone()),
        };
        let router = Self::build_router(state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id(request),
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The router, for serving or for driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.host,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Ingress adapter: context extraction, proxying, error mapping.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let result = match RequestContext::from_headers(request.headers(), &state.context, peer) {
        Ok(ctx) => state.handler.handle(&ctx, request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => {
            metrics::record_request(&method, response.status().as_u16(), "proxied", start);
            response
        }
        Err(e) => {
            match &e {
                ProxyError::AccessDenied(_) => {}
                ProxyError::MissingContext(field) => {
                    tracing::warn!(field = *field, "Missing request context");
                }
                other => tracing::error!(error = %other, "Proxy request failed"),
            }
            metrics::record_request(&method, e.status().as_u16(), e.outcome(), start);
            e.into_response()
        }
    }
}
