//! End-to-end tests of the request pipeline through the axum router.

use axum::body::Body;
use axum::http::{Method, StatusCode};

use workers_proxy::config::ProxyConfig;
use workers_proxy::http::UpstreamError;

mod common;

use common::{inbound, inbound_with, proxy, send, MockUpstream};

const HTML: &[(&str, &str)] = &[
    ("content-type", "text/html; charset=UTF-8"),
    ("content-length", "999"),
];

#[tokio::test]
async fn test_scenario_models_listing() {
    let upstream = MockUpstream::ok();
    let mut config = ProxyConfig::default();
    config.upstream.normalize_join = true;

    let request = inbound(Method::GET, "https://proxy.example/v1/models")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(proxy(config, upstream.clone()), request).await;

    assert_eq!(status, StatusCode::OK);
    let seen = upstream.last();
    assert_eq!(seen.method, Method::GET);
    assert_eq!(seen.uri.to_string(), "https://api.openai.com/v1/models");
    assert_eq!(seen.headers["host"], "api.openai.com");
    assert_eq!(seen.headers["referer"], "https://proxy.example");
}

#[tokio::test]
async fn test_literal_path_concatenation() {
    let upstream = MockUpstream::ok();
    let request = inbound(Method::GET, "/foo/bar?x=1").body(Body::empty()).unwrap();
    send(proxy(ProxyConfig::default(), upstream.clone()), request).await;
    assert_eq!(upstream.last().uri.to_string(), "https://api.openai.com//foo/bar?x=1");

    let upstream = MockUpstream::ok();
    let mut config = ProxyConfig::default();
    config.upstream.path = "/mirror/".into();
    let request = inbound(Method::GET, "/foo/bar").body(Body::empty()).unwrap();
    send(proxy(config, upstream.clone()), request).await;
    assert_eq!(upstream.last().uri.path(), "/mirror//foo/bar");
}

#[tokio::test]
async fn test_root_path_is_base_path() {
    let upstream = MockUpstream::ok();
    let mut config = ProxyConfig::default();
    config.upstream.path = "/mirror/".into();

    let request = inbound(Method::GET, "/").body(Body::empty()).unwrap();
    send(proxy(config, upstream.clone()), request).await;

    assert_eq!(upstream.last().uri.path(), "/mirror/");
}

#[tokio::test]
async fn test_blocked_region_any_case() {
    let upstream = MockUpstream::ok();
    let mut config = ProxyConfig::default();
    config.access.blocked_regions = vec!["CN".into()];

    let request = inbound_with(Method::GET, "/", &[("cf-ipcountry", "cn")])
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(proxy(config, upstream.clone()), request).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(&body[..], b"Access denied: WorkersProxy is not available in your region yet.");
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_blocked_ip() {
    let upstream = MockUpstream::ok();
    let request = inbound_with(Method::GET, "/", &[("cf-connecting-ip", "127.0.0.1")])
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(proxy(ProxyConfig::default(), upstream.clone()), request).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(&body[..], b"Access denied: Your IP address is blocked by WorkersProxy.");
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_region_denial_wins_over_ip() {
    let upstream = MockUpstream::ok();
    let mut config = ProxyConfig::default();
    config.access.blocked_regions = vec!["US".into()];

    let request = inbound_with(Method::GET, "/", &[("cf-connecting-ip", "127.0.0.1")])
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(proxy(config, upstream.clone()), request).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.starts_with(b"Access denied: WorkersProxy is not available"));
}

#[tokio::test]
async fn test_missing_context_is_client_error() {
    let upstream = MockUpstream::ok();
    let request = axum::http::Request::builder()
        .uri("/")
        .header("host", "proxy.example")
        .header("cf-connecting-ip", "203.0.113.5")
        .header("user-agent", "curl/8.0")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(proxy(ProxyConfig::default(), upstream.clone()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_optional_region() {
    let upstream = MockUpstream::ok();
    let mut config = ProxyConfig::default();
    config.context.require_region = false;
    config.access.blocked_regions = vec!["US".into()];

    let request = axum::http::Request::builder()
        .uri("/")
        .header("host", "proxy.example")
        .header("cf-connecting-ip", "203.0.113.5")
        .header("user-agent", "curl/8.0")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(proxy(config, upstream.clone()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_method_headers_and_body_forwarded() {
    let upstream = MockUpstream::ok();
    let request = inbound(Method::POST, "/v1/chat/completions")
        .header("authorization", "Bearer sk-test")
        .header("referer", "https://elsewhere.example/")
        .body(Body::from(r#"{"model":"gpt-4o"}"#))
        .unwrap();
    send(proxy(ProxyConfig::default(), upstream.clone()), request).await;

    let seen = upstream.last();
    assert_eq!(seen.method, Method::POST);
    assert_eq!(&seen.body[..], br#"{"model":"gpt-4o"}"#);
    assert_eq!(seen.headers["authorization"], "Bearer sk-test");
    assert_eq!(seen.headers["referer"], "https://proxy.example");
    assert_eq!(seen.headers["cf-ipcountry"], "US");
}

#[tokio::test]
async fn test_websocket_upgrade_passthrough() {
    let upstream = MockUpstream::responding(
        101,
        &[
            ("upgrade", "websocket"),
            ("connection", "Upgrade"),
            ("content-type", "text/html; charset=UTF-8"),
            ("content-security-policy", "default-src 'self'"),
            ("clear-site-data", "\"cache\""),
        ],
        b"api.openai.com",
    );
    let request = inbound(Method::GET, "/socket")
        .header("upgrade", "WebSocket")
        .header("connection", "Upgrade")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(proxy(ProxyConfig::default(), upstream.clone()), request).await;

    assert_eq!(status, StatusCode::SWITCHING_PROTOCOLS);
    assert_eq!(headers["content-security-policy"], "default-src 'self'");
    assert_eq!(headers["clear-site-data"], "\"cache\"");
    assert!(!headers.contains_key("access-control-allow-origin"));
    assert_eq!(&body[..], b"api.openai.com");
}

#[tokio::test]
async fn test_security_headers_stripped_and_cors_added() {
    let upstream = MockUpstream::responding(
        404,
        &[
            ("content-type", "application/json"),
            ("content-security-policy", "default-src 'self'"),
            ("content-security-policy-report-only", "default-src 'self'"),
            ("clear-site-data", "\"*\""),
            ("cache-control", "max-age=60"),
        ],
        b"{}",
    );
    let request = inbound(Method::GET, "/missing").body(Body::empty()).unwrap();
    let (status, headers, _) = send(proxy(ProxyConfig::default(), upstream), request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!headers.contains_key("content-security-policy"));
    assert!(!headers.contains_key("content-security-policy-report-only"));
    assert!(!headers.contains_key("clear-site-data"));
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert_eq!(headers["cache-control"], "max-age=60");
}

#[tokio::test]
async fn test_disable_cache() {
    let upstream = MockUpstream::responding(200, &[("cache-control", "max-age=60")], b"");
    let mut config = ProxyConfig::default();
    config.response.disable_cache = true;

    let request = inbound(Method::GET, "/").body(Body::empty()).unwrap();
    let (_, headers, _) = send(proxy(config, upstream), request).await;

    assert_eq!(headers["cache-control"], "no-store");
}

#[tokio::test]
async fn test_pjax_header_points_at_proxy() {
    let upstream = MockUpstream::responding(
        200,
        &[("x-pjax-url", "https://api.openai.com/docs")],
        b"",
    );
    let request = inbound(Method::GET, "/docs").body(Body::empty()).unwrap();
    let (_, headers, _) = send(proxy(ProxyConfig::default(), upstream), request).await;

    assert_eq!(headers["x-pjax-url"], "https://proxy.example/docs");
}

#[tokio::test]
async fn test_html_body_hostnames_rewritten() {
    let upstream = MockUpstream::responding(
        200,
        HTML,
        br#"<script src="https://api.openai.com/app.js"></script><a href="//api.openai.com/">home</a>"#,
    );
    let request = inbound(Method::GET, "/").body(Body::empty()).unwrap();
    let (status, headers, body) = send(proxy(ProxyConfig::default(), upstream), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        r#"<script src="https://proxy.example/app.js"></script><a href="//proxy.example/">home</a>"#
    );
    assert_eq!(headers["content-length"], body.len().to_string());
}

#[tokio::test]
async fn test_html_over_rewrite_limit_passes_through() {
    const BODY: &[u8] = b"<p>https://api.openai.com/abc</p>";
    let upstream = MockUpstream::responding(200, &[("content-type", "text/html; charset=UTF-8")], BODY);
    let mut config = ProxyConfig::default();
    config.body_rewrite.max_body_bytes = 16;

    let request = inbound(Method::GET, "/").body(Body::empty()).unwrap();
    let (status, headers, body) = send(proxy(config, upstream), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], BODY);
    assert_eq!(headers["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_declared_length_over_rewrite_limit_passes_through() {
    let upstream = MockUpstream::responding(
        200,
        &[("content-type", "text/html; charset=UTF-8"), ("content-length", "4096")],
        b"api.openai.com",
    );
    let mut config = ProxyConfig::default();
    config.body_rewrite.max_body_bytes = 1024;

    let request = inbound(Method::GET, "/").body(Body::empty()).unwrap();
    let (status, _, body) = send(proxy(config, upstream), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"api.openai.com");
}

#[tokio::test]
async fn test_mixed_case_host_is_lowercased() {
    let upstream = MockUpstream::responding(200, HTML, b"//api.openai.com/");
    let request = inbound_with(Method::GET, "/", &[("host", "Proxy.Example:8443")])
        .body(Body::empty())
        .unwrap();
    let (_, _, body) = send(proxy(ProxyConfig::default(), upstream.clone()), request).await;

    assert_eq!(upstream.last().headers["referer"], "https://proxy.example");
    assert_eq!(&body[..], b"//proxy.example/");
}

#[tokio::test]
async fn test_html_without_utf8_charset_untouched() {
    let upstream = MockUpstream::responding(
        200,
        &[("content-type", "text/html; charset=utf-8")],
        b"api.openai.com",
    );
    let request = inbound(Method::GET, "/").body(Body::empty()).unwrap();
    let (_, _, body) = send(proxy(ProxyConfig::default(), upstream), request).await;

    assert_eq!(&body[..], b"api.openai.com");
}

#[tokio::test]
async fn test_binary_body_passthrough() {
    const BYTES: &[u8] = b"\x00\xffapi.openai.com\xfe\x01";
    let upstream = MockUpstream::responding(
        200,
        &[("content-type", "application/octet-stream")],
        BYTES,
    );
    let request = inbound(Method::GET, "/file.bin").body(Body::empty()).unwrap();
    let (_, _, body) = send(proxy(ProxyConfig::default(), upstream), request).await;

    assert_eq!(&body[..], BYTES);
}

#[tokio::test]
async fn test_undecodable_html_returns_original_bytes() {
    const BYTES: &[u8] = b"<p>api.openai.com \xff\xfe</p>";
    let upstream = MockUpstream::responding(200, HTML, BYTES);
    let request = inbound(Method::GET, "/").body(Body::empty()).unwrap();
    let (status, _, body) = send(proxy(ProxyConfig::default(), upstream), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], BYTES);
}

#[tokio::test]
async fn test_upstream_unreachable_is_bad_gateway() {
    let upstream = MockUpstream::failing(|| UpstreamError::Unreachable("connection refused".into()));
    let request = inbound(Method::GET, "/").body(Body::empty()).unwrap();
    let (status, _, _) = send(proxy(ProxyConfig::default(), upstream.clone()), request).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_upstream_timeout_is_gateway_timeout() {
    let upstream = MockUpstream::failing(|| UpstreamError::Timeout("deadline elapsed".into()));
    let request = inbound(Method::GET, "/").body(Body::empty()).unwrap();
    let (status, _, _) = send(proxy(ProxyConfig::default(), upstream), request).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_mobile_clients_use_mobile_host() {
    let upstream = MockUpstream::responding(200, HTML, b"m.example.com");
    let mut config = ProxyConfig::default();
    config.upstream.host = "www.example.com".into();
    config.upstream.mobile_host = Some("m.example.com".into());

    let request = inbound_with(
        Method::GET,
        "/",
        &[("user-agent", "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)")],
    )
    .body(Body::empty())
    .unwrap();
    let (_, _, body) = send(proxy(config, upstream.clone()), request).await;

    let seen = upstream.last();
    assert_eq!(seen.uri.host(), Some("m.example.com"));
    assert_eq!(seen.headers["host"], "m.example.com");
    assert_eq!(&body[..], b"proxy.example");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let upstream = MockUpstream::ok();
    let request = inbound(Method::GET, "/").body(Body::empty()).unwrap();
    let (_, headers, _) = send(proxy(ProxyConfig::default(), upstream.clone()), request).await;

    let id = headers["x-request-id"].to_str().unwrap();
    assert_eq!(id.len(), 36);
    assert_eq!(upstream.last().headers["x-request-id"], id);
}
