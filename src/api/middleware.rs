//! Admin API guard layers
//!
//! Everything under `/reputation` exposes raw scores and policy thresholds,
//! so the whole tree sits behind an admin key. Only [`PUBLIC_PATHS`] are
//! served without one.

use axum::{
    extract::{ConnectInfo, DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use subtle::{Choice, ConstantTimeEq};
use tracing::{error, info, warn};

use crate::policy::client_ip;

/// Exact paths served without an admin key
pub const PUBLIC_PATHS: &[&str] = &["/health"];

/// Settings for the admin API guard layers
#[derive(Debug, Clone)]
pub struct SecurityMiddlewareConfig {
    pub enable_auth: bool,
    /// Accepted admin keys
    pub api_keys: Vec<String>,
    /// Upper bound on a request body, in bytes
    pub max_request_size: usize,
    pub log_requests: bool,
    /// Mask client addresses in request logs
    pub sanitize_logs: bool,
}

impl Default for SecurityMiddlewareConfig {
    fn default() -> Self {
        Self {
            enable_auth: true,
            api_keys: Vec::new(),
            max_request_size: 64 * 1024,
            log_requests: true,
            sanitize_logs: true,
        }
    }
}

#[derive(Clone)]
pub struct SecurityState {
    pub config: Arc<SecurityMiddlewareConfig>,
}

impl SecurityState {
    pub fn new(config: SecurityMiddlewareConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Limit applied while extractors buffer the body, so it holds for
    /// chunked requests that never declare a length.
    pub fn body_limit(&self) -> DefaultBodyLimit {
        DefaultBodyLimit::max(self.config.max_request_size)
    }

    /// Compare against every configured key without stopping at the first
    /// match.
    fn accepts(&self, presented: &str) -> bool {
        self.config
            .api_keys
            .iter()
            .fold(Choice::from(0), |found, key| {
                found | key.as_bytes().ct_eq(presented.as_bytes())
            })
            .into()
    }
}

/// Admin key from `x-api-key`, or from `Authorization: Bearer <key>`
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get("x-api-key") {
        return key.to_str().ok();
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Mask the host part of a client address: the last IPv4 octet, or
/// everything past the /48 of an IPv6 address.
pub fn mask_address(address: &str) -> String {
    match address.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            let [a, b, c, _] = v4.octets();
            format!("{}.{}.{}.x", a, b, c)
        }
        Ok(IpAddr::V6(v6)) => {
            let s = v6.segments();
            format!("{:x}:{:x}:{:x}::x", s[0], s[1], s[2])
        }
        Err(_) => "*".repeat(address.len()),
    }
}

/// Reject admin requests without a valid key
pub async fn auth_middleware(
    State(state): State<SecurityState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !state.config.enable_auth || PUBLIC_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let authorized = presented_key(request.headers()).map(|key| state.accepts(key));

    match authorized {
        Some(true) => Ok(next.run(request).await),
        Some(false) => {
            warn!(path = %request.uri().path(), "Rejected admin request: unknown API key");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            warn!(path = %request.uri().path(), "Rejected admin request: no API key");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Refuse a declared oversized body before any handler runs. Bodies that
/// declare no length are capped by [`SecurityState::body_limit`].
pub async fn body_size_middleware(
    State(state): State<SecurityState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    match declared {
        Some(length) if length > state.config.max_request_size => {
            warn!(
                length,
                max = state.config.max_request_size,
                "Rejected oversized request body"
            );
            Err(StatusCode::PAYLOAD_TOO_LARGE)
        }
        _ => Ok(next.run(request).await),
    }
}

/// Responses carry scores and thresholds: no framing, sniffing or caching
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let pinned = [
        (header::X_FRAME_OPTIONS, "DENY"),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::REFERRER_POLICY, "no-referrer"),
        (header::CACHE_CONTROL, "no-store"),
    ];
    let headers = response.headers_mut();
    for (name, value) in pinned {
        headers.insert(name, HeaderValue::from_static(value));
    }

    response
}

/// One log line per admin request, client address masked on demand
pub async fn logging_middleware(
    State(state): State<SecurityState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.log_requests {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0);
    let client = match client_ip(request.headers(), peer.as_ref()) {
        Some(ip) if state.config.sanitize_logs => mask_address(&ip),
        Some(ip) => ip,
        None => "unknown".to_string(),
    };

    let started = Instant::now();
    let response = next.run(request).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    match response.status() {
        s if s.is_server_error() => {
            error!(%method, %path, status, elapsed_ms, %client, "Admin request failed")
        }
        s if s.is_client_error() => {
            warn!(%method, %path, status, elapsed_ms, %client, "Admin request rejected")
        }
        _ => info!(%method, %path, status, elapsed_ms, %client, "Admin request served"),
    }

    response
}
