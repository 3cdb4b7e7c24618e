//! Client IP allow-list applied in front of every route.

use std::net::SocketAddr;

use {
    axum::{
        Json,
        extract::{ConnectInfo, Request, State},
        http::StatusCode,
        middleware::Next,
        response::{IntoResponse, Response},
    },
    serde_json::json,
    tracing::{debug, warn},
};

use crate::state::AppState;

/// Strip the IPv4-mapped IPv6 prefix so `::ffff:10.0.0.1` matches `10.0.0.1`.
pub fn normalize_ip(ip: &str) -> &str {
    ip.strip_prefix("::ffff:").unwrap_or(ip)
}

/// Peer address when available, else the first `X-Forwarded-For` hop.
fn client_ip(req: &Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("127.0.0.1")
        .to_string()
}

pub async fn restrict_ip(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let config = &state.ip_restriction;
    if !config.enabled {
        return next.run(req).await;
    }

    let ip = client_ip(&req);
    let normalized = normalize_ip(&ip);
    if config
        .allowed_ips
        .iter()
        .any(|allowed| normalize_ip(allowed) == normalized)
    {
        debug!(client_ip = %ip, "IP access allowed");
        return next.run(req).await;
    }

    warn!(client_ip = %ip, normalized, allowed = ?config.allowed_ips, "IP access denied");
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "success": false,
            "message": "Access denied from this IP address",
            "error": "IP_RESTRICTION",
            "clientIP": normalized,
            "timestamp": crate::server::iso_timestamp(),
        })),
    )
        .into_response()
}
