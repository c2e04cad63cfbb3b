use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

/// Headers consulted, in priority order. Only trustworthy behind a proxy that
/// overwrites them; nothing here enforces that.
pub const CLIENT_IP_HEADERS: [&str; 3] = ["True-Client-IP", "X-Real-IP", "X-Forwarded-For"];

/// Key used when neither headers nor the transport yield an address.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolved client address, stored in request extensions for later stages.
/// Treat it as an opaque key; the address family is not guaranteed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// Best-effort client address: the first header candidate that parses as an
/// IP wins, otherwise the peer address.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    CLIENT_IP_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
        .filter_map(|value| {
            // X-Forwarded-For is "client, proxy1, proxy2"; only the first hop counts.
            let first = value.split(',').next().unwrap_or(value).trim();
            first.parse::<IpAddr>().ok()
        })
        .map(|ip| ip.to_string())
        .next()
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Reads the client address already resolved for this request, if any.
pub fn client_ip_of(request: &Request) -> String {
    match request.extensions().get::<ClientIp>() {
        Some(ClientIp(ip)) => ip.clone(),
        None => resolve_client_ip(request.headers(), peer_addr(request)),
    }
}

fn peer_addr(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// First pipeline stage: resolves the client key once per request.
pub async fn resolve_client(mut request: Request, next: Next) -> Response {
    let ip = resolve_client_ip(request.headers(), peer_addr(&request));
    request.extensions_mut().insert(ClientIp(ip));
    next.run(request).await
}
