//! IP 地址处理工具
//!
//! 转发头只在连接来自私有地址或 localhost（即反向代理）时才被信任

use std::net::{IpAddr, SocketAddr};

use actix_web::HttpRequest;
use actix_web::http::header::HeaderMap;
use tracing::debug;

/// 检查 IP 是否为私有地址或 localhost
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00 // fc00::/7
                || (v6.segments()[0] & 0xffc0) == 0xfe80 // fe80::/10
        }
    }
}

fn parse_peer(peer: &str) -> Option<IpAddr> {
    peer.parse::<SocketAddr>()
        .map(|s| s.ip())
        .or_else(|_| peer.parse::<IpAddr>())
        .ok()
}

/// 从 HttpRequest 提取真实客户端 IP
pub fn extract_client_ip(req: &HttpRequest) -> Option<String> {
    let peer = req.peer_addr().map(|addr| addr.ip());
    resolve_client_ip(peer, req.headers())
}

/// 选择客户端 IP：
/// 1. 无连接地址 → 转发头
/// 2. 连接来自私有 IP/localhost → 优先转发头（X-Forwarded-For，其次 X-Real-IP）
/// 3. 其他 → 连接 IP（公网直连，防止伪造）
pub fn resolve_client_ip(peer: Option<IpAddr>, headers: &HeaderMap) -> Option<String> {
    let Some(peer) = peer else {
        return extract_forwarded_ip_from_headers(headers);
    };

    if is_private_or_local(&peer)
        && let Some(real_ip) = extract_forwarded_ip_from_headers(headers)
    {
        debug!("Proxy {} forwarded client {}", peer, real_ip);
        return Some(real_ip);
    }

    Some(peer.to_string())
}

/// 从 HeaderMap 提取转发的 IP
pub fn extract_forwarded_ip_from_headers(headers: &HeaderMap) -> Option<String> {
    // 优先 X-Forwarded-For（取第一个，即原始客户端 IP）
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .map(|ip| match parse_peer(&ip) {
            Some(addr) => addr.to_string(),
            None => ip,
        })
}
