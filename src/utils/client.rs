use actix_web::{
    http::header::{HeaderMap, HeaderName, REFERER, USER_AGENT},
    HttpRequest,
};

use crate::models::ClientInfo;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Bucket shared by every client that sends no forwarding header.
pub const UNKNOWN_CLIENT: &str = "unknown";

const IPV4_MAPPED_PREFIX: &str = "::ffff:";

/// Strips the IPv4-mapped IPv6 prefix so `::ffff:1.2.3.4` and `1.2.3.4`
/// count as the same client.
pub fn normalize_ip(ip: &str) -> String {
    let ip = ip.trim();
    match ip.get(..IPV4_MAPPED_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(IPV4_MAPPED_PREFIX) => {
            ip[IPV4_MAPPED_PREFIX.len()..].to_string()
        }
        _ => ip.to_string(),
    }
}

/// First address of `X-Forwarded-For`, if any.
pub fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .map(str::to_string)
}

/// Rate limit key: the first forwarded address or the shared `unknown` bucket.
pub fn client_key(headers: &HeaderMap) -> String {
    forwarded_for(headers)
        .map(|ip| normalize_ip(&ip))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Client metadata recorded with each scan.
pub fn client_info(req: &HttpRequest) -> ClientInfo {
    let headers = req.headers();
    let ip = forwarded_for(headers)
        .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
        .map(|ip| normalize_ip(&ip))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    ClientInfo::new(
        ip,
        header_value(headers, USER_AGENT),
        header_value(headers, REFERER),
    )
}

fn header_value(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
