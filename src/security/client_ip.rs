//! Client key derivation for rate limiting.
//!
//! Forwarding headers are preferred over the peer address, but a header
//! value is only used after it parses as an IP address, and only to group
//! requests. Nothing else trusts it.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Key identifying the client that sent a request.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    forwarded_ip(headers)
        .or_else(|| header_ip(headers, X_REAL_IP))
        .or_else(|| peer.map(|addr| addr.ip()))
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// First parseable address in `X-Forwarded-For`.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(parse_ip)
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers.get(name)?.to_str().ok().and_then(parse_ip)
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.10:55000".parse().unwrap())
    }

    #[test]
    fn test_peer_address_without_headers() {
        assert_eq!(client_key(&HeaderMap::new(), peer()), "192.0.2.10");
        assert_eq!(client_key(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_forwarded_for_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert(X_REAL_IP, HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_key(&headers, peer()), "203.0.113.7");
    }

    #[test]
    fn test_garbage_header_is_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("not-an-ip, 10.0.0.1"));
        assert_eq!(client_key(&headers, peer()), "10.0.0.1");

        let mut headers = HeaderMap::new();
        headers.insert(X_REAL_IP, HeaderValue::from_static("<script>"));
        assert_eq!(client_key(&headers, peer()), "192.0.2.10");
    }

    #[test]
    fn test_real_ip_with_port() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REAL_IP, HeaderValue::from_static("[2001:db8::1]:8080"));
        assert_eq!(client_key(&headers, peer()), "2001:db8::1");
    }
}
