/**
 * Client IP Resolution and Session IP Heuristic
 *
 * Sessions remember the address they were created from. On every request
 * the current address is compared with it, and a move outside the
 * tolerated range destroys the session.
 *
 * Tolerated moves:
 *
 * - both addresses are loopback (`127.0.0.0/8`, `::1`)
 * - both are private (RFC 1918, or IPv6 unique-local) and share a /24
 *   (IPv6: a /64)
 * - both are public and share a /16 (IPv6: a /48)
 *
 * This only raises the cost of replaying a stolen cookie from elsewhere.
 * It is not an access-control boundary; forwarding headers are taken at
 * face value. It can be switched off with `session_ip_check = false`.
 */

use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{request::Parts, Extensions, HeaderMap};

/// Headers consulted before the peer address, in order
const FORWARDING_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

/// Resolve the client address of a request, without any port.
///
/// Returns `None` when there is neither a forwarding header nor a peer
/// address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    for name in FORWARDING_HEADERS {
        let first = headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(value) = first {
            return Some(clean_ip(value));
        }
    }
    peer.map(|addr| addr.ip().to_string())
}

/// [`client_ip`] with the peer address taken from `ConnectInfo`, when the
/// server was started with connect info.
pub fn request_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<String> {
    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_ip(headers, peer)
}

/// Extractor for the resolved client address; `None` when unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(request_ip(&parts.headers, &parts.extensions)))
    }
}

/// Strip a port from `1.2.3.4:5678` or `[::1]:5678`; anything else is returned as is.
pub fn clean_ip(raw: &str) -> String {
    let raw = raw.trim();
    if raw.parse::<IpAddr>().is_ok() {
        return raw.to_string();
    }
    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }
    if let Some(inner) = raw.strip_prefix('[').and_then(|rest| rest.split(']').next()) {
        return inner.to_string();
    }
    raw.to_string()
}

/// Whether a session created from `stored` may continue from `current`.
pub fn ip_change_tolerated(stored: &str, current: &str) -> bool {
    if stored == current {
        return true;
    }
    let (Ok(stored), Ok(current)) = (stored.parse::<IpAddr>(), current.parse::<IpAddr>()) else {
        return false;
    };
    if stored.is_loopback() && current.is_loopback() {
        return true;
    }

    match (stored, current) {
        (IpAddr::V4(a), IpAddr::V4(b)) => match (is_private_v4(a), is_private_v4(b)) {
            (true, true) => same_prefix(&a.octets(), &b.octets(), 24),
            (false, false) => same_prefix(&a.octets(), &b.octets(), 16),
            _ => false,
        },
        (IpAddr::V6(a), IpAddr::V6(b)) => match (is_unique_local_v6(a), is_unique_local_v6(b)) {
            (true, true) => same_prefix(&a.octets(), &b.octets(), 64),
            (false, false) => same_prefix(&a.octets(), &b.octets(), 48),
            _ => false,
        },
        _ => false,
    }
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    ip.is_private() || ip.is_loopback()
}

fn is_unique_local_v6(ip: Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

fn same_prefix(a: &[u8], b: &[u8], bits: usize) -> bool {
    let whole = bits / 8;
    let rest = bits % 8;
    if a[..whole] != b[..whole] {
        return false;
    }
    if rest == 0 {
        return true;
    }
    let mask = 0xffu8 << (8 - rest);
    (a[whole] & mask) == (b[whole] & mask)
}
