//! Session cookie helpers.
//!
//! The cookie is `HttpOnly`, `SameSite=Lax`, `Path=/`, and expires together
//! with the session row. Clearing sends `Max-Age=0`.

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};

use crate::shared::AppConfig;

/// Value of the cookie named `name`, if the request carries it.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value binding the session id until `expires_at`.
pub fn session_cookie(config: &AppConfig, session_id: &str, expires_at: DateTime<Utc>) -> HeaderValue {
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Expires={}; Max-Age={}",
        config.session_name,
        session_id,
        expires_at.format("%a, %d %b %Y %H:%M:%S GMT"),
        max_age
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    to_header_value(cookie)
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(config: &AppConfig) -> HeaderValue {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0",
        config.session_name
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    to_header_value(cookie)
}

fn to_header_value(cookie: String) -> HeaderValue {
    // Session ids are base64url and names come from config; anything else is a bug upstream.
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}
