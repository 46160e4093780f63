//! Client IP extraction from proxy headers
//!
//! Precedence: first `X-Forwarded-For` entry, then `X-Real-IP`, then
//! `X-Client-IP`, then the loopback address. The value is only ever used as
//! input to the fingerprint hash, so it is taken as a string and not
//! validated as an address.

use axum::http::HeaderMap;

pub const FALLBACK_IP: &str = "127.0.0.1";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Extract the client IP string from request headers
pub fn extract_client_ip(headers: &HeaderMap) -> String {
    if let Some(xff) = header_value(headers, "x-forwarded-for") {
        if let Some(first) = xff.split(',').next() {
            return first.trim().to_string();
        }
    }

    header_value(headers, "x-real-ip")
        .or_else(|| header_value(headers, "x-client-ip"))
        .unwrap_or(FALLBACK_IP)
        .to_string()
}
