use axum::http::HeaderMap;
use std::net::IpAddr;

/// Client information attached to structured log events.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Extract request context from HTTP headers
    pub fn extract_from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_client_ip(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Extract client IP from proxy headers, preferring X-Forwarded-For,
/// then X-Real-IP (nginx), then CF-Connecting-IP (Cloudflare).
fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded_for) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        // Comma-separated list: client, proxy1, proxy2; leftmost is the client
        if let Some(client_ip) = forwarded_for.split(',').next() {
            let ip = client_ip.trim();
            if ip.parse::<IpAddr>().is_ok_and(|p| !p.is_unspecified()) {
                return Some(ip.to_string());
            }
        }
    }

    for header in ["x-real-ip", "cf-connecting-ip"] {
        if let Some(value) = headers.get(header).and_then(|h| h.to_str().ok()) {
            if value.parse::<IpAddr>().is_ok_and(|p| !p.is_unspecified()) {
                return Some(value.to_string());
            }
        }
    }

    None
}

fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .map(|ua| {
            // Truncate very long user agents to prevent abuse
            if ua.len() > 500 {
                format!("{}...", &ua[..497])
            } else {
                ua.to_string()
            }
        })
}
