//! Client address resolution

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};

use crate::error::Error;

/// Placeholder key for requests whose peer address is unknown
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Address the lockout and ban checks are keyed by
///
/// Inserted into request extensions by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddress(pub String);

impl ClientAddress {
    /// The address as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S> FromRequestParts<S> for ClientAddress
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ClientAddress>()
            .cloned()
            .ok_or_else(|| Error::Internal("Request did not pass the gate".to_string()))
    }
}

/// Resolve the client address of a request
///
/// With `trust_forwarded_for`, the first `X-Forwarded-For` hop wins. Otherwise
/// the TCP peer from `ConnectInfo`. IPv4-mapped IPv6 peers are reported in
/// their IPv4 form so one client has one key.
pub fn resolve(
    extensions: &axum::http::Extensions,
    headers: &HeaderMap,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(forwarded) = forwarded {
            return forwarded.to_string();
        }
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_canonical().to_string())
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string())
}

/// Client signature recorded with bans and approvals
pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Extensions, HeaderValue};

    fn extensions(addr: &str) -> Extensions {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(addr.parse::<SocketAddr>().unwrap()));
        extensions
    }

    #[test]
    fn test_peer_address() {
        assert_eq!(
            resolve(&extensions("10.0.0.5:51234"), &HeaderMap::new(), false),
            "10.0.0.5"
        );
    }

    #[test]
    fn test_mapped_ipv6_is_canonical() {
        assert_eq!(
            resolve(&extensions("[::ffff:10.0.0.5]:80"), &HeaderMap::new(), false),
            "10.0.0.5"
        );
    }

    #[test]
    fn test_forwarded_for_only_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));

        assert_eq!(resolve(&extensions("10.0.0.1:1"), &headers, false), "10.0.0.1");
        assert_eq!(resolve(&extensions("10.0.0.1:1"), &headers, true), "203.0.113.7");
    }

    #[test]
    fn test_unknown_peer() {
        assert_eq!(resolve(&Extensions::new(), &HeaderMap::new(), false), UNKNOWN_ADDRESS);
    }
}
