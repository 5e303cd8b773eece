//! Client IP extraction utilities.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request};

use crate::cli::ClientIpHeader;

impl ClientIpHeader {
    pub fn header_name(&self) -> &'static str {
        match self {
            ClientIpHeader::XForwardedFor => "x-forwarded-for",
            ClientIpHeader::XRealIp => "x-real-ip",
        }
    }

    /// Parse the client address out of the header value.
    /// For `X-Forwarded-For` the first (original client) hop is used.
    pub fn parse(&self, value: &str) -> Option<String> {
        let candidate = match self {
            ClientIpHeader::XForwardedFor => value.split(',').next()?,
            ClientIpHeader::XRealIp => value,
        };
        candidate
            .trim()
            .parse::<IpAddr>()
            .ok()
            .map(|ip| ip.to_string())
    }
}

/// Extract client IP address based on configuration.
///
/// If `ip_header` is set, the IP comes from that header and a missing or
/// malformed header is an error (no fallback to the socket address).
/// Otherwise the socket address from `ConnectInfo` is used.
pub fn extract_client_ip(
    request: &Request,
    ip_header: Option<ClientIpHeader>,
) -> Result<String, &'static str> {
    match ip_header {
        Some(header) => {
            let value = request
                .headers()
                .get(header.header_name())
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            header.parse(value).ok_or("IP header is not an address")
        }
        None => request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .ok_or("No client IP available"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        assert_eq!(
            ClientIpHeader::XForwardedFor.parse("203.0.113.7, 10.0.0.1"),
            Some("203.0.113.7".to_string())
        );
        assert_eq!(ClientIpHeader::XForwardedFor.parse("garbage"), None);
    }

    #[test]
    fn test_real_ip() {
        assert_eq!(
            ClientIpHeader::XRealIp.parse(" ::1 "),
            Some("::1".to_string())
        );
    }

    #[test]
    fn test_connect_info_fallback() {
        let mut request = Request::new(Body::empty());
        assert!(extract_client_ip(&request, None).is_err());

        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 9], 5555))));
        assert_eq!(
            extract_client_ip(&request, None),
            Ok("192.168.1.9".to_string())
        );
    }

    #[test]
    fn test_header_required_when_configured() {
        let request = Request::builder()
            .header("x-real-ip", "10.1.2.3")
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            extract_client_ip(&request, Some(ClientIpHeader::XRealIp)),
            Ok("10.1.2.3".to_string())
        );
        assert!(extract_client_ip(&request, Some(ClientIpHeader::XForwardedFor)).is_err());
    }
}
