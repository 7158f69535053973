use botshield_common::config::OriginConfig;
use pingora_core::upstreams::peer::HttpPeer;

/// Build the upstream peer for the configured origin.
pub fn origin_peer(origin: &OriginConfig) -> Box<HttpPeer> {
    let sni = origin
        .sni
        .clone()
        .unwrap_or_else(|| host_part(&origin.addr).to_string());
    Box::new(HttpPeer::new(&origin.addr, origin.tls, sni))
}

/// The host portion of a `host:port` address.
fn host_part(addr: &str) -> &str {
    // Bracketed IPv6 keeps its brackets; a lone colon splits host from port.
    if let Some(end) = addr.rfind(']') {
        return &addr[..=end];
    }
    match addr.rsplit_once(':') {
        Some((host, _port)) if !host.is_empty() => host,
        _ => addr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_part_strips_port() {
        assert_eq!(host_part("origin.example.com:443"), "origin.example.com");
        assert_eq!(host_part("127.0.0.1:3000"), "127.0.0.1");
    }

    #[test]
    fn host_part_keeps_bare_host() {
        assert_eq!(host_part("origin.example.com"), "origin.example.com");
    }

    #[test]
    fn host_part_handles_bracketed_ipv6() {
        assert_eq!(host_part("[::1]:8080"), "[::1]");
    }
}
