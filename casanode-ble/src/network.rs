use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// First non-loopback IPv4 address of this host.
///
/// Connecting a UDP socket sends nothing, it only asks the kernel which
/// source address it would route from.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// Whether `host` is an IPv4 or IPv6 literal
pub fn is_valid_ip(host: &str) -> bool {
    host.parse::<IpAddr>().is_ok()
}

/// Whether `host` resolves through the system resolver
pub async fn is_resolvable(host: &str) -> bool {
    match tokio::net::lookup_host((host, 0)).await {
        Ok(mut addrs) => addrs.next().is_some(),
        Err(_) => false,
    }
}
