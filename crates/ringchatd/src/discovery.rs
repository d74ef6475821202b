//! Where this peer can be reached: advertised host and listening socket.

use std::net::{IpAddr, Ipv4Addr, SocketAddrV4, UdpSocket};

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

/// Any routable address works; connecting a UDP socket sends nothing.
const PROBE_TARGET: &str = "8.8.8.8:80";

const LISTEN_BACKLOG: i32 = 128;

/// The host to advertise: the configured one if set, otherwise the address
/// of the interface that would carry outbound traffic, otherwise loopback.
pub fn advertised_host(configured: &str) -> String {
    if !configured.is_empty() {
        return configured.to_string();
    }
    match probe_local_ip() {
        Ok(ip) if !ip.is_unspecified() => ip.to_string(),
        Ok(_) => Ipv4Addr::LOCALHOST.to_string(),
        Err(e) => {
            tracing::debug!(error = %e, "local address probe failed, advertising loopback");
            Ipv4Addr::LOCALHOST.to_string()
        }
    }
}

fn probe_local_ip() -> std::io::Result<IpAddr> {
    let probe = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    probe.connect(PROBE_TARGET)?;
    Ok(probe.local_addr()?.ip())
}

/// Bind the neighbor-link listener on all interfaces. Port 0 lets the OS
/// pick a free one; read it back with `local_addr`.
pub fn bind_listener(port: u16) -> Result<TcpListener> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket
        .bind(&bind_addr.into())
        .with_context(|| format!("bind() on port {port}"))?;
    socket.listen(LISTEN_BACKLOG).context("listen()")?;

    TcpListener::from_std(socket.into()).context("failed to convert to tokio TcpListener")
}
