//! UDP unicast transport

use super::DatagramTransport;
use crate::error::{Error, Result};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

/// UDP socket sending every datagram to a single destination
///
/// The socket is left unconnected so ICMP port-unreachable replies from an
/// absent consumer do not surface as errors on later sends.
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    target: SocketAddr,
}

impl UdpTransport {
    /// Bind a local socket and resolve the destination to an address of the
    /// same family
    ///
    /// # Arguments
    /// * `bind_address` - Local address, e.g. `0.0.0.0:0` for an ephemeral port
    /// * `target` - Destination, e.g. `127.0.0.1:12345`
    pub fn open<A: ToSocketAddrs>(bind_address: &str, target: A) -> Result<Self> {
        let socket = UdpSocket::bind(bind_address).map_err(|e| {
            Error::Transport(format!("failed to bind UDP socket to {}: {}", bind_address, e))
        })?;
        let local = socket.local_addr()?;
        let target = select_target(target.to_socket_addrs()?, &local).ok_or_else(|| {
            Error::Transport(format!(
                "target address has no {} address reachable from {}",
                if local.is_ipv4() { "IPv4" } else { "IPv6" },
                local
            ))
        })?;

        log::info!("UDP transport {} -> {}", local, target);

        Ok(Self {
            socket: Some(socket),
            target,
        })
    }

    /// Resolved destination address
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        match &self.socket {
            Some(socket) => Ok(socket.local_addr()?),
            None => Err(Error::Transport("socket closed".to_string())),
        }
    }
}

impl DatagramTransport for UdpTransport {
    fn send(&mut self, datagram: &[u8]) -> Result<usize> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| Error::Transport("socket closed".to_string()))?;
        Ok(socket.send_to(datagram, self.target)?)
    }

    fn close(&mut self) -> Result<()> {
        if self.socket.take().is_some() {
            log::info!("UDP transport to {} closed", self.target);
        }
        Ok(())
    }
}

/// First resolved address in the same family as the local socket
fn select_target(
    candidates: impl IntoIterator<Item = SocketAddr>,
    local: &SocketAddr,
) -> Option<SocketAddr> {
    candidates
        .into_iter()
        .find(|addr| addr.is_ipv4() == local.is_ipv4())
}
