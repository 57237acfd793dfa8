use std::net::{SocketAddr, UdpSocket};

use super::{PacketSink, check_sent};
use crate::error::Result;

/// UDP sender for outbound RTP packets.
///
/// Binds an ephemeral socket of the destination's address family and
/// connects it, so each [`send`](PacketSink::send) is one datagram to the
/// same peer.
pub struct UdpSender {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpSender {
    pub fn connect(peer: SocketAddr) -> Result<Self> {
        let local = if peer.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local)?;
        socket.connect(peer)?;
        tracing::info!(%peer, local = %socket.local_addr()?, "UDP sender opened");
        Ok(Self { socket, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl PacketSink for UdpSender {
    fn send(&mut self, packet: &[u8]) -> Result<usize> {
        let sent = self.socket.send(packet)?;
        check_sent(sent, packet.len())
    }
}
