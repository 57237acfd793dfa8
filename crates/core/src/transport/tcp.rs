use std::io::Write;
use std::net::{SocketAddr, TcpStream};

use super::PacketSink;
use crate::error::Result;

/// TCP sender for outbound RTP packets.
///
/// Packets are written back to back with no framing; the receiver is
/// expected to parse RTP headers out of the byte stream.
pub struct TcpSender {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpSender {
    pub fn connect(peer: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(peer)?;
        stream.set_nodelay(true)?;
        tracing::info!(%peer, "TCP sender connected");
        Ok(Self { stream, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl PacketSink for TcpSender {
    fn send(&mut self, packet: &[u8]) -> Result<usize> {
        self.stream.write_all(packet)?;
        Ok(packet.len())
    }
}
