//! Delivery of finished RTP packets.
//!
//! The packetizer performs no I/O itself. Each packet it produces is
//! handed to a [`PacketSink`] as an opaque byte buffer:
//!
//! - **UDP** ([`udp`]): one datagram per packet, the usual RTP transport.
//! - **TCP** ([`tcp`]): packets written back to back onto a stream.
//! - **File** ([`file`]): packets appended to a dump file for offline
//!   inspection.

pub mod file;
pub mod tcp;
pub mod udp;

pub use file::FileSink;
pub use tcp::TcpSender;
pub use udp::UdpSender;

use crate::error::{PackError, Result};

/// Destination for serialized RTP packets.
pub trait PacketSink {
    /// Transmit one packet verbatim, returning the number of bytes written.
    fn send(&mut self, packet: &[u8]) -> Result<usize>;

    /// Push out anything buffered. Unbuffered sinks need not override this.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: PacketSink + ?Sized> PacketSink for Box<S> {
    fn send(&mut self, packet: &[u8]) -> Result<usize> {
        (**self).send(packet)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Collects packets in memory.
impl PacketSink for Vec<Vec<u8>> {
    fn send(&mut self, packet: &[u8]) -> Result<usize> {
        self.push(packet.to_vec());
        Ok(packet.len())
    }
}

/// Map a partial write to [`PackError::ShortSend`].
pub(crate) fn check_sent(sent: usize, expected: usize) -> Result<usize> {
    if sent != expected {
        return Err(PackError::ShortSend { sent, expected });
    }
    Ok(sent)
}
