//! Error types for the RTP packetizer library.

/// Errors that can occur while packetizing or delivering RTP packets.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Scanning**: [`MalformedInput`](Self::MalformedInput): no Annex B
///   start code where one was expected. [`Packets::get`](crate::Packets::get)
///   never returns it; it logs it and treats the buffer as exhausted.
/// - **Packetization**: [`BufferOverflow`](Self::BufferOverflow): a packet
///   would not fit in the scratch buffer.
/// - **Delivery**: [`Io`](Self::Io), [`ShortSend`](Self::ShortSend).
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// No 3- or 4-byte start code at the scan cursor.
    #[error("no start code at offset {offset}")]
    MalformedInput { offset: usize },

    /// The packet being built exceeds the output buffer capacity.
    #[error("RTP output buffer overflow: packet of {size} bytes exceeds capacity {capacity}")]
    BufferOverflow { size: usize, capacity: usize },

    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket accepted fewer bytes than the packet holds.
    #[error("short send: {sent} of {expected} bytes")]
    ShortSend { sent: usize, expected: usize },
}

/// Convenience alias for `Result<T, PackError>`.
pub type Result<T> = std::result::Result<T, PackError>;
