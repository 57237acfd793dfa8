pub mod error;
pub mod media;
pub mod pipeline;
pub mod transport;

pub use error::{PackError, Result};
pub use media::h264::{DrainStats, PackerConfig, Packets, RtpPacker};
pub use pipeline::Streamer;
pub use transport::PacketSink;
