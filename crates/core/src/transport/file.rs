use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::PacketSink;
use crate::error::Result;

/// Appends each packet verbatim to a file.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    /// Create (or truncate) the dump file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        tracing::info!(path = %path.display(), "dumping RTP packets to file");
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl PacketSink for FileSink {
    fn send(&mut self, packet: &[u8]) -> Result<usize> {
        self.writer.write_all(packet)?;
        Ok(packet.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.writer.flush()?)
    }
}
