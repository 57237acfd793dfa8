//! Pipeline driver: encoded frames in, RTP packets out to a sink.

use crate::error::Result;
use crate::media::h264::{DrainStats, PackerConfig, RtpPacker};
use crate::media::sdp::ParameterSets;
use crate::transport::PacketSink;

/// Owns a packetizer and a sink and moves one buffer at a time between them.
///
/// Each [`send_frame`](Self::send_frame) binds the buffer, drains it
/// completely into the sink and records any SPS/PPS it carries for SDP
/// generation. The first packetization or delivery error ends the frame
/// and is returned; packets after the failed one are not sent, and the
/// next frame starts clean with the sequence number carried on.
pub struct Streamer<S: PacketSink> {
    packer: RtpPacker,
    sink: S,
    params: ParameterSets,
    totals: DrainStats,
    frames: u64,
}

impl<S: PacketSink> Streamer<S> {
    pub fn new(config: PackerConfig, sink: S) -> Self {
        Self {
            packer: RtpPacker::new(config),
            sink,
            params: ParameterSets::new(),
            totals: DrainStats::default(),
            frames: 0,
        }
    }

    /// Packetize one buffer of Annex B NAL units and send every packet.
    pub fn send_frame(&mut self, frame: &[u8]) -> Result<DrainStats> {
        self.params.capture(frame);

        let mut packets = self.packer.put(frame);
        let stats = packets.drain_into(&mut self.sink)?;
        let truncated = packets.is_truncated();

        self.frames += 1;
        self.totals.packets += stats.packets;
        self.totals.bytes += stats.bytes;

        tracing::trace!(
            frame = self.frames,
            frame_bytes = frame.len(),
            rtp_packets = stats.packets,
            truncated,
            seq = self.packer.next_sequence(),
            ts = self.packer.last_timestamp(),
            "frame packetized"
        );

        Ok(stats)
    }

    /// Flush the sink, e.g. at end of stream.
    pub fn finish(&mut self) -> Result<()> {
        self.sink.flush()
    }

    pub fn packer(&self) -> &RtpPacker {
        &self.packer
    }

    pub fn parameter_sets(&self) -> &ParameterSets {
        &self.params
    }

    /// Totals over every frame sent successfully so far.
    pub fn totals(&self) -> DrainStats {
        self.totals
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
