use std::ops::Range;
use std::time::Instant;

use super::buffer::{DEFAULT_CAPACITY, OutputBuffer};
use super::nal::{NalHeader, NalScanner};
use super::rtp::{RTP_HEADER_LEN, RtpHeader, fu_header, fu_indicator};
use crate::error::Result;
use crate::transport::PacketSink;

/// Default ceiling on the RTP payload, well under a 1500-byte Ethernet MTU.
pub const DEFAULT_MAX_PAYLOAD: usize = 1400;
pub const DEFAULT_SSRC: u32 = 1234;
/// Dynamic payload type conventionally used for H.264.
pub const H264_PAYLOAD_TYPE: u8 = 96;
/// RTP video clock ticks per millisecond (90 kHz).
const CLOCK_TICKS_PER_MS: u128 = 90;

/// FU indicator + FU header.
const FU_PREFIX_LEN: usize = 2;

/// Packetizer settings, fixed for the lifetime of an [`RtpPacker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackerConfig {
    /// Largest NAL unit sent whole, and the slice size of every FU-A
    /// fragment but the last. Keep it below the link MTU minus IP, UDP and
    /// RTP overhead.
    pub max_payload: usize,
    /// Synchronization source identifier written into every packet.
    pub ssrc: u32,
    /// RTP payload type (7-bit).
    pub payload_type: u8,
    /// Capacity of the scratch buffer packets are built in.
    pub scratch_capacity: usize,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
            ssrc: DEFAULT_SSRC,
            payload_type: H264_PAYLOAD_TYPE,
            scratch_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl PackerConfig {
    /// Defaults with a random SSRC (RFC 3550 §8.1).
    pub fn with_random_ssrc() -> Self {
        Self {
            ssrc: rand::random::<u32>(),
            ..Self::default()
        }
    }
}

/// Where the packetizer is within the bound buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    /// No buffer has been bound yet.
    Idle,
    /// The next `get` selects a new NAL unit.
    Scanning,
    /// Emitting FU-A fragments of the NAL unit at `nal` in the input.
    ///
    /// `index` is the next fragment to send; the one with
    /// `index == count` is the last and carries `last_size - 1` bytes.
    Fragmenting {
        header: NalHeader,
        nal: Range<usize>,
        index: usize,
        count: usize,
        last_size: usize,
    },
    /// No further NAL units in this buffer.
    Exhausted { truncated: bool },
}

/// Fragment count and final fragment size for a NAL unit of `len` bytes
/// (header included).
///
/// An exact multiple of `max` yields `len / max - 1` with a full-size last
/// fragment; otherwise `len / max` with the remainder as the last size.
/// Fragments are indexed `0..=count`.
fn fragment_plan(len: usize, max: usize) -> (usize, usize) {
    if len % max == 0 {
        (len / max - 1, max)
    } else {
        (len / max, len % max)
    }
}

/// H.264 RTP packetizer (RFC 6184, packetization-mode=1).
///
/// Converts buffers of Annex B NAL units into RTP packets, one packet per
/// [`Packets::get`] call. Two packetization modes are used:
///
/// - **Single NAL Unit** (§5.6): a NAL unit of at most
///   [`max_payload`](PackerConfig::max_payload) bytes goes out whole with
///   the marker bit set.
///
/// - **FU-A Fragmentation** (§5.8): larger NAL units are split across
///   several packets. Each fragment carries a 2-byte FU header before its
///   slice of the NAL unit (header byte excluded):
///
///   ```text
///   FU indicator:  [F|NRI|Type=28]     (1 byte)
///   FU header:     [S|E|R|NAL_Type]    (1 byte)
///   Fragment data: [...]               (max_payload bytes, last may be shorter)
///   ```
///
///   S is set on the first fragment, E and the marker bit on the last.
///
/// ## Sequence and timestamp
///
/// The sequence number advances by one per packet and survives
/// [`put`](Self::put). The timestamp is sampled from a monotonic clock when a
/// NAL unit is selected, as milliseconds since construction × 90, and is
/// shared by all of that unit's fragments.
///
/// ## Scratch buffer
///
/// Packets are assembled in one reusable buffer and returned as borrowed
/// slices, valid until the next `get`. A packet larger than the buffer is
/// a [`BufferOverflow`](crate::PackError::BufferOverflow).
#[derive(Debug)]
pub struct RtpPacker {
    config: PackerConfig,
    header: RtpHeader,
    out: OutputBuffer,
    state: State,
    epoch: Instant,
}

impl RtpPacker {
    pub fn new(mut config: PackerConfig) -> Self {
        if config.max_payload == 0 {
            tracing::warn!("max_payload of 0 is unusable, using 1");
            config.max_payload = 1;
        }
        tracing::debug!(
            max_payload = config.max_payload,
            scratch_capacity = config.scratch_capacity,
            "RTP packer opened"
        );
        Self {
            header: RtpHeader::new(config.payload_type, config.ssrc),
            out: OutputBuffer::with_capacity(config.scratch_capacity),
            state: State::Idle,
            epoch: Instant::now(),
            config,
        }
    }

    pub fn config(&self) -> &PackerConfig {
        &self.config
    }

    /// Sequence number of the next packet.
    pub fn next_sequence(&self) -> u16 {
        self.header.sequence()
    }

    /// RTP timestamp of the most recently selected NAL unit.
    pub fn last_timestamp(&self) -> u32 {
        self.header.timestamp()
    }

    /// Bind a buffer of one or more Annex B NAL units.
    ///
    /// Per-buffer state is reset unconditionally; fragments still pending
    /// from a previous buffer are dropped. The sequence number carries on.
    /// The returned [`Packets`] borrows `input` until it is dropped.
    pub fn put<'b>(&mut self, input: &'b [u8]) -> Packets<'_, 'b> {
        if let State::Fragmenting { index, count, .. } = self.state {
            tracing::debug!(index, count, "abandoning unfinished fragments");
        }
        self.state = State::Scanning;
        tracing::trace!(bytes = input.len(), "buffer bound");
        Packets {
            packer: self,
            input,
            scanner: NalScanner::new(input),
        }
    }

    fn sample_timestamp(&self) -> u32 {
        (self.epoch.elapsed().as_millis() * CLOCK_TICKS_PER_MS) as u32
    }
}

/// Packet and byte totals from draining one buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub packets: usize,
    pub bytes: usize,
}

/// Drain of one bound buffer, returned by [`RtpPacker::put`].
///
/// Call [`get`](Self::get) until it returns `Ok(None)`.
#[derive(Debug)]
pub struct Packets<'p, 'b> {
    packer: &'p mut RtpPacker,
    input: &'b [u8],
    scanner: NalScanner<'b>,
}

impl Packets<'_, '_> {
    /// Produce the next RTP packet, or `None` once the buffer is drained.
    ///
    /// A buffer that does not begin with a start code is logged and
    /// treated as having no further NAL units; see
    /// [`is_truncated`](Self::is_truncated).
    ///
    /// On [`BufferOverflow`](crate::PackError::BufferOverflow) no packet is
    /// produced and the sequence number is unchanged; the offending NAL
    /// unit is skipped and the following `get` moves on to the next one.
    pub fn get(&mut self) -> Result<Option<&[u8]>> {
        match self.packer.state.clone() {
            State::Idle | State::Exhausted { .. } => Ok(None),
            State::Scanning => self.select_next_unit(),
            State::Fragmenting {
                header,
                nal,
                index,
                count,
                last_size,
            } => self.emit_fragment(header, nal, index, count, last_size),
        }
    }

    /// Whether draining stopped early because a start code was missing.
    pub fn is_truncated(&self) -> bool {
        matches!(self.packer.state, State::Exhausted { truncated: true })
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.packer.state, State::Exhausted { .. })
    }

    /// Send every remaining packet to `sink`.
    pub fn drain_into<S: PacketSink + ?Sized>(&mut self, sink: &mut S) -> Result<DrainStats> {
        let mut stats = DrainStats::default();
        while let Some(packet) = self.get()? {
            sink.send(packet)?;
            stats.packets += 1;
            stats.bytes += packet.len();
        }
        Ok(stats)
    }

    /// Drain into owned packets.
    pub fn collect_packets(mut self) -> Result<Vec<Vec<u8>>> {
        let mut packets = Vec::new();
        while let Some(packet) = self.get()? {
            packets.push(packet.to_vec());
        }
        Ok(packets)
    }

    fn select_next_unit(&mut self) -> Result<Option<&[u8]>> {
        let unit = match self.scanner.next_unit() {
            Ok(Some(unit)) => unit,
            Ok(None) => {
                self.packer.state = State::Exhausted { truncated: false };
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping rest of buffer");
                self.packer.state = State::Exhausted { truncated: true };
                return Ok(None);
            }
        };

        let ts = self.packer.sample_timestamp();
        self.packer.header.set_timestamp(ts);

        let max = self.packer.config.max_payload;
        let len = unit.len();

        if len <= max {
            self.packer
                .out
                .ensure_fits(RTP_HEADER_LEN + 1 + (len - 1))?;

            let hdr = self.packer.header.write(true);
            tracing::trace!(
                nal_type = unit.header.unit_type,
                nal_size = len,
                seq = u16::from_be_bytes([hdr[2], hdr[3]]),
                ts,
                "single NAL unit packet"
            );
            let prefix = [unit.header.to_byte()];
            return Ok(Some(self.packer.out.assemble(&hdr, &prefix, unit.payload())));
        }

        let (count, last_size) = fragment_plan(len, max);
        self.packer
            .out
            .ensure_fits(RTP_HEADER_LEN + FU_PREFIX_LEN + max)?;

        let start = unit.offset + unit.start_code_len;
        self.packer.state = State::Fragmenting {
            header: unit.header,
            nal: start..start + len,
            index: 1,
            count,
            last_size,
        };

        tracing::trace!(
            nal_type = unit.header.unit_type,
            nal_size = len,
            fragments = count + 1,
            last_size,
            ts,
            "FU-A fragmenting NAL unit"
        );

        let hdr = self.packer.header.write(false);
        let prefix = [
            fu_indicator(unit.header),
            fu_header(true, false, unit.header.unit_type),
        ];
        Ok(Some(self.packer.out.assemble(
            &hdr,
            &prefix,
            &unit.payload()[..max],
        )))
    }

    fn emit_fragment(
        &mut self,
        header: NalHeader,
        nal: Range<usize>,
        index: usize,
        count: usize,
        last_size: usize,
    ) -> Result<Option<&[u8]>> {
        let max = self.packer.config.max_payload;
        let last = index == count;
        let slice_len = if last { last_size - 1 } else { max };
        let from = nal.start + 1 + index * max;

        self.packer.state = State::Scanning;
        self.packer
            .out
            .ensure_fits(RTP_HEADER_LEN + FU_PREFIX_LEN + slice_len)?;

        if !last {
            self.packer.state = State::Fragmenting {
                header,
                nal,
                index: index + 1,
                count,
                last_size,
            };
        }

        let hdr = self.packer.header.write(last);
        let prefix = [fu_indicator(header), fu_header(false, last, header.unit_type)];
        Ok(Some(self.packer.out.assemble(
            &hdr,
            &prefix,
            &self.input[from..from + slice_len],
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::error::PackError;
    use crate::media::rtp::RtpPacketView;

    fn make_packer() -> RtpPacker {
        RtpPacker::new(PackerConfig {
            ssrc: 0xAABBCCDD,
            ..PackerConfig::default()
        })
    }

    /// 4-byte start code + NAL unit of `len` bytes (header included).
    fn annexb_nal(header: u8, len: usize) -> Vec<u8> {
        let mut data = vec![0, 0, 0, 1, header];
        data.extend((1..len).map(|i| (i % 251) as u8 + 2));
        data
    }

    fn seq(packet: &[u8]) -> u16 {
        RtpPacketView::parse(packet).unwrap().sequence()
    }

    #[test]
    fn fragment_plan_exact_multiple() {
        assert_eq!(fragment_plan(2800, 1400), (1, 1400));
        assert_eq!(fragment_plan(4200, 1400), (2, 1400));
    }

    #[test]
    fn fragment_plan_with_remainder() {
        assert_eq!(fragment_plan(3000, 1400), (2, 200));
        assert_eq!(fragment_plan(1401, 1400), (1, 1));
    }

    #[test]
    fn timestamp_is_elapsed_ms_at_90khz_per_nal() {
        let mut p = make_packer();
        thread::sleep(Duration::from_millis(20));

        let first = annexb_nal(0x65, 10);
        let packets = p.put(&first).collect_packets().unwrap();
        let ts1 = p.last_timestamp();
        assert!(ts1 >= 20 * 90, "ts1 = {ts1}");
        assert_eq!(ts1 % 90, 0);
        assert_eq!(RtpPacketView::parse(&packets[0]).unwrap().timestamp(), ts1);

        thread::sleep(Duration::from_millis(20));
        let second = annexb_nal(0x41, 10);
        let packets = p.put(&second).collect_packets().unwrap();
        let ts2 = RtpPacketView::parse(&packets[0]).unwrap().timestamp();
        assert!(ts2 >= ts1 + 20 * 90, "ts1 = {ts1}, ts2 = {ts2}");
        assert_eq!(ts2 % 90, 0);
    }

    #[test]
    fn new_packer_is_idle() {
        let p = make_packer();
        assert_eq!(p.state, State::Idle);
        assert_eq!(p.next_sequence(), 0);
    }

    #[test]
    fn small_nal_single_packet() {
        let mut p = make_packer();
        let data = annexb_nal(0x65, 10);
        let mut packets = p.put(&data);

        let pkt = packets.get().unwrap().unwrap().to_vec();
        assert_eq!(pkt.len(), 12 + 1 + 9);
        let v = RtpPacketView::parse(&pkt).unwrap();
        assert_eq!(v.version(), 2);
        assert!(v.marker());
        assert_eq!(v.payload_type(), 96);
        assert_eq!(v.ssrc(), 0xAABBCCDD);
        assert_eq!(v.payload(), &data[4..]);

        assert!(packets.get().unwrap().is_none());
        assert!(packets.is_exhausted());
        assert!(!packets.is_truncated());
        assert!(packets.get().unwrap().is_none());
    }

    #[test]
    fn nal_of_exactly_max_is_sent_whole() {
        let mut p = RtpPacker::new(PackerConfig {
            max_payload: 8,
            ..PackerConfig::default()
        });
        let data = annexb_nal(0x41, 8);
        let packets = p.put(&data).collect_packets().unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), 12 + 8);
    }

    #[test]
    fn large_nal_three_fragments() {
        let mut p = make_packer();
        let data = annexb_nal(0x65, 3000);
        let packets = p.put(&data).collect_packets().unwrap();
        assert_eq!(packets.len(), 3);

        let sizes: Vec<usize> = packets.iter().map(|pkt| pkt.len() - 14).collect();
        assert_eq!(sizes, vec![1400, 1400, 199]);

        for (i, pkt) in packets.iter().enumerate() {
            assert_eq!(pkt[12], 0x7C, "FU indicator keeps NRI, type 28");
            let start = pkt[13] & 0x80 != 0;
            let end = pkt[13] & 0x40 != 0;
            assert_eq!(pkt[13] & 0x20, 0, "reserved bit");
            assert_eq!(pkt[13] & 0x1f, 5);
            assert_eq!(start, i == 0);
            assert_eq!(end, i == 2);
            assert_eq!(pkt[1] & 0x80 != 0, i == 2, "marker only on last");
        }

        let rebuilt: Vec<u8> = packets.iter().flat_map(|pkt| pkt[14..].to_vec()).collect();
        assert_eq!(rebuilt, &data[5..]);

        let ts: Vec<u32> = packets
            .iter()
            .map(|pkt| RtpPacketView::parse(pkt).unwrap().timestamp())
            .collect();
        assert!(ts.iter().all(|&t| t == ts[0]));
    }

    #[test]
    fn exact_multiple_has_full_last_fragment() {
        let mut p = make_packer();
        let data = annexb_nal(0x65, 2800);
        let packets = p.put(&data).collect_packets().unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].len() - 14, 1400);
        assert_eq!(packets[1].len() - 14, 1399);
        assert_eq!(packets[1][13] & 0x40, 0x40);

        let rebuilt: Vec<u8> = packets.iter().flat_map(|pkt| pkt[14..].to_vec()).collect();
        assert_eq!(rebuilt, &data[5..]);
    }

    #[test]
    fn remainder_of_one_gives_empty_last_fragment() {
        let mut p = make_packer();
        let data = annexb_nal(0x65, 2801);
        let packets = p.put(&data).collect_packets().unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].len(), 14 + 1400);
        assert_eq!(packets[1].len(), 14 + 1400);
        assert_eq!(packets[2].len(), 14);
        assert_eq!(packets[2][13], 0x45);
        assert_eq!(packets[2][1] & 0x80, 0x80);
    }

    #[test]
    fn multiple_nals_one_buffer() {
        let mut p = RtpPacker::new(PackerConfig {
            max_payload: 4,
            ..PackerConfig::default()
        });
        let mut data = vec![0, 0, 0, 1, 0x67, 0x42, 0x1e];
        data.extend_from_slice(&[0, 0, 1, 0x68, 0xCE]);
        data.extend_from_slice(&[0, 0, 0, 1, 0x65, 1, 2, 3, 4, 5, 6, 7, 8, 9]);

        let packets = p.put(&data).collect_packets().unwrap();
        // SPS, PPS whole; IDR of 10 bytes: plan (2, 2) -> 3 fragments.
        assert_eq!(packets.len(), 5);
        assert_eq!(&packets[0][12..], &[0x67, 0x42, 0x1e]);
        assert_eq!(&packets[1][12..], &[0x68, 0xCE]);
        assert_eq!(&packets[2][14..], &[1, 2, 3, 4]);
        assert_eq!(&packets[3][14..], &[5, 6, 7, 8]);
        assert_eq!(&packets[4][14..], &[9]);

        let markers = packets.iter().filter(|pkt| pkt[1] & 0x80 != 0).count();
        assert_eq!(markers, 3, "one marker per NAL unit");

        for w in packets.windows(2) {
            assert_eq!(seq(&w[1]), seq(&w[0]).wrapping_add(1));
        }
    }

    #[test]
    fn sequence_continues_across_puts() {
        let mut p = make_packer();
        let small = annexb_nal(0x41, 20);
        let big = annexb_nal(0x65, 3000);

        let first = p.put(&small).collect_packets().unwrap();
        let second = p.put(&big).collect_packets().unwrap();
        let third = p.put(&small).collect_packets().unwrap();

        let all: Vec<u16> = first
            .iter()
            .chain(&second)
            .chain(&third)
            .map(|pkt| seq(pkt))
            .collect();
        assert_eq!(all, vec![0, 1, 2, 3, 4]);
        assert_eq!(p.next_sequence(), 5);
    }

    #[test]
    fn put_abandons_unfinished_fragments() {
        let mut p = make_packer();
        let big = annexb_nal(0x65, 3000);
        let small = annexb_nal(0x41, 10);

        {
            let mut packets = p.put(&big);
            let first = packets.get().unwrap().unwrap();
            assert_eq!(first[13] & 0x80, 0x80);
        }
        assert!(matches!(p.state, State::Fragmenting { index: 1, .. }));

        let packets = p.put(&small).collect_packets().unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(&packets[0][12..], &small[4..]);
        assert_eq!(seq(&packets[0]), 1);
    }

    #[test]
    fn overflow_is_reported_and_skipped() {
        let mut p = RtpPacker::new(PackerConfig {
            max_payload: 20_000,
            ..PackerConfig::default()
        });
        let mut data = annexb_nal(0x65, 15_000);
        data.extend(annexb_nal(0x41, 10));

        let mut packets = p.put(&data);
        match packets.get() {
            Err(PackError::BufferOverflow { size, capacity }) => {
                assert_eq!(size, 12 + 15_000);
                assert_eq!(capacity, 10 * 1024);
            }
            other => panic!("expected overflow, got {:?}", other),
        }

        let pkt = packets.get().unwrap().unwrap().to_vec();
        assert_eq!(seq(&pkt), 0, "failed packet consumed no sequence number");
        assert_eq!(pkt.len(), 12 + 10);
        assert!(packets.get().unwrap().is_none());
    }

    #[test]
    fn overflow_on_first_fragment() {
        let mut p = RtpPacker::new(PackerConfig {
            max_payload: 100,
            scratch_capacity: 64,
            ..PackerConfig::default()
        });
        let data = annexb_nal(0x65, 250);
        let mut packets = p.put(&data);
        assert!(matches!(
            packets.get(),
            Err(PackError::BufferOverflow { size: 114, .. })
        ));
        assert!(packets.get().unwrap().is_none());
    }

    #[test]
    fn malformed_input_truncates_buffer() {
        let mut p = make_packer();
        let data = [0x12, 0x34, 0, 0, 1, 0x65, 0x01];
        let mut packets = p.put(&data);
        assert!(packets.get().unwrap().is_none());
        assert!(packets.is_truncated());
        assert!(packets.get().unwrap().is_none());
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        let mut p = make_packer();
        let mut packets = p.put(&[]);
        assert!(packets.get().unwrap().is_none());
        assert!(!packets.is_truncated());
    }

    #[test]
    fn random_ssrc_is_used() {
        let cfg = PackerConfig::with_random_ssrc();
        let mut p = RtpPacker::new(cfg.clone());
        let data = annexb_nal(0x41, 5);
        let packets = p.put(&data).collect_packets().unwrap();
        assert_eq!(RtpPacketView::parse(&packets[0]).unwrap().ssrc(), cfg.ssrc);
        assert_eq!(cfg.max_payload, DEFAULT_MAX_PAYLOAD);
    }
}
