use super::nal::NalHeader;

/// Length of the fixed RTP header.
pub const RTP_HEADER_LEN: usize = 12;

/// NAL unit type of an FU-A fragmentation unit (RFC 6184 §5.8).
pub const FU_A_TYPE: u8 = 28;

/// Generic RTP fixed header builder (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// - **Sequence number**: 16-bit, wrapping. Incremented on every packet
///   written and never reset for the lifetime of the header state.
/// - **Timestamp**: set by the packetizer once per NAL unit and repeated on
///   every packet until changed.
///
/// Version is always 2. Padding, extension, and CSRC count are always 0.
/// Fields are packed with shifts and written big-endian, so the layout
/// does not depend on the host.
#[derive(Debug)]
pub struct RtpHeader {
    /// RTP payload type (7-bit, RFC 3551).
    pub pt: u8,
    /// Synchronization source identifier (RFC 3550 §8.1).
    pub ssrc: u32,
    sequence: u16,
    timestamp: u32,
}

impl RtpHeader {
    pub fn new(pt: u8, ssrc: u32) -> Self {
        tracing::debug!(
            pt,
            ssrc = format_args!("{:#010X}", ssrc),
            "RTP header state created"
        );
        Self {
            pt,
            ssrc,
            sequence: 0,
            timestamp: 0,
        }
    }

    /// Sequence number the next [`write`](Self::write) will use.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: u32) {
        self.timestamp = timestamp;
    }

    /// Serialize a 12-byte RTP fixed header and advance the sequence number.
    ///
    /// The `marker` bit signals the last packet of a NAL unit.
    pub fn write(&mut self, marker: bool) -> [u8; RTP_HEADER_LEN] {
        let first_byte: u8 = 2 << 6;
        let second_byte: u8 = ((marker as u8) << 7) | (self.pt & 0x7f);

        let mut header = [0u8; RTP_HEADER_LEN];
        header[0] = first_byte;
        header[1] = second_byte;
        header[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        header[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        self.sequence = self.sequence.wrapping_add(1);
        header
    }
}

/// FU indicator: F and NRI of the original NAL unit, type 28.
///
/// ```text
/// |F|NRI|  28   |
/// ```
pub fn fu_indicator(nal: NalHeader) -> u8 {
    NalHeader {
        unit_type: FU_A_TYPE,
        ..nal
    }
    .to_byte()
}

/// FU header: start and end flags, reserved bit 0, original NAL type.
///
/// ```text
/// |S|E|R|  Type   |
/// ```
pub fn fu_header(start: bool, end: bool, unit_type: u8) -> u8 {
    ((start as u8) << 7) | ((end as u8) << 6) | (unit_type & 0x1f)
}

/// Read-only view of a serialized RTP packet.
///
/// Only the fixed header is decoded; CSRCs and extensions are not
/// expected since this crate never emits them.
#[derive(Debug, Clone, Copy)]
pub struct RtpPacketView<'a> {
    raw: &'a [u8],
}

impl<'a> RtpPacketView<'a> {
    /// Returns `None` if `raw` is shorter than the fixed header.
    pub fn parse(raw: &'a [u8]) -> Option<Self> {
        (raw.len() >= RTP_HEADER_LEN).then_some(Self { raw })
    }

    pub fn version(&self) -> u8 {
        self.raw[0] >> 6
    }

    pub fn marker(&self) -> bool {
        self.raw[1] & 0x80 != 0
    }

    pub fn payload_type(&self) -> u8 {
        self.raw[1] & 0x7f
    }

    pub fn sequence(&self) -> u16 {
        u16::from_be_bytes([self.raw[2], self.raw[3]])
    }

    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.raw[4], self.raw[5], self.raw[6], self.raw[7]])
    }

    pub fn ssrc(&self) -> u32 {
        u32::from_be_bytes([self.raw[8], self.raw[9], self.raw[10], self.raw[11]])
    }

    /// Everything after the fixed header.
    pub fn payload(&self) -> &'a [u8] {
        &self.raw[RTP_HEADER_LEN..]
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}
