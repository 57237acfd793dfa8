//! Annex B NAL unit scanning (ITU-T H.264 Annex B, RFC 6184 §1.3).
//!
//! H.264 byte streams delimit NAL units with start codes:
//! - 4-byte: `0x00 0x00 0x00 0x01`
//! - 3-byte: `0x00 0x00 0x01`
//!
//! [`NalScanner`] walks a borrowed buffer one NAL unit at a time. Units
//! are views into the caller's bytes; nothing is copied.

use crate::error::{PackError, Result};

/// Sequence parameter set.
pub const NAL_TYPE_SPS: u8 = 7;
/// Picture parameter set.
pub const NAL_TYPE_PPS: u8 = 8;

/// The 1-byte H.264 NAL unit header.
///
/// ```text
/// +---------------+
/// |0|1|2|3|4|5|6|7|
/// +-+-+-+-+-+-+-+-+
/// |F|NRI|  Type   |
/// +---------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalHeader {
    /// `forbidden_zero_bit`.
    pub forbidden: bool,
    /// `nal_ref_idc` (2 bits).
    pub ref_idc: u8,
    /// `nal_unit_type` (5 bits).
    pub unit_type: u8,
}

impl NalHeader {
    pub fn from_byte(b: u8) -> Self {
        Self {
            forbidden: b & 0x80 != 0,
            ref_idc: (b >> 5) & 0x03,
            unit_type: b & 0x1f,
        }
    }

    pub fn to_byte(self) -> u8 {
        ((self.forbidden as u8) << 7) | ((self.ref_idc & 0x03) << 5) | (self.unit_type & 0x1f)
    }

    /// Coded slice types (1..=5) carry picture data.
    pub fn is_vcl(self) -> bool {
        (1..=5).contains(&self.unit_type)
    }
}

/// A NAL unit located inside a scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit<'a> {
    /// Offset of the start code that precedes this unit.
    pub offset: usize,
    /// 3 or 4.
    pub start_code_len: usize,
    pub header: NalHeader,
    /// Unit bytes including the header byte, excluding the start code.
    pub data: &'a [u8],
}

impl NalUnit<'_> {
    /// Length including the header byte.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Unit bytes after the header byte.
    pub fn payload(&self) -> &[u8] {
        self.data.get(1..).unwrap_or_default()
    }
}

/// Length of the start code at the beginning of `buf`, if any.
///
/// The 3-byte form is tried first, as `00 00 00 01` never matches it.
pub fn start_code_len(buf: &[u8]) -> Option<usize> {
    if buf.starts_with(&[0, 0, 1]) {
        Some(3)
    } else if buf.starts_with(&[0, 0, 0, 1]) {
        Some(4)
    } else {
        None
    }
}

/// Cursor over the NAL units of one Annex B buffer.
///
/// Each call to [`next_unit`](Self::next_unit) expects a start code at the
/// cursor, then scans forward byte by byte for the next one. The unit runs
/// from its header byte up to the next start code, or to the end of the
/// buffer, in which case the cursor becomes unavailable.
#[derive(Debug, Clone)]
pub struct NalScanner<'a> {
    data: &'a [u8],
    next: Option<usize>,
}

impl<'a> NalScanner<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            next: Some(0),
        }
    }

    /// Offset of the next start code, or `None` once the buffer is used up.
    pub fn cursor(&self) -> Option<usize> {
        self.next
    }

    /// Locate the next NAL unit.
    ///
    /// Returns [`PackError::MalformedInput`] when the cursor does not sit on
    /// a start code. The scanner is finished after that and yields `None`.
    pub fn next_unit(&mut self) -> Result<Option<NalUnit<'a>>> {
        let Some(pos) = self.next.take() else {
            return Ok(None);
        };
        if pos >= self.data.len() {
            return Ok(None);
        }

        let sc_len =
            start_code_len(&self.data[pos..]).ok_or(PackError::MalformedInput { offset: pos })?;

        let header_at = pos + sc_len;
        if header_at >= self.data.len() {
            // Trailing start code with no header byte behind it.
            return Ok(None);
        }

        // The header byte can never begin a start code, so the search starts after it.
        let mut end = header_at + 1;
        while end < self.data.len() {
            if start_code_len(&self.data[end..]).is_some() {
                self.next = Some(end);
                break;
            }
            end += 1;
        }

        let data = &self.data[header_at..end];
        Ok(Some(NalUnit {
            offset: pos,
            start_code_len: sc_len,
            header: NalHeader::from_byte(data[0]),
            data,
        }))
    }
}

impl<'a> Iterator for NalScanner<'a> {
    type Item = Result<NalUnit<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_unit().transpose()
    }
}

/// Split an Annex B stream into chunks that each end with a coded slice.
///
/// Parameter sets and SEI travel with the picture that follows them. Any
/// non-VCL units after the final slice form a last chunk of their own.
/// Every chunk starts with a start code, so it can be handed to
/// [`RtpPacker::put`](crate::RtpPacker::put) directly.
pub fn split_access_units(data: &[u8]) -> Result<Vec<&[u8]>> {
    let mut chunks = Vec::new();
    let mut chunk_start: Option<usize> = None;

    for unit in NalScanner::new(data) {
        let unit = unit?;
        let start = *chunk_start.get_or_insert(unit.offset);
        if unit.header.is_vcl() {
            let end = unit.offset + unit.start_code_len + unit.len();
            chunks.push(&data[start..end]);
            chunk_start = None;
        }
    }

    if let Some(start) = chunk_start {
        chunks.push(&data[start..]);
    }

    tracing::trace!(chunks = chunks.len(), bytes = data.len(), "split access units");
    Ok(chunks)
}
