//! SDP (Session Description Protocol) generation (RFC 4566 / RFC 8866).
//!
//! A plain RTP stream has no signalling, so receivers such as ffplay or
//! VLC are pointed at an SDP file instead:
//!
//! ```text
//! v=0                                          ← protocol version
//! o=- 0 0 IN IP4 <addr>                        ← origin
//! s=<session-name>                              ← session name
//! c=IN IP4 <addr>                               ← connection address
//! t=0 0                                         ← timing (live stream)
//! a=tool:rtp-send                               ← sender software
//! a=sendonly                                    ← direction
//! m=video <port> RTP/AVP 96                     ← media description
//! a=rtpmap:96 H264/90000                        ← codec/clock rate
//! a=fmtp:96 packetization-mode=1[;...]          ← codec parameters
//! ```

use std::net::SocketAddr;

use base64::prelude::{BASE64_STANDARD, Engine as _};

use super::nal::{NAL_TYPE_PPS, NAL_TYPE_SPS, NalScanner, NalUnit};

/// First SPS and PPS seen in the stream, for `a=fmtp` (RFC 6184 §8.1).
#[derive(Debug, Clone, Default)]
pub struct ParameterSets {
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
}

impl ParameterSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.sps.is_some() && self.pps.is_some()
    }

    /// Keep `unit` if it is the first SPS or PPS.
    pub fn observe(&mut self, unit: &NalUnit<'_>) {
        match unit.header.unit_type {
            NAL_TYPE_SPS if self.sps.is_none() => {
                self.sps = Some(unit.data.to_vec());
                tracing::debug!("H.264 SPS captured from bitstream ({} bytes)", unit.len());
            }
            NAL_TYPE_PPS if self.pps.is_none() => {
                self.pps = Some(unit.data.to_vec());
                tracing::debug!("H.264 PPS captured from bitstream ({} bytes)", unit.len());
            }
            _ => {}
        }
    }

    /// Scan an Annex B buffer for parameter sets. Malformed input is ignored
    /// here; the packetizer reports it.
    pub fn capture(&mut self, buffer: &[u8]) {
        if self.is_complete() {
            return;
        }
        for unit in NalScanner::new(buffer).map_while(|u| u.ok()) {
            self.observe(&unit);
        }
    }

    /// `profile_idc`, constraint flags and `level_idc`: SPS bytes 1–3.
    pub fn profile_level_id(&self) -> Option<String> {
        let sps = self.sps.as_deref()?;
        if sps.len() < 4 {
            return None;
        }
        Some(format!("{:02x}{:02x}{:02x}", sps[1], sps[2], sps[3]))
    }

    pub fn sprop_parameter_sets(&self) -> Option<String> {
        let sps = self.sps.as_deref()?;
        let pps = self.pps.as_deref()?;
        Some(format!(
            "{},{}",
            BASE64_STANDARD.encode(sps),
            BASE64_STANDARD.encode(pps)
        ))
    }
}

/// Generate an SDP description for an H.264 stream sent to `dest`.
pub fn generate_sdp(
    dest: SocketAddr,
    payload_type: u8,
    params: &ParameterSets,
    session_name: &str,
) -> String {
    let family = if dest.is_ipv4() { "IP4" } else { "IP6" };
    let ip = dest.ip();

    let mut fmtp = format!("a=fmtp:{} packetization-mode=1", payload_type);
    if let Some(pl) = params.profile_level_id() {
        fmtp.push_str(&format!(";profile-level-id={}", pl));
    }
    if let Some(sprop) = params.sprop_parameter_sets() {
        fmtp.push_str(&format!(";sprop-parameter-sets={}", sprop));
    }

    let sdp = [
        "v=0".to_string(),
        format!("o=- 0 0 IN {} {}", family, ip),
        format!("s={}", session_name),
        format!("c=IN {} {}", family, ip),
        "t=0 0".to_string(),
        "a=tool:rtp-send".to_string(),
        "a=sendonly".to_string(),
        format!("m=video {} RTP/AVP {}", dest.port(), payload_type),
        format!("a=rtpmap:{} H264/90000", payload_type),
        fmtp,
    ];

    tracing::debug!("SDP: {}", sdp.join("\r\n"));

    format!("{}\r\n", sdp.join("\r\n"))
}
