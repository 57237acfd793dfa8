//! H.264 RTP packetization.
//!
//! Turns buffers of Annex B NAL units into RTP packets (RFC 3550 header,
//! RFC 6184 payload format).
//!
//! ## RTP overview (RFC 3550)
//!
//! Every RTP packet carries a 12-byte fixed header ([`rtp::RtpHeader`])
//! containing:
//!
//! - **Sequence number** (16-bit, wrapping): for reordering and loss detection.
//! - **Timestamp** (32-bit): 90 kHz media clock for video.
//! - **SSRC** (32-bit): identifies the sender.
//! - **Marker bit**: here, set on the last packet of each NAL unit.
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`nal`] | Annex B start code scanning, NAL header decoding |
//! | [`h264`] | Single NAL unit / FU-A state machine ([`h264::RtpPacker`]) |
//! | [`rtp`] | RTP fixed header, FU indicator and FU header packing |
//! | [`buffer`] | Bounded scratch buffer packets are built in |
//! | [`sdp`] | SDP description for receivers |

pub mod buffer;
pub mod h264;
pub mod nal;
pub mod rtp;
pub mod sdp;
