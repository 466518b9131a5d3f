//! RTP packet model and wire codec per RFC3550: fixed header, CSRC list,
//! generic header extension (carrying FEC symbol metadata), and the
//! monotonic-to-NTP time helper RTCP needs for SR timestamps.

pub mod config;
pub mod rtp_error;
pub mod rtp_header;
pub mod rtp_header_extension;
pub mod rtp_packet;
pub mod time;
