//! RTP session management (C10): per-SSRC send/receive streams, RTCP
//! SR/RR/SDES/BYE exchange, and jitter/RTT bookkeeping.

pub mod outbound_track_handle;
pub mod rtp_codec;
pub mod rtp_recv_config;
pub mod rtp_recv_error;
pub mod rtp_recv_stream;
pub mod rtp_send_config;
pub mod rtp_send_error;
pub mod rtp_send_stream;
pub mod rtp_session;
pub mod rtp_session_error;
pub mod rx_tracker;
pub mod rx_tracker_error;
pub mod seq_ext;
pub mod tx_tracker;
