use super::rtp_recv_error::RtpRecvError;
use super::rtp_send_error::RtpSendError;
use crate::rtcp::rtcp_error::RtcpError;
use crate::rtp::rtp_error::RtpError;
use std::fmt;

#[derive(Debug)]
pub enum RtpSessionError {
    Rtcp(RtcpError),
    Rtp(RtpError),
    SendStream {
        rtp_send_error: RtpSendError,
        ssrc: u32,
    },
    RecvStream {
        rtp_recv_error: RtpRecvError,
        ssrc: u32,
    },
    SendStreamMissing {
        ssrc: u32,
    },
    EmptyMediaReceiver,
    /// A lock guarding session state was poisoned by a panicking holder.
    Mutex(String),
}

impl fmt::Display for RtpSessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RtpSessionError::*;
        match self {
            Rtcp(e) => write!(f, "RTCP error: {e}"),
            Rtp(e) => write!(f, "RTP error: {e}"),
            SendStream {
                rtp_send_error,
                ssrc,
            } => write!(
                f,
                "send RTP stream error: {rtp_send_error} with ssrc: {ssrc:#010x}"
            ),
            RecvStream {
                rtp_recv_error,
                ssrc,
            } => write!(
                f,
                "receive RTP stream error: {rtp_recv_error} with ssrc: {ssrc:#010x}"
            ),
            SendStreamMissing { ssrc } => write!(f, "no send stream for ssrc {ssrc:#010x}"),
            EmptyMediaReceiver => write!(f, "media receiver already taken"),
            Mutex(why) => write!(f, "session lock poisoned: {why}"),
        }
    }
}

impl std::error::Error for RtpSessionError {}

impl From<RtcpError> for RtpSessionError {
    fn from(e: RtcpError) -> Self {
        Self::Rtcp(e)
    }
}

impl From<RtpError> for RtpSessionError {
    fn from(e: RtpError) -> Self {
        Self::Rtp(e)
    }
}

impl<T> From<std::sync::PoisonError<T>> for RtpSessionError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Mutex(e.to_string())
    }
}
