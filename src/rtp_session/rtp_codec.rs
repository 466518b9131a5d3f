use crate::room::MediaKind;

#[derive(Debug, Clone)]
pub struct RtpCodec {
    pub payload_type: u8,
    pub clock_rate: u32, // e.g., 90_000 video, 48_000 Opus
    pub name: String,
    pub kind: MediaKind,
}

impl RtpCodec {
    pub fn new(pt: u8, clock: u32, kind: MediaKind) -> Self {
        Self {
            payload_type: pt,
            clock_rate: clock,
            name: String::new(),
            kind,
        }
    }

    pub fn with_name<S: Into<String>>(pt: u8, clock: u32, kind: MediaKind, name: S) -> Self {
        Self {
            payload_type: pt,
            clock_rate: clock,
            name: name.into(),
            kind,
        }
    }
}
