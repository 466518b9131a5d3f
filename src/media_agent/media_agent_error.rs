use std::fmt;

/// Errors surfaced by the codec engine boundary and the stages that drive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaAgentError {
    /// The engine was asked to configure a format it cannot handle at all
    /// (e.g. an audio engine handed a video format).
    FormatInvalid,
    /// No codec implementation is available for the requested format/payload
    /// type combination.
    CodecUnavailable(String),
    /// Hardware acceleration was requested (or auto-selected) and failed to
    /// initialize.
    HardwareInitFailed(String),
    /// A single frame failed to encode or decode. The stage skips the frame
    /// and continues; the engine itself is assumed still usable.
    FrameFailed(String),
    /// The engine's internal context is no longer usable until the next
    /// format change reconfigures it from scratch.
    ContextDisabled(String),
}

impl fmt::Display for MediaAgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use MediaAgentError::*;
        match self {
            FormatInvalid => write!(f, "format is not valid for this engine"),
            CodecUnavailable(what) => write!(f, "no codec available: {what}"),
            HardwareInitFailed(why) => write!(f, "hardware acceleration init failed: {why}"),
            FrameFailed(why) => write!(f, "frame failed: {why}"),
            ContextDisabled(why) => write!(f, "codec context disabled: {why}"),
        }
    }
}

impl std::error::Error for MediaAgentError {}

pub type Result<T> = std::result::Result<T, MediaAgentError>;
