use crate::core::frame::FormatDescriptor;
use crate::media_agent::media_agent_error::Result;

/// How a codec engine should pick between hardware and software
/// implementations. `Explicit` names a platform-specific accelerator
/// (e.g. `"videotoolbox"`, `"nvenc"`) and fails rather than falling back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwarePreference {
    Auto,
    SoftwareOnly,
    Explicit(String),
}

/// One encoded access unit, the engine's unit of output on the encode side
/// and its unit of input on the decode side.
#[derive(Debug, Clone)]
pub struct EncodedPacket {
    pub payload: Vec<u8>,
    pub pts_us: u64,
    pub dts_us: Option<u64>,
    pub key_frame: bool,
    pub payload_type: u8,
}

/// Opaque external collaborator: a concrete codec implementation (H264,
/// AAC, ...) that an encoder or decoder stage drives. The stage owns
/// format-change detection and the publish contract; this trait owns
/// nothing but the codec's own state machine.
///
/// `submit(None)` is the flush signal: the caller is pausing, stopping, or
/// about to reconfigure, and wants every buffered unit out of the engine
/// before that happens. A well-behaved engine returns every such unit from
/// the next `drain()` call and does not error on an empty flush.
pub trait CodecEngine<In, Out>: Send {
    /// (Re)configures the engine for a new format. Called once before the
    /// first `submit` and again whenever the input format changes.
    fn configure(&mut self, format: &FormatDescriptor, hw_pref: &HardwarePreference) -> Result<()>;

    /// Feeds one unit in, or `None` to request a flush.
    fn submit(&mut self, unit: Option<In>) -> Result<()>;

    /// Drains whatever the engine has ready. May return an empty vec if
    /// the engine is still buffering (common right after a keyframe
    /// request or during encoder lookahead).
    fn drain(&mut self) -> Result<Vec<Out>>;

    /// Releases any resources (hardware contexts, codec handles) held by
    /// the engine. The engine is not reused after this call.
    fn close(&mut self);
}
