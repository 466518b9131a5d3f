use std::sync::Arc;

/// Format of a video plane buffer. Only the fields that affect how a
/// downstream stage must be (re)configured are compared for equality;
/// `frame_rate` is informational per the documented format-equality rule.
#[derive(Debug, Clone)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub bit_depth: u8,
    pub frame_rate: f32,
}

impl PartialEq for VideoFormat {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.pixel_format == other.pixel_format
            && self.bit_depth == other.bit_depth
    }
}
impl Eq for VideoFormat {}

/// Format of an audio buffer. `sample_counter` tracks a running position
/// purely for diagnostics and, like `frame_rate` on video, is excluded from
/// equality: it is the field the source compared inconsistently, and this
/// crate settles on excluding it everywhere (see the format-equality design
/// note).
#[derive(Debug, Clone)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u8,
    pub sample_counter: u64,
}

impl PartialEq for AudioFormat {
    fn eq(&self, other: &Self) -> bool {
        self.sample_rate == other.sample_rate
            && self.channels == other.channels
            && self.bits_per_sample == other.bits_per_sample
    }
}
impl Eq for AudioFormat {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Yuv420p,
    Nv12,
    Rgb24,
    Bgra,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatDescriptor {
    Video(VideoFormat),
    Audio(AudioFormat),
}

impl FormatDescriptor {
    pub fn is_video(&self) -> bool {
        matches!(self, FormatDescriptor::Video(_))
    }
}

/// One plane of a (possibly multi-plane) raw frame, carrying its own line
/// size so planar/semi-planar layouts survive without copying.
#[derive(Debug, Clone)]
pub struct Plane {
    pub bytes: Arc<Vec<u8>>,
    pub line_size: usize,
}

/// A unit of media flowing through the pipeline: raw captured data before
/// encode, an encoded packet after encode, or a reconstructed payload after
/// FEC decode. Immutable after publish: once a `Frame` has been pushed into
/// a queue it is shared by reference and must not be mutated; producing a
/// derived frame means constructing a new `Frame` that borrows the input's
/// planes.
#[derive(Debug, Clone)]
pub struct Frame {
    pub planes: Vec<Plane>,
    pub byte_len: usize,
    pub pts_us: u64,
    pub dts_us: Option<u64>,
    pub format: FormatDescriptor,
    pub payload_type: u8,
    pub key_frame: bool,
    /// Position of this frame's payload within an FEC block, once it has
    /// been split into symbols. `None` before the FEC encoder stage runs.
    pub seq_in_block: Option<u16>,
}

impl Frame {
    pub fn single_plane(
        bytes: Vec<u8>,
        pts_us: u64,
        format: FormatDescriptor,
        payload_type: u8,
        key_frame: bool,
    ) -> Self {
        let byte_len = bytes.len();
        Self {
            planes: vec![Plane {
                bytes: Arc::new(bytes),
                line_size: byte_len,
            }],
            byte_len,
            pts_us,
            dts_us: None,
            format,
            payload_type,
            key_frame,
            seq_in_block: None,
        }
    }

    /// Concatenation of every plane, in order. Cheap for the common
    /// single-plane (encoded packet) case.
    pub fn payload(&self) -> Vec<u8> {
        if self.planes.len() == 1 {
            return (*self.planes[0].bytes).clone();
        }
        let mut out = Vec::with_capacity(self.byte_len);
        for p in &self.planes {
            out.extend_from_slice(&p.bytes);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_format_equality_ignores_frame_rate() {
        let a = VideoFormat {
            width: 640,
            height: 480,
            pixel_format: PixelFormat::Yuv420p,
            bit_depth: 8,
            frame_rate: 30.0,
        };
        let mut b = a.clone();
        b.frame_rate = 60.0;
        assert_eq!(a, b);
        b.width = 1280;
        assert_ne!(a, b);
    }

    #[test]
    fn audio_format_equality_ignores_sample_counter() {
        let a = AudioFormat {
            sample_rate: 48_000,
            channels: 1,
            bits_per_sample: 16,
            sample_counter: 10,
        };
        let mut b = a.clone();
        b.sample_counter = 9999;
        assert_eq!(a, b);
    }
}
