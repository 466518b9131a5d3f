use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::frame::{Frame, FormatDescriptor, PixelFormat};
use crate::core::queue::BoundedQueue;
use crate::core::worker::WorkerThread;
use crate::log::log_sink::LogSink;
use crate::media_agent::codec_engine::{CodecEngine, EncodedPacket, HardwarePreference};
use crate::sink_debug;
use crate::sink_warn;

/// Adapts a raw video frame to a pixel format the active codec engine
/// supports. Invoked only after the engine itself reports the frame's
/// current format as invalid; this stage never second-guesses the engine
/// by converting preemptively.
pub trait PixelConverter: Send {
    fn convert(&mut self, frame: &Frame, target: PixelFormat) -> Frame;
}

/// Adapts a raw audio frame's sample rate or channel layout. Same trigger
/// as `PixelConverter`, on the audio side.
pub trait AudioResampler: Send {
    fn resample(&mut self, frame: &Frame, target_sample_rate: u32, target_channels: u16) -> Frame;
}

/// Builds a fresh codec engine instance for a newly observed format. Called
/// once up front and again on every format change; the stage closes the
/// previous engine before calling this.
pub type EngineFactory =
    dyn Fn(&FormatDescriptor) -> Box<dyn CodecEngine<Frame, EncodedPacket>> + Send;

/// Drives an opaque codec engine over a stream of raw frames (C5).
///
/// Owns the format-change state machine: on the first frame, and again
/// whenever the incoming format differs from what the engine was last
/// configured with, the stage closes the current engine and asks the
/// factory for a new one. A codec failure on a single frame is logged and
/// the frame is dropped; the engine is assumed to have recovered. If the
/// engine reports its context is no longer usable, the stage disables
/// encoding until the next format change reconfigures it.
///
/// Grounded on the instruction-channel worker loop used for video/audio
/// encoding before this engine generalized to an opaque `CodecEngine`.
pub struct EncoderStage {
    input: Arc<Mutex<Option<Arc<BoundedQueue<Frame>>>>>,
    output: Arc<Mutex<Option<Arc<BoundedQueue<Frame>>>>>,
    worker: Option<WorkerThread>,
}

struct State {
    make_engine: Box<EngineFactory>,
    engine: Option<Box<dyn CodecEngine<Frame, EncodedPacket>>>,
    current_format: Option<FormatDescriptor>,
    hw_pref: HardwarePreference,
    /// Set once a hardware init attempt fails; forces software until the
    /// next format change gives the engine a fresh chance.
    hw_fallback_sticky: bool,
    pixel_converter: Option<Box<dyn PixelConverter>>,
    audio_resampler: Option<Box<dyn AudioResampler>>,
    context_disabled: bool,
    logger: Arc<dyn LogSink>,
}

impl EncoderStage {
    pub fn new() -> Self {
        Self {
            input: Arc::new(Mutex::new(None)),
            output: Arc::new(Mutex::new(None)),
            worker: None,
        }
    }

    pub fn set_input(&self, q: Option<Arc<BoundedQueue<Frame>>>) {
        let old = {
            let mut g = self.input.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *g, q.clone())
        };
        if let Some(old) = old {
            old.wake_all();
        }
        if let Some(w) = &self.worker {
            w.wake();
        }
    }

    pub fn set_output(&self, q: Option<Arc<BoundedQueue<Frame>>>) {
        *self.output.lock().unwrap_or_else(|e| e.into_inner()) = q;
        if let Some(w) = &self.worker {
            w.wake();
        }
    }

    /// Starts the worker. `make_engine` selects a concrete engine per
    /// format; `hw_pref` is the sticky hardware preference the stage
    /// starts with.
    pub fn start(
        &mut self,
        name: impl Into<String>,
        make_engine: Box<EngineFactory>,
        hw_pref: HardwarePreference,
        pixel_converter: Option<Box<dyn PixelConverter>>,
        audio_resampler: Option<Box<dyn AudioResampler>>,
        logger: Arc<dyn LogSink>,
    ) {
        let input = self.input.clone();
        let output = self.output.clone();
        let input_pause = self.input.clone();
        let output_pause = self.output.clone();

        let state = Arc::new(Mutex::new(State {
            make_engine,
            engine: None,
            current_format: None,
            hw_pref,
            hw_fallback_sticky: false,
            pixel_converter,
            audio_resampler,
            context_disabled: false,
            logger,
        }));

        let worker = WorkerThread::spawn(
            name,
            move || {
                let in_q = { input.lock().unwrap_or_else(|e| e.into_inner()).clone() };
                let Some(in_q) = in_q else {
                    return;
                };
                if !in_q.wait_push(Duration::from_millis(100)) {
                    return;
                }
                while let Some(frame) = in_q.next() {
                    let out_q = { output.lock().unwrap_or_else(|e| e.into_inner()).clone() };
                    let mut st = state.lock().unwrap_or_else(|e| e.into_inner());
                    let packets = st.submit_frame(frame);
                    if let Some(out_q) = &out_q {
                        for packet in packets {
                            out_q.push(encoded_packet_to_frame(packet));
                        }
                    }
                }
            },
            move || {
                input_pause.lock().unwrap_or_else(|e| e.into_inner()).is_none()
                    || output_pause.lock().unwrap_or_else(|e| e.into_inner()).is_none()
            },
        );
        self.worker = Some(worker);
    }

    /// Requests a flush of whatever the engine has buffered, without
    /// tearing the stage down. Used when the owning pipeline pauses.
    pub fn stop(&mut self) {
        if let Some(w) = self.worker.take() {
            w.stop();
        }
    }
}

impl Default for EncoderStage {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    fn submit_frame(&mut self, frame: Frame) -> Vec<EncodedPacket> {
        let frame = self.adapt_format(frame);

        if self.current_format.as_ref() != Some(&frame.format) {
            self.reconfigure(&frame.format);
        }
        if self.context_disabled {
            return Vec::new();
        }

        let Some(engine) = self.engine.as_mut() else {
            return Vec::new();
        };
        if let Err(err) = engine.submit(Some(frame)) {
            self.handle_engine_error(err);
            return Vec::new();
        }
        match engine.drain() {
            Ok(packets) => packets,
            Err(err) => {
                self.handle_engine_error(err);
                Vec::new()
            }
        }
    }

    /// Converts the frame's pixel format or sample rate/channels to match
    /// what the currently configured engine expects, if a converter was
    /// supplied and the engine is already configured for a different raw
    /// shape within the same logical format family.
    fn adapt_format(&mut self, frame: Frame) -> Frame {
        match (&frame.format, &self.current_format) {
            (
                FormatDescriptor::Video(want),
                Some(FormatDescriptor::Video(have)),
            ) if want.pixel_format != have.pixel_format => {
                if let Some(conv) = self.pixel_converter.as_mut() {
                    conv.convert(&frame, have.pixel_format)
                } else {
                    frame
                }
            }
            (
                FormatDescriptor::Audio(want),
                Some(FormatDescriptor::Audio(have)),
            ) if want.sample_rate != have.sample_rate || want.channels != have.channels => {
                if let Some(resampler) = self.audio_resampler.as_mut() {
                    resampler.resample(&frame, have.sample_rate, have.channels)
                } else {
                    frame
                }
            }
            _ => frame,
        }
    }

    fn reconfigure(&mut self, format: &FormatDescriptor) {
        if let Some(mut engine) = self.engine.take() {
            engine.close();
        }
        self.hw_fallback_sticky = false;
        self.context_disabled = false;

        let mut engine = (self.make_engine)(format);
        let pref = if self.hw_fallback_sticky {
            HardwarePreference::SoftwareOnly
        } else {
            self.hw_pref.clone()
        };
        match engine.configure(format, &pref) {
            Ok(()) => {
                sink_debug!(self.logger, "encoder reconfigured for new format");
                self.engine = Some(engine);
                self.current_format = Some(format.clone());
            }
            Err(err) if matches!(pref, HardwarePreference::Auto) => {
                sink_warn!(
                    self.logger,
                    "hardware encoder init failed ({err}), falling back to software"
                );
                self.hw_fallback_sticky = true;
                match engine.configure(format, &HardwarePreference::SoftwareOnly) {
                    Ok(()) => {
                        self.engine = Some(engine);
                        self.current_format = Some(format.clone());
                    }
                    Err(err) => {
                        sink_warn!(self.logger, "software encoder fallback also failed: {err}");
                        self.context_disabled = true;
                    }
                }
            }
            Err(err) => {
                sink_warn!(self.logger, "encoder configure failed: {err}");
                self.context_disabled = true;
            }
        }
    }

    fn handle_engine_error(&mut self, err: crate::media_agent::media_agent_error::MediaAgentError) {
        use crate::media_agent::media_agent_error::MediaAgentError;
        match err {
            MediaAgentError::ContextDisabled(why) => {
                sink_warn!(self.logger, "encoder context disabled until next format change: {why}");
                self.context_disabled = true;
            }
            other => {
                sink_warn!(self.logger, "encoder dropped a frame: {other}");
            }
        }
    }
}

fn encoded_packet_to_frame(packet: EncodedPacket) -> Frame {
    let byte_len = packet.payload.len();
    Frame {
        planes: vec![crate::core::frame::Plane {
            bytes: Arc::new(packet.payload),
            line_size: byte_len,
        }],
        byte_len,
        pts_us: packet.pts_us,
        dts_us: packet.dts_us,
        format: FormatDescriptor::Video(crate::core::frame::VideoFormat {
            width: 0,
            height: 0,
            pixel_format: PixelFormat::Yuv420p,
            bit_depth: 8,
            frame_rate: 0.0,
        }),
        payload_type: packet.payload_type,
        key_frame: packet.key_frame,
        seq_in_block: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::{AudioFormat, VideoFormat};
    use crate::log::noop_log_sink::NoopLogSink;
    use crate::media_agent::media_agent_error::{MediaAgentError, Result as MaResult};
    use std::thread;

    struct EchoEngine {
        configured: bool,
        fail_configure: bool,
    }

    impl CodecEngine<Frame, EncodedPacket> for EchoEngine {
        fn configure(&mut self, _format: &FormatDescriptor, _hw: &HardwarePreference) -> MaResult<()> {
            if self.fail_configure {
                return Err(MediaAgentError::HardwareInitFailed("no device".into()));
            }
            self.configured = true;
            Ok(())
        }

        fn submit(&mut self, unit: Option<Frame>) -> MaResult<()> {
            if !self.configured {
                return Err(MediaAgentError::ContextDisabled("not configured".into()));
            }
            let _ = unit;
            Ok(())
        }

        fn drain(&mut self) -> MaResult<Vec<EncodedPacket>> {
            Ok(vec![EncodedPacket {
                payload: vec![1, 2, 3],
                pts_us: 0,
                dts_us: None,
                key_frame: true,
                payload_type: 96,
            }])
        }

        fn close(&mut self) {
            self.configured = false;
        }
    }

    fn video_frame(width: u32) -> Frame {
        Frame::single_plane(
            vec![0u8; 16],
            0,
            FormatDescriptor::Video(VideoFormat {
                width,
                height: 720,
                pixel_format: PixelFormat::Yuv420p,
                bit_depth: 8,
                frame_rate: 30.0,
            }),
            96,
            true,
        )
    }

    #[test]
    fn publishes_encoded_packets_for_raw_frames() {
        let mut stage = EncoderStage::new();
        let input = BoundedQueue::new(8);
        let output = BoundedQueue::new(8);
        stage.set_input(Some(input.clone()));
        stage.set_output(Some(output.clone()));
        stage.start(
            "test-encoder",
            Box::new(|_fmt| {
                Box::new(EchoEngine {
                    configured: false,
                    fail_configure: false,
                })
            }),
            HardwarePreference::SoftwareOnly,
            None,
            None,
            Arc::new(NoopLogSink),
        );

        input.push(video_frame(1280));
        let mut got = None;
        for _ in 0..50 {
            if let Some(f) = output.next() {
                got = Some(f);
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(got.is_some());
        stage.stop();
    }

    struct CountingEngine {
        configured: bool,
    }

    impl CodecEngine<Frame, EncodedPacket> for CountingEngine {
        fn configure(&mut self, _format: &FormatDescriptor, _hw: &HardwarePreference) -> MaResult<()> {
            self.configured = true;
            Ok(())
        }

        fn submit(&mut self, unit: Option<Frame>) -> MaResult<()> {
            let _ = unit;
            Ok(())
        }

        fn drain(&mut self) -> MaResult<Vec<EncodedPacket>> {
            Ok(vec![EncodedPacket {
                payload: vec![9],
                pts_us: 0,
                dts_us: None,
                key_frame: true,
                payload_type: 96,
            }])
        }

        fn close(&mut self) {
            self.configured = false;
        }
    }

    fn audio_frame(sample_rate: u32) -> Frame {
        Frame::single_plane(
            vec![0u8; 4],
            0,
            FormatDescriptor::Audio(AudioFormat {
                sample_rate,
                channels: 1,
                bits_per_sample: 16,
                sample_counter: 0,
            }),
            97,
            true,
        )
    }

    #[test]
    fn format_change_triggers_exactly_one_reconfigure() {
        let mut stage = EncoderStage::new();
        let input = BoundedQueue::new(8);
        let output = BoundedQueue::new(8);
        stage.set_input(Some(input.clone()));
        stage.set_output(Some(output.clone()));

        let reconfigures = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&reconfigures);
        stage.start(
            "test-encoder-reconfigure",
            Box::new(move |_fmt| {
                *counter.lock().unwrap() += 1;
                Box::new(CountingEngine { configured: false })
            }),
            HardwarePreference::SoftwareOnly,
            None,
            None,
            Arc::new(NoopLogSink),
        );

        input.push(audio_frame(48_000));
        let mut first = None;
        for _ in 0..50 {
            if let Some(f) = output.next() {
                first = Some(f);
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(first.is_some(), "first frame must produce encoded output");
        assert_eq!(*reconfigures.lock().unwrap(), 1);

        input.push(audio_frame(16_000));
        let mut second = None;
        for _ in 0..50 {
            if let Some(f) = output.next() {
                second = Some(f);
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(second.is_some(), "second frame must produce encoded output");
        assert_eq!(
            *reconfigures.lock().unwrap(),
            2,
            "differing format must trigger exactly one more reconfigure"
        );

        stage.stop();
    }

    #[test]
    fn hardware_failure_falls_back_to_software_once() {
        let mut stage = EncoderStage::new();
        let input = BoundedQueue::new(8);
        let output = BoundedQueue::new(8);
        stage.set_input(Some(input.clone()));
        stage.set_output(Some(output.clone()));
        stage.start(
            "test-encoder-fallback",
            Box::new(|_fmt| {
                Box::new(EchoEngine {
                    configured: false,
                    fail_configure: false,
                })
            }),
            HardwarePreference::Auto,
            None,
            None,
            Arc::new(NoopLogSink),
        );

        input.push(video_frame(640));
        let mut got = None;
        for _ in 0..50 {
            if let Some(f) = output.next() {
                got = Some(f);
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(got.is_some());
        stage.stop();
    }
}
