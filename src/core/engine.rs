use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::core::engine_error::EngineError;
use crate::core::events::EngineEvent;
use crate::core::frame::{Frame, FormatDescriptor};
use crate::core::queue::BoundedQueue;
use crate::log::log_sink::LogSink;
use crate::media_agent::codec_engine::{CodecEngine, EncodedPacket, HardwarePreference};
use crate::media_agent::decoder_stage::{DecodableUnit, DecoderStage, PeerFrame};
use crate::media_agent::encoder_stage::EncoderStage;
use crate::room::{MediaKind, UserManager};
use crate::rtp_session::rtp_codec::RtpCodec;
use crate::rtp_session::rtp_send_config::RtpSendConfig;
use crate::rtp_session::rtp_session::{DEFAULT_SYMBOL_SIZE, RtpSession};
use crate::{sink_error, sink_info, sink_warn};

const VIDEO_PAYLOAD_TYPE: u8 = 97;
const VIDEO_CLOCK_RATE: u32 = 90_000;
const AUDIO_PAYLOAD_TYPE: u8 = 99;
const AUDIO_CLOCK_RATE: u32 = 48_000;
const AUDIO_PORT_OFFSET: u16 = 2;
/// Upper bound on events drained by one `poll()` call, so a burst of RTCP
/// activity can't make the host's poll loop stall indefinitely.
const POLL_BATCH_CAP: usize = 64;

type VideoCodecFactory =
    dyn Fn(&FormatDescriptor) -> Box<dyn CodecEngine<Frame, EncodedPacket>> + Send + Sync;
type DecoderMaker = dyn Fn(u8) -> Box<dyn CodecEngine<DecodableUnit, Frame>> + Send + Sync;

/// The video/audio send pair, their sockets, and the stages wired around
/// them for one joined room. Torn down and dropped whole on `leave_room`;
/// `join_room` always builds a fresh one. Each `RtpSession` drives its own
/// FEC-send and bandwidth-sampling threads internally once started; the
/// stages here only move frames in and out of its queues.
struct RoomState {
    name: String,
    video_session: RtpSession,
    audio_session: RtpSession,
    video_encoder: EncoderStage,
    audio_encoder: EncoderStage,
    decoder_stage: DecoderStage,
    /// Shared by every socket-reader thread this room spun up; the
    /// sessions' own internal threads are stopped via `RtpSession::stop`.
    stop: Arc<AtomicBool>,
}

/// Facade over the whole capture-to-display pipeline (C12): one room at a
/// time, one `UserManager` shared by every peer, and host-facing queues for
/// raw capture in and decoded frames out. The host drives capture and
/// rendering itself and drains `poll()` to learn about membership and
/// link-quality changes; nothing here blocks the caller.
///
/// Grounded on the instruction-channel engine this crate used to coordinate
/// ICE/DTLS/SCTP negotiation: same "host polls an mpsc channel for events"
/// contract, now serving a room-membership/bandwidth event set instead of a
/// signaling one. Unlike that engine, no internal relay thread sits between
/// the event producers and the host: nothing here needs to react to its own
/// events before forwarding them, so `poll()` drains the producer channel
/// directly.
pub struct Engine {
    logger: Arc<dyn LogSink>,
    #[allow(dead_code)]
    config: Arc<Config>,

    event_tx: Sender<EngineEvent>,
    event_rx: Mutex<Receiver<EngineEvent>>,

    users: Arc<Mutex<UserManager>>,

    local_name: Mutex<Option<String>>,
    destination: Mutex<Option<(IpAddr, u16)>>,
    push_enabled: Arc<AtomicBool>,

    video_codec_factory: Mutex<Option<Arc<VideoCodecFactory>>>,
    audio_codec_factory: Mutex<Option<Arc<VideoCodecFactory>>>,
    decoder_factory: Mutex<Option<Arc<DecoderMaker>>>,

    capture_video_in: Arc<BoundedQueue<Frame>>,
    capture_audio_in: Arc<BoundedQueue<Frame>>,
    decoder_input: Arc<BoundedQueue<DecodableUnit>>,
    remote_frames: Arc<BoundedQueue<PeerFrame>>,

    queue_cap: usize,
    fec_symbol_size: u16,

    room: Mutex<Option<RoomState>>,
}

impl Engine {
    pub fn new(config: Arc<Config>, logger: Arc<dyn LogSink>) -> Self {
        let (event_tx, event_rx) = mpsc::channel();

        let queue_cap: usize = config
            .get_or_default("Media", "queue_cap", "10")
            .parse()
            .unwrap_or(10);
        let fec_symbol_size: u16 = config
            .get_or_default("Fec", "symbol_size", "1024")
            .parse()
            .unwrap_or(DEFAULT_SYMBOL_SIZE);

        Self {
            users: Arc::new(Mutex::new(UserManager::new(logger.clone()))),
            logger,
            config,
            event_tx,
            event_rx: Mutex::new(event_rx),
            local_name: Mutex::new(None),
            destination: Mutex::new(None),
            push_enabled: Arc::new(AtomicBool::new(true)),
            video_codec_factory: Mutex::new(None),
            audio_codec_factory: Mutex::new(None),
            decoder_factory: Mutex::new(None),
            capture_video_in: BoundedQueue::new(queue_cap),
            capture_audio_in: BoundedQueue::new(queue_cap),
            decoder_input: BoundedQueue::new(queue_cap),
            remote_frames: BoundedQueue::new(queue_cap),
            queue_cap,
            fec_symbol_size,
            room: Mutex::new(None),
        }
    }

    /// Sets the display name advertised to peers via RTCP SDES. Must
    /// succeed before `join_room`.
    pub fn set_local_name(&self, name: impl Into<String>) -> Result<(), EngineError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EngineError::NotNamed);
        }
        *self.local_name.lock()? = Some(name);
        Ok(())
    }

    /// Sets the remote peer's address and the base RTP port. Video binds
    /// `port_base`, audio binds `port_base + 2`, each multiplexing RTP and
    /// RTCP on the one socket. Takes effect on the next `join_room`.
    pub fn set_destination(&self, ip: IpAddr, port_base: u16) -> Result<(), EngineError> {
        *self.destination.lock()? = Some((ip, port_base));
        Ok(())
    }

    /// Registers the factory used to build a fresh video codec engine on
    /// format change. Required before `join_room`.
    pub fn set_video_codec_factory<F>(&self, factory: F) -> Result<(), EngineError>
    where
        F: Fn(&FormatDescriptor) -> Box<dyn CodecEngine<Frame, EncodedPacket>>
            + Send
            + Sync
            + 'static,
    {
        *self.video_codec_factory.lock()? = Some(Arc::new(factory));
        Ok(())
    }

    /// Registers the factory used to build a fresh audio codec engine on
    /// format change. Required before `join_room`.
    pub fn set_audio_codec_factory<F>(&self, factory: F) -> Result<(), EngineError>
    where
        F: Fn(&FormatDescriptor) -> Box<dyn CodecEngine<Frame, EncodedPacket>>
            + Send
            + Sync
            + 'static,
    {
        *self.audio_codec_factory.lock()? = Some(Arc::new(factory));
        Ok(())
    }

    /// Registers the factory used to build a fresh decoder for a peer's
    /// track, keyed by RTP payload type. Required before `join_room`.
    pub fn set_decoder_factory<F>(&self, factory: F) -> Result<(), EngineError>
    where
        F: Fn(u8) -> Box<dyn CodecEngine<DecodableUnit, Frame>> + Send + Sync + 'static,
    {
        *self.decoder_factory.lock()? = Some(Arc::new(factory));
        Ok(())
    }

    /// Queue the host pushes captured raw video frames onto. Stable across
    /// room transitions; frames pushed while no room is joined simply
    /// accumulate and head-drop per the queue's normal overflow rule.
    pub fn video_input(&self) -> Arc<BoundedQueue<Frame>> {
        Arc::clone(&self.capture_video_in)
    }

    /// Queue the host pushes captured raw audio frames onto. Same lifecycle
    /// note as `video_input`.
    pub fn audio_input(&self) -> Arc<BoundedQueue<Frame>> {
        Arc::clone(&self.capture_audio_in)
    }

    /// Queue the host polls for decoded remote frames, tagged with the
    /// owning peer's name and media kind.
    pub fn remote_frames(&self) -> Arc<BoundedQueue<PeerFrame>> {
        Arc::clone(&self.remote_frames)
    }

    /// Name of the currently joined room, if any.
    pub fn current_room(&self) -> Option<String> {
        self.room.lock().ok()?.as_ref().map(|rs| rs.name.clone())
    }

    /// Drains queued events for the host to dispatch to its own
    /// `on_user_join`/`on_user_leave`/`on_upload_bandwidth`/
    /// `on_download_bandwidth`/`on_local_network` callbacks. Never blocks;
    /// returns an empty vec if nothing is pending.
    pub fn poll(&self) -> Vec<EngineEvent> {
        let mut out = Vec::new();
        let rx = self.event_rx.lock().unwrap_or_else(|e| e.into_inner());
        while out.len() < POLL_BATCH_CAP {
            match rx.try_recv() {
                Ok(evt) => out.push(evt),
                Err(_) => break,
            }
        }
        out
    }

    /// Toggles whether encoded frames are actually sent, without tearing
    /// the session down; the SDES push-flag reflects the new state on the
    /// next RTCP tick either way.
    pub fn enable_push(&self, enabled: bool) -> Result<(), EngineError> {
        self.push_enabled.store(enabled, Ordering::SeqCst);
        if let Some(rs) = self.room.lock()?.as_ref() {
            rs.video_session.set_push_enabled(enabled);
            rs.audio_session.set_push_enabled(enabled);
        }
        Ok(())
    }

    /// Binds video/audio sockets to the configured destination, starts both
    /// `RtpSession`s, wires capture-in -> encode -> FEC-send and
    /// FEC-receive -> decode -> `remote_frames`, and starts the bandwidth
    /// sampler. Fails without touching any running state if a prerequisite
    /// (name, destination, codec factories) is missing or a room is already
    /// joined.
    pub fn join_room(&self, name: impl Into<String>) -> Result<(), EngineError> {
        if self.room.lock()?.is_some() {
            return Err(EngineError::AlreadyInRoom);
        }
        let room_name = name.into();
        let local_name = self
            .local_name
            .lock()?
            .clone()
            .ok_or(EngineError::NotNamed)?;
        let (dest_ip, port_base) = self.destination.lock()?.ok_or(EngineError::NoDestination)?;
        let video_factory = self
            .video_codec_factory
            .lock()?
            .clone()
            .ok_or(EngineError::MissingCodecFactory("video encoder"))?;
        let audio_factory = self
            .audio_codec_factory
            .lock()?
            .clone()
            .ok_or(EngineError::MissingCodecFactory("audio encoder"))?;
        let decoder_factory = self
            .decoder_factory
            .lock()?
            .clone()
            .ok_or(EngineError::MissingCodecFactory("decoder"))?;

        let stop = Arc::new(AtomicBool::new(false));

        let video_peer = SocketAddr::new(dest_ip, port_base);
        let audio_peer = SocketAddr::new(dest_ip, port_base + AUDIO_PORT_OFFSET);
        let (video_sock, video_rx) =
            bind_and_pump(port_base, video_peer, Arc::clone(&stop), self.logger.clone())?;
        let (audio_sock, audio_rx) = bind_and_pump(
            port_base + AUDIO_PORT_OFFSET,
            audio_peer,
            Arc::clone(&stop),
            self.logger.clone(),
        )?;

        let video_codec =
            RtpCodec::with_name(VIDEO_PAYLOAD_TYPE, VIDEO_CLOCK_RATE, MediaKind::Video, "video");
        let audio_codec =
            RtpCodec::with_name(AUDIO_PAYLOAD_TYPE, AUDIO_CLOCK_RATE, MediaKind::Audio, "audio");
        let video_send_cfg = RtpSendConfig::new(video_codec);
        let audio_send_cfg = RtpSendConfig::new(audio_codec);
        let video_ssrc = video_send_cfg.local_ssrc;
        let audio_ssrc = audio_send_cfg.local_ssrc;

        let mut video_session = RtpSession::new(
            video_sock,
            video_peer,
            self.event_tx.clone(),
            self.logger.clone(),
            video_rx,
            Arc::clone(&self.users),
            local_name.clone(),
            room_name.clone(),
            Vec::new(),
            vec![video_send_cfg],
        )?;
        let mut audio_session = RtpSession::new(
            audio_sock,
            audio_peer,
            self.event_tx.clone(),
            self.logger.clone(),
            audio_rx,
            Arc::clone(&self.users),
            local_name,
            room_name.clone(),
            Vec::new(),
            vec![audio_send_cfg],
        )?;

        video_session.set_decoder_input(Some(Arc::clone(&self.decoder_input)));
        audio_session.set_decoder_input(Some(Arc::clone(&self.decoder_input)));
        let pushing = self.push_enabled.load(Ordering::SeqCst);
        video_session.set_push_enabled(pushing);
        audio_session.set_push_enabled(pushing);

        let video_encoded = BoundedQueue::new(self.queue_cap);
        let audio_encoded = BoundedQueue::new(self.queue_cap);
        video_session.set_encoded_input(
            Some(Arc::clone(&video_encoded)),
            video_ssrc,
            VIDEO_CLOCK_RATE,
            self.fec_symbol_size,
        );
        audio_session.set_encoded_input(
            Some(Arc::clone(&audio_encoded)),
            audio_ssrc,
            AUDIO_CLOCK_RATE,
            self.fec_symbol_size,
        );

        video_session.start()?;
        audio_session.start()?;

        let mut video_encoder = EncoderStage::new();
        video_encoder.set_input(Some(Arc::clone(&self.capture_video_in)));
        video_encoder.set_output(Some(Arc::clone(&video_encoded)));
        video_encoder.start(
            "video-encoder",
            Box::new(move |fmt| (*video_factory)(fmt)),
            HardwarePreference::Auto,
            None,
            None,
            self.logger.clone(),
        );

        let mut audio_encoder = EncoderStage::new();
        audio_encoder.set_input(Some(Arc::clone(&self.capture_audio_in)));
        audio_encoder.set_output(Some(Arc::clone(&audio_encoded)));
        audio_encoder.start(
            "audio-encoder",
            Box::new(move |fmt| (*audio_factory)(fmt)),
            HardwarePreference::Auto,
            None,
            None,
            self.logger.clone(),
        );

        let mut decoder_stage = DecoderStage::new();
        decoder_stage.set_input(Some(Arc::clone(&self.decoder_input)));
        decoder_stage.set_output(Some(Arc::clone(&self.remote_frames)));
        decoder_stage.start(
            "decoder",
            Box::new(move |pt| (*decoder_factory)(pt)),
            HardwarePreference::Auto,
            self.logger.clone(),
        );

        *self.room.lock()? = Some(RoomState {
            name: room_name,
            video_session,
            audio_session,
            video_encoder,
            audio_encoder,
            decoder_stage,
            stop,
        });

        sink_info!(self.logger, "[Engine] joined room");
        let _ = self.event_tx.send(EngineEvent::Established);
        Ok(())
    }

    /// Sends BYE on both sessions, stops every stage and background thread
    /// this room started, and clears membership. Capture/render queues are
    /// untouched: the host's capture loop keeps running regardless.
    pub fn leave_room(&self, reason: Option<String>) -> Result<(), EngineError> {
        let mut rs = {
            let mut guard = self.room.lock()?;
            guard.take().ok_or(EngineError::NotInRoom)?
        };

        rs.stop.store(true, Ordering::SeqCst);
        if let Err(e) = rs.video_session.send_bye(reason.clone()) {
            sink_warn!(self.logger, "[Engine] video BYE failed: {e}");
        }
        if let Err(e) = rs.audio_session.send_bye(reason) {
            sink_warn!(self.logger, "[Engine] audio BYE failed: {e}");
        }
        rs.video_session.stop();
        rs.audio_session.stop();
        rs.video_encoder.stop();
        rs.audio_encoder.stop();
        rs.decoder_stage.stop();

        self.decoder_input.clear();
        self.users.lock()?.clear_all();

        let _ = self.event_tx.send(EngineEvent::Closing { graceful: true });
        let _ = self.event_tx.send(EngineEvent::Closed);
        sink_info!(self.logger, "[Engine] left room {}", rs.name);
        Ok(())
    }
}

fn bind_and_pump(
    local_port: u16,
    peer: SocketAddr,
    stop: Arc<AtomicBool>,
    logger: Arc<dyn LogSink>,
) -> Result<(Arc<UdpSocket>, Receiver<Vec<u8>>), EngineError> {
    let sock = UdpSocket::bind(("0.0.0.0", local_port))?;
    sock.set_read_timeout(Some(Duration::from_millis(200)))?;
    let sock = Arc::new(sock);
    let (tx, rx) = mpsc::channel();

    let sock2 = Arc::clone(&sock);
    thread::spawn(move || {
        let mut buf = [0u8; 2048];
        while !stop.load(Ordering::SeqCst) {
            match sock2.recv_from(&mut buf) {
                Ok((n, from)) => {
                    if from.ip() != peer.ip() {
                        continue;
                    }
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    sink_error!(logger, "[Engine] socket read error on port {local_port}: {e}");
                }
            }
        }
    });

    Ok((sock, rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::noop_log_sink::NoopLogSink;
    use crate::media_agent::media_agent_error::Result as MaResult;

    struct NullEngine;

    impl CodecEngine<Frame, EncodedPacket> for NullEngine {
        fn configure(&mut self, _format: &FormatDescriptor, _hw: &HardwarePreference) -> MaResult<()> {
            Ok(())
        }
        fn submit(&mut self, _unit: Option<Frame>) -> MaResult<()> {
            Ok(())
        }
        fn drain(&mut self) -> MaResult<Vec<EncodedPacket>> {
            Ok(Vec::new())
        }
        fn close(&mut self) {}
    }

    impl CodecEngine<DecodableUnit, Frame> for NullEngine {
        fn configure(&mut self, _format: &FormatDescriptor, _hw: &HardwarePreference) -> MaResult<()> {
            Ok(())
        }
        fn submit(&mut self, _unit: Option<DecodableUnit>) -> MaResult<()> {
            Ok(())
        }
        fn drain(&mut self) -> MaResult<Vec<Frame>> {
            Ok(Vec::new())
        }
        fn close(&mut self) {}
    }

    fn engine() -> Engine {
        Engine::new(Arc::new(Config::empty()), Arc::new(NoopLogSink))
    }

    #[test]
    fn join_room_requires_name_destination_and_factories() {
        let e = engine();
        assert!(matches!(e.join_room("room"), Err(EngineError::NotNamed)));

        e.set_local_name("alice").unwrap();
        assert!(matches!(
            e.join_room("room"),
            Err(EngineError::NoDestination)
        ));

        e.set_destination(IpAddr::from([127, 0, 0, 1]), 20_000).unwrap();
        assert!(matches!(
            e.join_room("room"),
            Err(EngineError::MissingCodecFactory("video encoder"))
        ));
    }

    #[test]
    fn leave_room_without_join_fails() {
        let e = engine();
        assert!(matches!(e.leave_room(None), Err(EngineError::NotInRoom)));
    }

    #[test]
    fn join_then_join_again_rejected() {
        let e = engine();
        e.set_local_name("alice").unwrap();
        e.set_destination(IpAddr::from([127, 0, 0, 1]), 20_010).unwrap();
        e.set_video_codec_factory(|_fmt| Box::new(NullEngine) as Box<dyn CodecEngine<Frame, EncodedPacket>>)
            .unwrap();
        e.set_audio_codec_factory(|_fmt| Box::new(NullEngine) as Box<dyn CodecEngine<Frame, EncodedPacket>>)
            .unwrap();
        e.set_decoder_factory(|_pt| Box::new(NullEngine) as Box<dyn CodecEngine<DecodableUnit, Frame>>)
            .unwrap();

        e.join_room("room").expect("first join succeeds");
        assert_eq!(e.current_room(), Some("room".to_string()));
        assert!(matches!(
            e.join_room("room"),
            Err(EngineError::AlreadyInRoom)
        ));

        e.leave_room(None).expect("leave succeeds");
        assert_eq!(e.current_room(), None);
    }
}
