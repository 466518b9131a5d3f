use std::{
    collections::HashMap,
    net::{SocketAddr, UdpSocket},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, RecvTimeoutError, Sender},
    },
    thread,
    time::Duration,
};

use rand::{RngCore, rngs::OsRng};

use super::{
    outbound_track_handle::OutboundTrackHandle,
    rtp_codec::RtpCodec,
    rtp_recv_config::RtpRecvConfig,
    rtp_recv_stream::{ReceivedSymbol, RtpRecvStream},
    rtp_send_config::RtpSendConfig,
    rtp_send_stream::RtpSendStream,
    rtp_session_error::RtpSessionError,
};
use crate::{
    core::events::EngineEvent,
    core::frame::Frame,
    core::queue::BoundedQueue,
    fec,
    log::{log_level::LogLevel, log_sink::LogSink},
    media_agent::decoder_stage::DecodableUnit,
    rtcp::{
        packet_type::RtcpPacketType, receiver_report::ReceiverReport, rtcp::RtcpPacket, sdes::Sdes,
    },
    room::UserManager,
    rtp::rtp_packet::RtpPacket,
    sink_debug, sink_error, sink_log, sink_warn,
};

/// What the internal FEC-sender thread needs to turn encoder output into
/// RTP: the queue to drain, which local send stream to FEC-split onto, and
/// the RTP clock rate for converting a frame's `pts_us` into a block
/// timestamp.
type EncodedInputBinding = (Arc<BoundedQueue<Frame>>, u32, u32, u16);

/// Default FEC symbol size in bytes, used when `[Fec] symbol_size` is absent
/// from configuration. Comfortably under a 1500-byte Ethernet MTU once the
/// IP/UDP/RTP/header-extension overhead is accounted for.
pub const DEFAULT_SYMBOL_SIZE: u16 = 1024;

/// One RTP session per remote peer: the send/recv streams for that peer's
/// video and audio SSRCs, RTCP SR/RR/SDES/BYE exchange with them, and the
/// FEC routing that turns their inbound symbols into decoder-ready units.
///
/// Multi-party rooms are built by running one `RtpSession` per connected
/// peer, all sharing the same `UserManager` so SSRCs from any of them
/// resolve to a single membership view.
pub struct RtpSession {
    sock: Arc<UdpSocket>,
    peer: SocketAddr,

    recv_streams: Arc<Mutex<HashMap<u32, RtpRecvStream>>>,
    pending_recv: Arc<Mutex<Vec<RtpRecvStream>>>,
    send_streams: Arc<Mutex<HashMap<u32, RtpSendStream>>>,

    users: Arc<Mutex<UserManager>>,
    decoder_input: Arc<Mutex<Option<Arc<BoundedQueue<DecodableUnit>>>>>,

    run: Arc<AtomicBool>,
    tx_evt: Sender<EngineEvent>,
    logger: Arc<dyn LogSink>,
    rx_media: Option<Receiver<Vec<u8>>>,

    local_rtcp_ssrc: u32,
    local_name: String,
    room: String,
    rtcp_interval: Duration,
    push_enabled: Arc<AtomicBool>,
    encoded_input: Arc<Mutex<Option<EncodedInputBinding>>>,
}

impl RtpSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sock: Arc<UdpSocket>,
        peer: SocketAddr,
        tx_evt: Sender<EngineEvent>,
        logger: Arc<dyn LogSink>,
        rx_media: Receiver<Vec<u8>>,
        users: Arc<Mutex<UserManager>>,
        local_name: impl Into<String>,
        room: impl Into<String>,
        initial_recv: Vec<RtpRecvConfig>,
        initial_send: Vec<RtpSendConfig>,
    ) -> Result<Self, RtpSessionError> {
        let this = Self {
            sock,
            peer,
            recv_streams: Arc::new(Mutex::new(HashMap::new())),
            pending_recv: Arc::new(Mutex::new(Vec::new())),
            send_streams: Arc::new(Mutex::new(HashMap::new())),
            users,
            decoder_input: Arc::new(Mutex::new(None)),
            run: Arc::new(AtomicBool::new(false)),
            tx_evt,
            logger,
            rx_media: Some(rx_media),
            local_rtcp_ssrc: OsRng.next_u32(),
            local_name: local_name.into(),
            room: room.into(),
            rtcp_interval: Duration::from_millis(500),
            push_enabled: Arc::new(AtomicBool::new(true)),
            encoded_input: Arc::new(Mutex::new(None)),
        };

        this.add_recv_streams(initial_recv)?;
        let _ = this.add_send_streams(initial_send)?;

        Ok(this)
    }

    /// Sets (or clears) the queue that FEC-decoded, codec-ready units are
    /// pushed onto for the decoder stage to pick up.
    pub fn set_decoder_input(&self, q: Option<Arc<BoundedQueue<DecodableUnit>>>) {
        *self.decoder_input.lock().unwrap_or_else(|e| e.into_inner()) = q;
    }

    /// Toggles the push-flag advertised in this session's SDES NOTE. Does
    /// not by itself stop `send_encoded_frame` from sending; the caller
    /// (engine facade) is expected to gate the send path too.
    pub fn set_push_enabled(&self, enabled: bool) {
        self.push_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Binds (or clears) the encoder-output queue this session's internal
    /// sender thread drains: each frame is FEC-split onto `local_ssrc` at
    /// `symbol_size`-byte symbols, with `clock_rate` used to convert the
    /// frame's `pts_us` into an RTP block timestamp. Clearing pauses the
    /// sender thread without touching RTP receive or RTCP.
    pub fn set_encoded_input(
        &self,
        queue: Option<Arc<BoundedQueue<Frame>>>,
        local_ssrc: u32,
        clock_rate: u32,
        symbol_size: u16,
    ) {
        let binding = queue.map(|q| (q, local_ssrc, clock_rate, symbol_size));
        *self
            .encoded_input
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = binding;
    }

    pub fn add_recv_stream(&self, cfg: RtpRecvConfig) -> Result<(), RtpSessionError> {
        let remote_ssrc = cfg.remote_ssrc;
        let st = RtpRecvStream::new(cfg, self.logger.clone());
        if let Some(ssrc) = remote_ssrc {
            self.recv_streams.lock()?.insert(ssrc, st);
        } else {
            self.pending_recv.lock()?.push(st);
        }
        Ok(())
    }

    pub fn add_recv_streams(&self, configs: Vec<RtpRecvConfig>) -> Result<(), RtpSessionError> {
        for cfg in configs {
            self.add_recv_stream(cfg)?;
        }
        Ok(())
    }

    pub fn add_send_stream(
        &self,
        rtp_send_config: RtpSendConfig,
    ) -> Result<OutboundTrackHandle, RtpSessionError> {
        let ssrc = rtp_send_config.local_ssrc;
        let codec = rtp_send_config.codec.clone();
        let st = RtpSendStream::new(rtp_send_config, Arc::clone(&self.sock), self.peer);
        self.send_streams.lock()?.insert(ssrc, st);
        Ok(OutboundTrackHandle {
            local_ssrc: ssrc,
            codec,
        })
    }

    pub fn add_send_streams(
        &self,
        configs: Vec<RtpSendConfig>,
    ) -> Result<Vec<OutboundTrackHandle>, RtpSessionError> {
        let mut handles = Vec::with_capacity(configs.len());
        for cfg in configs {
            handles.push(self.add_send_stream(cfg)?);
        }
        Ok(handles)
    }

    pub fn register_outbound_track(
        &self,
        codec: RtpCodec,
    ) -> Result<OutboundTrackHandle, RtpSessionError> {
        let cfg = RtpSendConfig::new(codec);
        self.add_send_stream(cfg)
    }

    /// FEC-splits `payload` into a block at `symbol_size`-byte symbols and
    /// sends every symbol as one RTP packet on `local_ssrc`'s stream, marker
    /// bit always false. Holds the send-stream lock for the whole block so
    /// sequence numbers stay contiguous across symbols.
    pub fn send_encoded_frame(
        &self,
        local_ssrc: u32,
        payload: &[u8],
        block_ts: u32,
        rate: f32,
        symbol_size: u16,
    ) -> Result<(), RtpSessionError> {
        send_block_to_stream(
            &self.send_streams,
            local_ssrc,
            payload,
            block_ts,
            rate,
            symbol_size,
        )
    }

    pub fn start(&mut self) -> Result<(), RtpSessionError> {
        self.run.store(true, Ordering::SeqCst);

        // === inbound RTP/RTCP loop ===
        let run = Arc::clone(&self.run);
        let rx = self
            .rx_media
            .take()
            .ok_or(RtpSessionError::EmptyMediaReceiver)?;
        let recv_map = Arc::clone(&self.recv_streams);
        let send_map = Arc::clone(&self.send_streams);
        let pending_recv = Arc::clone(&self.pending_recv);
        let users = Arc::clone(&self.users);
        let decoder_input = Arc::clone(&self.decoder_input);
        let tx_evt = self.tx_evt.clone();
        let logger = self.logger.clone();

        thread::spawn(move || {
            while run.load(Ordering::SeqCst) {
                match rx.recv_timeout(Duration::from_millis(50)) {
                    Ok(pkt) => {
                        if pkt.len() < 4 {
                            sink_log!(&logger, LogLevel::Error, "[RTP] packet too short");
                            continue;
                        }

                        if is_rtcp(&pkt) {
                            if let Err(e) = handle_rtcp(
                                &pkt, &recv_map, &pending_recv, &send_map, &users, &tx_evt, &logger,
                            ) {
                                sink_log!(&logger, LogLevel::Error, "[RTCP] error: {e}");
                            }
                            continue;
                        }

                        if pkt.len() < 12 || (pkt[0] >> 6) != 2 {
                            sink_log!(&logger, LogLevel::Error, "[RTP] invalid header/version");
                            continue;
                        }

                        let Ok(rtp) = RtpPacket::decode(&pkt) else {
                            sink_log!(&logger, LogLevel::Error, "[RTP] decode failed");
                            continue;
                        };

                        let ssrc = rtp.ssrc();
                        let pt = rtp.payload_type();

                        let received = {
                            let mut guard = recv_map.lock().unwrap_or_else(|e| e.into_inner());
                            if let Some(st) = guard.get_mut(&ssrc) {
                                st.receive_rtp_packet(rtp)
                            } else {
                                drop(guard);
                                let mut pend =
                                    pending_recv.lock().unwrap_or_else(|e| e.into_inner());
                                if let Some(idx) =
                                    pend.iter().position(|s| s.codec.payload_type == pt)
                                {
                                    let mut st = pend.swap_remove(idx);
                                    let sym = st.receive_rtp_packet(rtp);
                                    let mut map =
                                        recv_map.lock().unwrap_or_else(|e| e.into_inner());
                                    map.insert(ssrc, st);
                                    sym
                                } else {
                                    sink_log!(
                                        &logger,
                                        LogLevel::Warn,
                                        "[RTP] unknown remote SSRC={:#010x} PT={}",
                                        ssrc,
                                        pt
                                    );
                                    None
                                }
                            }
                        };

                        if let Some(sym) = received {
                            route_received_symbol(&users, &decoder_input, ssrc, sym);
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        sink_error!(logger, "[RTP Session] media channel disconnected");
                        break;
                    }
                }
            }
        });

        // === periodic RTCP sender: SR, RR, SDES ===
        let run2 = Arc::clone(&self.run);
        let sock = Arc::clone(&self.sock);
        let peer = self.peer;
        let recv_map2 = Arc::clone(&self.recv_streams);
        let send_map2 = Arc::clone(&self.send_streams);
        let tx_evt2 = self.tx_evt.clone();
        let logger2 = self.logger.clone();
        let interval = self.rtcp_interval;
        let rr_ssrc = self.local_rtcp_ssrc;
        let local_name = self.local_name.clone();
        let room = self.room.clone();
        let push_enabled = Arc::clone(&self.push_enabled);

        thread::spawn(move || {
            while run2.load(Ordering::SeqCst) {
                thread::sleep(interval);

                let mut comp_pkt = Vec::new();

                if let Ok(mut guard) = send_map2.lock() {
                    for st in guard.values_mut() {
                        if let Some(sr) = st.maybe_build_sr() {
                            let mut sr_bytes = Vec::new();
                            if let Err(e) = sr.encode_into(&mut sr_bytes) {
                                sink_error!(logger2, "[RTCP] failed to encode SR: {e}");
                                continue;
                            }
                            comp_pkt.extend_from_slice(&sr_bytes);
                            sink_debug!(logger2, "[RTCP] tx built SR ssrc={:#010x}", st.local_ssrc);
                        }
                    }
                }

                let mut blocks = Vec::new();
                if let Ok(mut guard) = recv_map2.lock() {
                    for st in guard.values_mut() {
                        if let Some(rb) = st.build_report_block() {
                            blocks.push(rb);
                        }
                    }
                }

                if !blocks.is_empty() {
                    let rr = ReceiverReport::new(rr_ssrc, blocks);
                    let mut rr_bytes = Vec::new();
                    if let Err(e) = rr.encode_into(&mut rr_bytes) {
                        sink_error!(logger2, "[RTCP] failed to encode RR: {e}");
                    } else {
                        comp_pkt.extend_from_slice(&rr_bytes);
                        sink_debug!(logger2, "[RTCP] tx built RR");
                    }
                }

                // One SDES chunk per active send stream: the remote's
                // recv_map is keyed by media SSRC, so identity must be
                // advertised on the same SSRC the remote will see on RTP,
                // not on the RTCP reporter SSRC.
                let local_ssrcs: Vec<u32> = send_map2
                    .lock()
                    .map(|g| g.keys().copied().collect())
                    .unwrap_or_default();
                let pushing = push_enabled.load(Ordering::SeqCst);
                for ssrc in local_ssrcs {
                    let sdes = Sdes::identity(ssrc, &local_name, &room, pushing);
                    let mut sdes_bytes = Vec::new();
                    if let Err(e) = sdes.encode_into(&mut sdes_bytes) {
                        sink_error!(logger2, "[RTCP] failed to encode SDES: {e}");
                    } else {
                        comp_pkt.extend_from_slice(&sdes_bytes);
                    }
                }

                if !comp_pkt.is_empty() && sock.send_to(&comp_pkt, peer).is_err() {
                    let _ = tx_evt2.send(EngineEvent::Error(
                        "RTCP send failed, peer may be unreachable".into(),
                    ));
                }
            }
        });

        // === encoded-frame FEC sender ===
        let run3 = Arc::clone(&self.run);
        let encoded_input = Arc::clone(&self.encoded_input);
        let send_map3 = Arc::clone(&self.send_streams);
        let push_enabled3 = Arc::clone(&self.push_enabled);
        let logger3 = self.logger.clone();

        thread::spawn(move || {
            while run3.load(Ordering::SeqCst) {
                let binding = encoded_input
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone();
                let Some((queue, ssrc, clock_rate, symbol_size)) = binding else {
                    thread::sleep(Duration::from_millis(100));
                    continue;
                };
                if !queue.wait_push(Duration::from_millis(100)) {
                    continue;
                }
                while let Some(frame) = queue.next() {
                    if !push_enabled3.load(Ordering::SeqCst) {
                        continue;
                    }
                    let payload = frame.payload();
                    let rate = if frame.key_frame {
                        fec::encoder::RATE_KEY_FRAME
                    } else {
                        fec::encoder::RATE_DELTA_FRAME
                    };
                    let block_ts = pts_to_rtp_units(frame.pts_us, clock_rate);
                    if let Err(e) = send_block_to_stream(
                        &send_map3,
                        ssrc,
                        &payload,
                        block_ts,
                        rate,
                        symbol_size,
                    ) {
                        sink_warn!(logger3, "[RTP] send_encoded_frame failed: {e}");
                    }
                }
            }
        });

        // === bandwidth sampler ===
        let run4 = Arc::clone(&self.run);
        let send_map4 = Arc::clone(&self.send_streams);
        let recv_map4 = Arc::clone(&self.recv_streams);
        let tx_evt4 = self.tx_evt.clone();
        let tick = Duration::from_secs(1);

        thread::spawn(move || {
            let mut last_sent = 0u64;
            let mut last_recv = 0u64;
            while run4.load(Ordering::SeqCst) {
                thread::sleep(tick);
                if !run4.load(Ordering::SeqCst) {
                    break;
                }
                let sent: u64 = send_map4
                    .lock()
                    .map(|g| g.values().map(|st| st.bytes_sent() as u64).sum())
                    .unwrap_or(0);
                let recv: u64 = recv_map4
                    .lock()
                    .map(|g| g.values().map(|st| st.bytes_received()).sum())
                    .unwrap_or(0);

                let up = sent.saturating_sub(last_sent) as f64 / tick.as_secs_f64();
                let down = recv.saturating_sub(last_recv) as f64 / tick.as_secs_f64();
                last_sent = sent;
                last_recv = recv;

                let _ = tx_evt4.send(EngineEvent::UploadBandwidth {
                    bytes_per_sec: up,
                    total_bytes: sent,
                });
                let _ = tx_evt4.send(EngineEvent::DownloadBandwidth {
                    bytes_per_sec: down,
                    total_bytes: recv,
                });
            }
        });

        Ok(())
    }

    pub fn stop(&self) {
        self.run.store(false, Ordering::SeqCst);
    }

    /// Sends a BYE for every local send SSRC, for a graceful `leave_room`.
    pub fn send_bye(&self, reason: Option<String>) -> Result<(), RtpSessionError> {
        use crate::rtcp::bye::Bye;
        let sources: Vec<u32> = self
            .send_streams
            .lock()?
            .keys()
            .copied()
            .collect();
        if sources.is_empty() {
            return Ok(());
        }
        let bye = Bye { sources, reason };
        let mut buf = Vec::new();
        bye.encode_into(&mut buf)?;
        let _ = self.sock.send_to(&buf, self.peer);
        Ok(())
    }

    /// Convenience: does this remote SSRC exist as a recv stream?
    pub fn has_recv_ssrc(&self, remote_ssrc: u32) -> bool {
        self.recv_streams
            .lock()
            .map(|g| g.contains_key(&remote_ssrc))
            .unwrap_or(false)
    }

    /// Total payload bytes sent across every local send stream, for upload
    /// bandwidth reporting.
    pub fn bytes_sent(&self) -> u64 {
        self.send_streams
            .lock()
            .map(|g| g.values().map(|st| st.bytes_sent() as u64).sum())
            .unwrap_or(0)
    }

    /// Total payload bytes received across every remote recv stream, for
    /// download bandwidth reporting.
    pub fn bytes_received(&self) -> u64 {
        self.recv_streams
            .lock()
            .map(|g| g.values().map(|st| st.bytes_received()).sum())
            .unwrap_or(0)
    }
}

// --------------------- helpers ---------------------

/// FEC-splits `payload` into a block at `symbol_size`-byte symbols and sends
/// every symbol as one RTP packet on `local_ssrc`'s stream; the marker bit is
/// always false, since block boundaries are recovered from `SymbolMeta`, not
/// from the marker bit. Holds the send-stream lock for the whole block so
/// sequence numbers stay contiguous across symbols.
fn send_block_to_stream(
    send_streams: &Mutex<HashMap<u32, RtpSendStream>>,
    local_ssrc: u32,
    payload: &[u8],
    block_ts: u32,
    rate: f32,
    symbol_size: u16,
) -> Result<(), RtpSessionError> {
    let block = fec::encode_block(payload, symbol_size, rate, block_ts);
    let total = block.total_symbols();

    let mut g = send_streams.lock()?;
    let st = g
        .get_mut(&local_ssrc)
        .ok_or(RtpSessionError::SendStreamMissing { ssrc: local_ssrc })?;

    for index in 0..total {
        let meta = block.meta_for(index);
        let symbol = &block.symbols[index as usize];
        st.send_symbol(symbol, meta, false)
            .map_err(|rtp_send_error| RtpSessionError::SendStream {
                rtp_send_error,
                ssrc: local_ssrc,
            })?;
    }
    Ok(())
}

/// Converts a frame's capture-time PTS (microseconds) into RTP timestamp
/// units at `clock_rate`.
#[inline]
fn pts_to_rtp_units(pts_us: u64, clock_rate: u32) -> u32 {
    ((pts_us as u128 * clock_rate as u128) / 1_000_000) as u32
}

#[inline]
fn is_rtcp(pkt: &[u8]) -> bool {
    if pkt.len() < 4 {
        return false;
    }
    let version = pkt[0] >> 6;
    if version != 2 {
        return false;
    }
    matches!(pkt[1], 200..=204)
}

#[inline]
fn ntp_to_compact(msw: u32, lsw: u32) -> u32 {
    (msw << 16) | (lsw >> 16)
}

/// Deposits a received FEC symbol into its peer's reassembly cache and, if
/// that completes a block, decodes it and hands the result to the decoder
/// stage's input queue. `ssrc` must already be bound in `UserManager`
/// (i.e. a `join` has already been observed via SDES) or the symbol is
/// simply dropped; wiring a user's SSRC happens in `handle_rtcp`'s SDES arm.
fn route_received_symbol(
    users: &Arc<Mutex<UserManager>>,
    decoder_input: &Arc<Mutex<Option<Arc<BoundedQueue<DecodableUnit>>>>>,
    ssrc: u32,
    sym: ReceivedSymbol,
) {
    let guard = users.lock().unwrap_or_else(|e| e.into_inner());
    let Some((owner, kind, cache)) = guard.route_for_ssrc(ssrc) else {
        return;
    };
    let owner = owner.to_string();
    cache.insert(sym.symbol, sym.meta);
    let Some(ready) = cache.take_ready() else {
        return;
    };
    drop(guard);

    match fec::decode_block(&ready) {
        Ok(payload) => {
            let q = decoder_input
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            if let Some(q) = q {
                q.push(DecodableUnit {
                    owner,
                    kind,
                    payload,
                    pts_us: ready.block_ts as u64,
                    payload_type: sym.payload_type,
                });
            }
        }
        Err(_) => {
            // Unrecoverable block: dropped frame, next block still arrives
            // on schedule since reassembly never blocks on a prior miss.
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_rtcp(
    buf: &[u8],
    recv_map: &Arc<Mutex<HashMap<u32, RtpRecvStream>>>,
    pending_recv: &Arc<Mutex<Vec<RtpRecvStream>>>,
    send_map: &Arc<Mutex<HashMap<u32, RtpSendStream>>>,
    users: &Arc<Mutex<UserManager>>,
    tx_evt: &Sender<EngineEvent>,
    logger: &Arc<dyn LogSink>,
) -> Result<(), RtpSessionError> {
    let pkts = RtcpPacket::decode_compound(buf)?;

    let (now_most_sw, now_least_sw) = crate::rtp::time::ntp_now();
    let arrival_ntp_compact = ntp_to_compact(now_most_sw, now_least_sw);

    for pkt in pkts {
        match pkt {
            RtcpPacket::Sr(sr) => {
                if let Ok(mut g) = recv_map.lock()
                    && let Some(st) = g.get_mut(&sr.ssrc)
                {
                    st.on_sender_report(sr.ssrc, &sr.info, (now_most_sw, now_least_sw));
                }

                if let Ok(mut g) = send_map.lock() {
                    for rb in &sr.reports {
                        if let Some(st) = g.get_mut(&rb.ssrc) {
                            st.on_report_block(rb, arrival_ntp_compact);
                            emit_network_sample(st, tx_evt);
                        }
                    }
                }
            }

            RtcpPacket::Rr(rr) => {
                if let Ok(mut g) = send_map.lock() {
                    for rb in &rr.reports {
                        if let Some(st) = g.get_mut(&rb.ssrc) {
                            st.on_report_block(rb, arrival_ntp_compact);
                            emit_network_sample(st, tx_evt);
                        }
                    }
                }
            }

            RtcpPacket::Sdes(sdes) => {
                for chunk in &sdes.chunks {
                    let Some((name, room, pushing)) = Sdes::parse_identity(chunk) else {
                        continue;
                    };
                    let name = name.to_string();
                    let room = room.to_string();

                    let kind = recv_map
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .get(&chunk.ssrc)
                        .map(|st| st.codec.kind);
                    let Some(kind) = kind else {
                        // SDES repeats every rtcp_interval; retried once the
                        // recv stream exists for this SSRC.
                        continue;
                    };

                    sink_log!(
                        logger,
                        LogLevel::Debug,
                        "[RTCP][SDES] ssrc={:#010x} name={name} room={room} pushing={pushing}",
                        chunk.ssrc
                    );

                    let joined = users
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(chunk.ssrc, &name, kind);
                    if joined {
                        let _ = tx_evt.send(EngineEvent::UserJoin { name });
                    }
                }
            }

            RtcpPacket::Bye(bye) => {
                for ssrc in &bye.sources {
                    let removed = recv_map
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .remove(ssrc)
                        .is_some();
                    if !removed {
                        continue;
                    }

                    let mut guard = users.lock().unwrap_or_else(|e| e.into_inner());
                    let name = guard.user_for_ssrc(*ssrc).map(|u| u.name.clone());
                    let left = guard.remove(*ssrc);
                    drop(guard);

                    if left {
                        let name = name.unwrap_or_default();
                        sink_warn!(logger, "[RTCP][BYE] {name} left (ssrc={:#010x})", ssrc);
                        let _ = tx_evt.send(EngineEvent::UserLeave {
                            name,
                            reason: bye.reason.clone(),
                        });
                    }
                }
                // Pending (not-yet-bound) recv streams have no SSRC yet, so
                // a BYE for an SSRC we never matched cannot reference one.
                let _ = pending_recv;
            }
        }
    }

    Ok(())
}

fn emit_network_sample(st: &RtpSendStream, tx_evt: &Sender<EngineEvent>) {
    let fraction_lost = st.tx.remote_fraction_lost as f32 / 256.0;
    let _ = tx_evt.send(EngineEvent::LocalNetwork {
        jitter: st.tx.remote_jitter as f64,
        fraction_lost,
        rtt_ms: st.tx.rtt_ms.map(|v| v as f64),
    });
}
