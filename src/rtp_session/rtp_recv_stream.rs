use crate::fec::SymbolMeta;
use crate::log::log_level::LogLevel;
use crate::log::log_sink::LogSink;
use crate::rtcp::report_block::ReportBlock;
use crate::rtcp::sender_info::SenderInfo;
use crate::rtp::rtp_packet::RtpPacket;
use crate::sink_log;

use super::{rtp_codec::RtpCodec, rtp_recv_config::RtpRecvConfig, rx_tracker::RxTracker};
use std::sync::Arc;
use std::time::Instant;

/// One FEC symbol pulled off the wire, with enough metadata for the caller
/// to route it into the right peer's `DecoderCache`. Reassembly-level
/// reordering/loss tolerance lives in that cache, not here; this stream only
/// validates the RTP envelope and unpacks the header extension.
pub struct ReceivedSymbol {
    pub payload_type: u8,
    pub meta: SymbolMeta,
    pub symbol: Vec<u8>,
}

pub struct RtpRecvStream {
    pub codec: RtpCodec,
    pub remote_ssrc: Option<u32>,
    pub rx: RxTracker,
    epoch: Instant,
    last_activity: Instant,
    bytes_received: u64,

    logger: Arc<dyn LogSink>,
}

impl RtpRecvStream {
    pub fn new(cfg: RtpRecvConfig, logger: Arc<dyn LogSink>) -> Self {
        let now = Instant::now();
        Self {
            codec: cfg.codec,
            remote_ssrc: cfg.remote_ssrc,
            rx: RxTracker::default(),
            epoch: now,
            last_activity: now,
            bytes_received: 0,
            logger,
        }
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Convert a monotonic Instant to RTP timestamp units using `codec.clock_rate`.
    #[inline]
    fn instant_to_rtp_units(&self, now: Instant) -> u32 {
        let dur = now.duration_since(self.epoch);
        let rate = self.codec.clock_rate as u128; // Hz
        let ns = dur.as_nanos(); // u128
        let units = (ns.saturating_mul(rate)) / 1_000_000_000u128;
        units as u32
    }

    /// Validates `packet` against the stream's bound SSRC (learning it on
    /// the first packet), updates loss/jitter stats, and unpacks the FEC
    /// symbol metadata carried in the header extension. Returns `None` only
    /// when the packet belongs to a different SSRC than already bound.
    pub fn receive_rtp_packet(&mut self, packet: RtpPacket) -> Option<ReceivedSymbol> {
        let now = Instant::now();
        self.last_activity = now;

        let pkt_ssrc = packet.ssrc();
        if let Some(expected) = self.remote_ssrc {
            if expected != pkt_ssrc {
                return None;
            }
        } else {
            self.remote_ssrc = Some(pkt_ssrc);
        }

        let arrival_rtp = self.instant_to_rtp_units(now);
        self.rx
            .on_rtp(packet.seq(), packet.timestamp(), arrival_rtp);
        self.bytes_received += packet.payload.len() as u64;

        let block_ts = packet.timestamp();
        let meta = packet
            .header
            .header_extension
            .as_ref()
            .and_then(|ext| SymbolMeta::unpack_ext_data(block_ts, ext.profile, &ext.data))
            .unwrap_or_else(|| SymbolMeta::raw_passthrough(block_ts));

        Some(ReceivedSymbol {
            payload_type: packet.payload_type(),
            meta,
            symbol: packet.payload,
        })
    }

    /// Called by the *session* when an SR for this remote SSRC arrives.
    /// `arrival_ntp` is the local receive time of the SR as (ntp_msw, ntp_lsw).
    pub fn on_sender_report(
        &mut self,
        sender_ssrc: u32,
        info: &SenderInfo,
        arrival_ntp: (u32, u32),
    ) {
        if let Some(exp) = self.remote_ssrc {
            if exp != sender_ssrc {
                return; // SR from someone else
            }
        } else {
            self.remote_ssrc = Some(sender_ssrc);
        }

        self.last_activity = Instant::now();

        self.rx
            .on_sr_received(info.ntp_most_sw, info.now_least_sw, arrival_ntp);

        sink_log!(
            &self.logger,
            LogLevel::Debug,
            "[RTCP][SR] ssrc={:#010x} rtp_ts={} pkt={} octets={}",
            sender_ssrc,
            info.rtp_ts,
            info.packet_count,
            info.octet_count
        );
    }

    /// Build one RTCP ReportBlock for this remote SSRC.
    pub fn build_report_block(&mut self) -> Option<ReportBlock> {
        self.remote_ssrc
            .map(|ssrc| self.rx.build_report_block(ssrc))
    }
}
