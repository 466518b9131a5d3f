use std::{
    net::{SocketAddr, UdpSocket},
    sync::Arc,
    time::Instant,
};

use super::rtp_send_error::RtpSendError;
use super::{rtp_codec::RtpCodec, rtp_send_config::RtpSendConfig, tx_tracker::TxTracker};

use crate::fec::SymbolMeta;
use crate::rtcp::{
    report_block::ReportBlock, sender_info::SenderInfo, sender_report::SenderReport,
};
use crate::rtp::rtp_header::RtpHeader;
use crate::rtp::rtp_header_extension::RtpHeaderExtension;
use crate::rtp::rtp_packet::RtpPacket;
use crate::rtp::time;

pub struct RtpSendStream {
    pub codec: RtpCodec,
    pub local_ssrc: u32,
    seq: u16,
    pkt_count: u32,
    octet_count: u32,

    sock: Arc<UdpSocket>,
    peer: SocketAddr,

    last_sr_built: Instant,
    last_pkt_sent: Instant,
    last_rtp_timestamp: u32,

    pub tx: TxTracker,
}

impl RtpSendStream {
    pub fn new(cfg: RtpSendConfig, sock: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        use rand::{RngCore, rngs::OsRng};
        Self {
            codec: cfg.codec,
            local_ssrc: cfg.local_ssrc,
            seq: OsRng.next_u32() as u16,
            pkt_count: 0,
            octet_count: 0,
            sock,
            peer,
            last_sr_built: Instant::now(),
            last_pkt_sent: Instant::now(),
            last_rtp_timestamp: 0,
            tx: TxTracker::default(),
        }
    }

    /// Sends one FEC symbol as a single RTP packet, packing `meta` into the
    /// generic header extension so the remote decoder cache can reassemble
    /// the block without any out-of-band signaling. `meta.block_ts` becomes
    /// the RTP timestamp so every symbol in a block carries the same one.
    pub fn send_symbol(
        &mut self,
        symbol: &[u8],
        meta: SymbolMeta,
        marker: bool,
    ) -> Result<(), RtpSendError> {
        let ext = RtpHeaderExtension::new(meta.index, meta.pack_ext_data().to_vec());
        let header = RtpHeader::new(self.codec.payload_type, self.seq, meta.block_ts, self.local_ssrc)
            .with_marker(marker)
            .with_extension(Some(ext));
        let packet = RtpPacket::new(header, symbol.to_vec());
        let encoded = packet.encode()?;

        self.sock.send_to(&encoded, self.peer)?;
        self.last_pkt_sent = Instant::now();
        self.last_rtp_timestamp = meta.block_ts;

        self.seq = self.seq.wrapping_add(1);
        self.pkt_count = self.pkt_count.wrapping_add(1);
        self.octet_count = self.octet_count.wrapping_add(symbol.len() as u32);

        Ok(())
    }

    /// Build a Sender Report if we have sent packets since the last SR.
    /// Also records the compact-NTP identifier so we can compute RTT when RRs arrive.
    pub fn maybe_build_sr(&mut self) -> Option<SenderReport> {
        if self.last_pkt_sent <= self.last_sr_built {
            return None;
        }

        let (ntp_most_sw, now_least_sw) = time::ntp_now();
        self.tx.mark_sr_sent(ntp_most_sw, now_least_sw);

        let sender_info = SenderInfo::new(
            ntp_most_sw,
            now_least_sw,
            self.last_rtp_timestamp,
            self.pkt_count,
            self.octet_count,
        );

        let sr = SenderReport::new(self.local_ssrc, sender_info, vec![]);
        self.last_sr_built = Instant::now();
        Some(sr)
    }

    /// Deliver a ReportBlock (from a remote SR/RR) to this sender stream so
    /// it can update outbound metrics/RTT.
    pub fn on_report_block(&mut self, rb: &ReportBlock, arrival_ntp_compact: u32) {
        self.tx.on_report_block(rb, arrival_ntp_compact);
    }

    pub fn bytes_sent(&self) -> u32 {
        self.octet_count
    }

    pub fn outbound_summary(&self) -> String {
        let rtt = self
            .tx
            .rtt_ms
            .map(|v| format!("{v} ms"))
            .unwrap_or_else(|| "-".into());
        format!(
            "SSRC={:#010x} sent={} pkts, {} bytes; remote_lost={} (frac={}), remote_jitter={}, RTT={}",
            self.local_ssrc,
            self.pkt_count,
            self.octet_count,
            self.tx.remote_cum_lost,
            self.tx.remote_fraction_lost,
            self.tx.remote_jitter,
            rtt,
        )
    }
}
