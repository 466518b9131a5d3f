use crate::rtcp::packet_type;

use super::{
    bye::Bye, common_header::CommonHeader, packet_type::RtcpPacketType,
    receiver_report::ReceiverReport, rtcp_error::RtcpError, sdes::Sdes, sender_report::SenderReport,
};

/// The union of supported RTCP packets: SR, RR, SDES and BYE, the only
/// types this engine emits or acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtcpPacket {
    Sr(SenderReport),
    Rr(ReceiverReport),
    Sdes(Sdes),
    Bye(Bye),
}

impl RtcpPacket {
    /// Decode a *compound* RTCP buffer into individual packets. Packet
    /// types outside our supported set (feedback, APP) are skipped rather
    /// than treated as a parse failure, since a remote peer may still send
    /// them even though we neither produce nor act on them.
    pub fn decode_compound(buf: &[u8]) -> Result<Vec<RtcpPacket>, RtcpError> {
        let mut out = Vec::new();
        let mut idx = 0usize;
        while idx + 4 <= buf.len() {
            let (hdr, total) = CommonHeader::decode(&buf[idx..])?;
            let pkt_bytes = &buf[idx..idx + total];
            let payload = &pkt_bytes[4..];

            match hdr.pt {
                packet_type::PT_SR => out.push(SenderReport::decode(&hdr, payload)?),
                packet_type::PT_RR => out.push(ReceiverReport::decode(&hdr, payload)?),
                packet_type::PT_SDES => out.push(Sdes::decode(&hdr, payload)?),
                packet_type::PT_BYE => out.push(Bye::decode(&hdr, payload)?),
                packet_type::PT_APP
                | packet_type::PT_RTPFB
                | packet_type::PT_PSFB => {}
                other => return Err(RtcpError::UnknownPacketType(other)),
            }
            idx += total;
        }
        if idx != buf.len() {
            // trailing garbage / partial packet
            return Err(RtcpError::TooShort);
        }
        Ok(out)
    }

    /// Encode a compound RTCP packet (concatenation of packets).
    pub fn encode_compound(pkts: &[RtcpPacket]) -> Result<Vec<u8>, RtcpError> {
        let mut out = Vec::new();
        for pkt in pkts {
            encode_one(pkt, &mut out)?;
        }
        Ok(out)
    }
}

fn encode_one(packet: &RtcpPacket, out: &mut Vec<u8>) -> Result<(), RtcpError> {
    match packet {
        RtcpPacket::Sr(sr) => sr.encode_into(out),
        RtcpPacket::Rr(rr) => rr.encode_into(out),
        RtcpPacket::Sdes(sdes) => sdes.encode_into(out),
        RtcpPacket::Bye(bye) => bye.encode_into(out),
    }
}
