use raptorq::Encoder as RaptorEncoder;

use super::block::FecBlock;

/// Recommended repair rate for key frames: more redundancy since losing a
/// keyframe stalls the whole GOP until the next one.
pub const RATE_KEY_FRAME: f32 = 0.83;
/// Recommended repair rate for non-key frames.
pub const RATE_DELTA_FRAME: f32 = 0.9;

/// Splits an encoded packet of `payload` bytes into a block of source and
/// repair symbols of `symbol_size` bytes each.
///
/// If the packet is smaller than one symbol, it is emitted verbatim as a
/// single symbol with `K=1, R=0, F=0` (no FEC expansion). Otherwise
/// `K = ceil(L / S)`, the last source symbol is zero-padded by `F` bytes,
/// and a systematic fountain code (RaptorQ) produces repair symbols so that
/// total symbol count `N` is approximately `K / rate`.
pub fn encode_block(payload: &[u8], symbol_size: u16, rate: f32, block_ts: u32) -> FecBlock {
    let s = symbol_size as usize;
    let l = payload.len();

    if l < s {
        return FecBlock {
            block_ts,
            k: 1,
            r: 0,
            f: 0,
            symbol_size,
            symbols: vec![payload.to_vec()],
        };
    }

    let k = l.div_ceil(s) as u16;
    let f = (k as usize * s) - l;

    let mut padded = Vec::with_capacity(k as usize * s);
    padded.extend_from_slice(payload);
    padded.resize(k as usize * s, 0u8);

    let total_target = ((k as f32) / rate.clamp(0.01, 1.0)).ceil() as u16;
    let r = total_target.saturating_sub(k);

    let raptor = RaptorEncoder::with_defaults(&padded, symbol_size);
    let packets = raptor.get_encoded_packets(r as u32);

    let mut symbols: Vec<Vec<u8>> = Vec::with_capacity(packets.len());
    for packet in &packets {
        symbols.push(packet.serialize());
    }

    FecBlock {
        block_ts,
        k,
        r,
        f,
        symbol_size,
        symbols,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payload_is_raw_passthrough() {
        let payload = vec![1u8; 1000];
        let block = encode_block(&payload, 1300, RATE_DELTA_FRAME, 10);
        assert_eq!(block.k, 1);
        assert_eq!(block.r, 0);
        assert_eq!(block.f, 0);
        assert_eq!(block.symbols.len(), 1);
    }

    #[test]
    fn large_payload_splits_into_k_plus_r_symbols() {
        let payload = vec![7u8; 4000];
        let block = encode_block(&payload, 1000, 0.8, 20);
        assert_eq!(block.k, 4);
        assert_eq!(block.f, 0);
        assert!(block.r >= 1);
        assert_eq!(block.symbols.len() as u16, block.k + block.r);
    }
}
