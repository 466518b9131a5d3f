use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::block::SymbolMeta;

/// Default idle timeout for the lowest-timestamp pending entry, per the
/// eviction rule in the reassembly design.
pub const DEFAULT_EVICTION_TIMEOUT: Duration = Duration::from_millis(10);

struct Entry {
    k: u16,
    r: u16,
    f: u16,
    symbol_size: u16,
    slots: Vec<Option<Vec<u8>>>,
    received: u16,
    has_repair: bool,
    last_symbol_at: Instant,
}

impl Entry {
    fn new(meta: &SymbolMeta) -> Self {
        Self {
            k: meta.k,
            r: meta.r,
            f: meta.f,
            symbol_size: 0,
            slots: vec![None; (meta.k + meta.r) as usize],
            received: 0,
            has_repair: false,
            last_symbol_at: Instant::now(),
        }
    }
}

/// A block handed from [`DecoderCache::take_ready`] to the FEC decoder,
/// with every symbol slot it ever received (`None` where lost).
pub struct ReadyBlock {
    pub block_ts: u32,
    pub k: u16,
    pub r: u16,
    pub f: u16,
    pub symbol_size: u16,
    pub slots: Vec<Option<Vec<u8>>>,
    pub has_repair: bool,
}

impl ReadyBlock {
    pub fn received_count(&self) -> u16 {
        self.slots.iter().filter(|s| s.is_some()).count() as u16
    }

    pub fn received_source_count(&self) -> u16 {
        self.slots[..self.k as usize]
            .iter()
            .filter(|s| s.is_some())
            .count() as u16
    }
}

/// Keyed reassembly of FEC symbols into blocks, one cache per (peer, media
/// kind). Blocks are delivered in strictly increasing block-timestamp
/// order: gaps created by eviction show up as lost blocks, never as
/// reordering.
pub struct DecoderCache {
    entries: Mutex<BTreeMap<u32, Entry>>,
    min_pending: Mutex<Option<u32>>,
    timeout: Duration,
}

impl DecoderCache {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_EVICTION_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            min_pending: Mutex::new(None),
            timeout,
        }
    }

    /// Deposits `symbol` at its index within the block named by `meta`.
    /// Rejects symbols whose block is older than the oldest block we still
    /// track (already delivered or evicted).
    pub fn insert(&self, symbol: Vec<u8>, meta: SymbolMeta) {
        {
            let min = self.min_pending.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(min_ts) = *min
                && meta.block_ts < min_ts
            {
                return;
            }
        }

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries
            .entry(meta.block_ts)
            .or_insert_with(|| Entry::new(&meta));

        entry.symbol_size = meta.k.max(1) as u16; // placeholder, fixed below on first real symbol
        if (meta.index as usize) >= entry.slots.len() {
            entry.slots.resize((meta.index + 1) as usize, None);
        }
        if entry.slots[meta.index as usize].is_none() {
            entry.received += 1;
        }
        if meta.index >= entry.k {
            entry.has_repair = true;
        }
        entry.symbol_size = symbol.len() as u16;
        entry.slots[meta.index as usize] = Some(symbol);
        entry.last_symbol_at = Instant::now();

        let mut min = self.min_pending.lock().unwrap_or_else(|e| e.into_inner());
        if min.is_none() {
            *min = Some(meta.block_ts);
        }
    }

    /// If the lowest-timestamp entry has received at least K symbols,
    /// removes and returns it. Always sweeps expired entries first so
    /// progress keeps advancing past stale blocks.
    pub fn take_ready(&self) -> Option<ReadyBlock> {
        self.evict_expired();

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let lowest_ts = *entries.keys().next()?;
        let ready = entries
            .get(&lowest_ts)
            .map(|e| e.received >= e.k)
            .unwrap_or(false);
        if !ready {
            return None;
        }
        let entry = entries.remove(&lowest_ts)?;
        drop(entries);
        self.advance_min_past(lowest_ts);

        Some(ReadyBlock {
            block_ts: lowest_ts,
            k: entry.k,
            r: entry.r,
            f: entry.f,
            symbol_size: entry.symbol_size,
            slots: entry.slots,
            has_repair: entry.has_repair,
        })
    }

    /// Drops the lowest-timestamp entry if it has been idle longer than the
    /// configured timeout, unconditionally (live media prefers monotonic
    /// progress over completeness).
    pub fn evict_expired(&self) -> Option<u32> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let lowest_ts = *entries.keys().next()?;
        let expired = entries
            .get(&lowest_ts)
            .map(|e| e.last_symbol_at.elapsed() > self.timeout)
            .unwrap_or(false);
        if !expired {
            return None;
        }
        entries.remove(&lowest_ts);
        drop(entries);
        self.advance_min_past(lowest_ts);
        Some(lowest_ts)
    }

    fn advance_min_past(&self, delivered_ts: u32) {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut min = self.min_pending.lock().unwrap_or_else(|e| e.into_inner());
        *min = entries.keys().next().copied().or(Some(delivered_ts.wrapping_add(1)));
    }

    pub fn pending_count(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for DecoderCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn meta(ts: u32, idx: u16, k: u16, r: u16) -> SymbolMeta {
        SymbolMeta {
            block_ts: ts,
            index: idx,
            k,
            r,
            f: 0,
        }
    }

    #[test]
    fn take_ready_requires_k_symbols() {
        let cache = DecoderCache::new();
        cache.insert(vec![1], meta(1, 0, 2, 1));
        assert!(cache.take_ready().is_none());
        cache.insert(vec![2], meta(1, 1, 2, 1));
        let block = cache.take_ready().unwrap();
        assert_eq!(block.block_ts, 1);
        assert_eq!(block.received_count(), 2);
    }

    #[test]
    fn delivers_blocks_in_increasing_timestamp_order() {
        let cache = DecoderCache::new();
        cache.insert(vec![1], meta(5, 0, 1, 0));
        cache.insert(vec![1], meta(2, 0, 1, 0));
        let first = cache.take_ready().unwrap();
        assert_eq!(first.block_ts, 2);
        let second = cache.take_ready().unwrap();
        assert_eq!(second.block_ts, 5);
    }

    #[test]
    fn eviction_after_timeout_unblocks_next_entry() {
        let cache = DecoderCache::with_timeout(Duration::from_millis(15));
        cache.insert(vec![9], meta(1, 0, 4, 0));
        thread::sleep(Duration::from_millis(25));
        cache.insert(vec![9], meta(2, 0, 1, 0));
        let ready = cache.take_ready();
        assert!(ready.is_some());
        assert_eq!(ready.unwrap().block_ts, 2);
        assert_eq!(cache.pending_count(), 0);
    }

    #[test]
    fn out_of_range_symbol_is_dropped() {
        let cache = DecoderCache::new();
        cache.insert(vec![1], meta(5, 0, 1, 0));
        cache.take_ready();
        // block 5 delivered, min_pending advances past it
        cache.insert(vec![1], meta(3, 0, 1, 0));
        assert_eq!(cache.pending_count(), 0);
    }
}
