use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Default capacity used when a stage does not request one explicitly.
pub const DEFAULT_CAPACITY: usize = 10;

struct Inner<T> {
    items: VecDeque<T>,
    cap: usize,
    closed: bool,
}

/// A bounded MPMC queue with head-drop-on-overflow semantics.
///
/// Pushing never blocks the producer: once the queue holds `cap` items the
/// oldest one is discarded to make room. Consumers can either drain in FIFO
/// order (`next`) or skip straight to the newest item (`latest`), matching
/// the two playout strategies the pipeline needs (strict ordering for FEC
/// reassembly, freshness for raw capture frames).
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    cv: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(cap: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(cap.min(1024)),
                cap: cap.max(1),
                closed: false,
            }),
            cv: Condvar::new(),
        })
    }

    pub fn with_default_capacity() -> Arc<Self> {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Appends `item`, dropping the oldest entry first if the queue is full.
    /// Always succeeds (unless the queue is closed, in which case the push
    /// is silently discarded) and wakes exactly one waiter.
    pub fn push(&self, item: T) {
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if g.closed {
            return;
        }
        while g.items.len() >= g.cap {
            g.items.pop_front();
        }
        g.items.push_back(item);
        drop(g);
        self.cv.notify_one();
    }

    /// Pops the oldest item, if any, without blocking.
    pub fn next(&self) -> Option<T> {
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        g.items.pop_front()
    }

    /// Drops every item but the newest and returns it.
    pub fn latest(&self) -> Option<T> {
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        while g.items.len() > 1 {
            g.items.pop_front();
        }
        g.items.pop_front()
    }

    #[must_use]
    pub fn has_data(&self) -> bool {
        let g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        !g.items.is_empty()
    }

    pub fn len(&self) -> usize {
        let g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        g.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks until a push happens, `timeout` elapses, or the queue closes.
    /// Returns whether data is available to consume.
    pub fn wait_push(&self, timeout: Duration) -> bool {
        let g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !g.items.is_empty() || g.closed {
            return !g.items.is_empty();
        }
        let (g, _timed_out) = self
            .cv
            .wait_timeout_while(g, timeout, |s| s.items.is_empty() && !s.closed)
            .unwrap_or_else(|e| e.into_inner());
        !g.items.is_empty()
    }

    /// Releases every waiter without delivering data, e.g. so a consumer can
    /// observe that its input binding changed.
    pub fn wake_all(&self) {
        self.cv.notify_all();
    }

    /// Terminal: subsequent waits return immediately and pushes are dropped.
    pub fn close(&self) {
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        g.closed = true;
        drop(g);
        self.cv.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).closed
    }

    pub fn clear(&self) {
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        g.items.clear();
    }

    pub fn set_cap(&self, cap: usize) {
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        g.cap = cap.max(1);
        while g.items.len() > g.cap {
            g.items.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn head_drop_keeps_last_cap_items() {
        let q = BoundedQueue::new(3);
        for i in 0..10 {
            q.push(i);
        }
        let mut out = Vec::new();
        while let Some(v) = q.next() {
            out.push(v);
        }
        assert_eq!(out, vec![7, 8, 9]);
    }

    #[test]
    fn latest_drops_all_but_newest() {
        let q = BoundedQueue::new(5);
        for i in 0..4 {
            q.push(i);
        }
        assert_eq!(q.latest(), Some(3));
        assert_eq!(q.next(), None);
    }

    #[test]
    fn wait_push_wakes_on_push() {
        let q = BoundedQueue::new(4);
        let q2 = q.clone();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            q2.push(42);
        });
        let start = Instant::now();
        let got = q.wait_push(Duration::from_millis(500));
        assert!(got);
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(q.next(), Some(42));
        t.join().unwrap();
    }

    #[test]
    fn wait_push_times_out_without_data() {
        let q: Arc<BoundedQueue<i32>> = BoundedQueue::new(4);
        let start = Instant::now();
        let got = q.wait_push(Duration::from_millis(30));
        assert!(!got);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn wake_all_releases_waiter_without_data() {
        let q: Arc<BoundedQueue<i32>> = BoundedQueue::new(4);
        let q2 = q.clone();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            q2.wake_all();
        });
        let start = Instant::now();
        let got = q.wait_push(Duration::from_secs(2));
        assert!(!got);
        assert!(start.elapsed() < Duration::from_secs(2));
        t.join().unwrap();
    }

    #[test]
    fn close_wakes_waiters_immediately() {
        let q: Arc<BoundedQueue<i32>> = BoundedQueue::new(4);
        q.close();
        let start = Instant::now();
        assert!(!q.wait_push(Duration::from_secs(2)));
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
