use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Lifecycle primitive shared by every stage: a dedicated OS thread that
/// loops `while !exit { if should_pause() { wait } else { on_run() } }`.
///
/// Shutdown sets the exit flag, wakes the pause condvar, and joins. Pausing
/// is cooperative: `on_run` closures must not block indefinitely, so stages
/// that wait for input do so with a bounded timeout (`wait_push`) rather
/// than an unbounded one.
pub struct WorkerThread {
    stop: Arc<AtomicBool>,
    pause_lock: Arc<Mutex<()>>,
    pause_cv: Arc<Condvar>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    /// Spawns the worker. `should_pause` is re-evaluated on every loop
    /// iteration; `on_run` is called once per iteration while not paused.
    pub fn spawn<R, P>(name: impl Into<String>, mut on_run: R, mut should_pause: P) -> Self
    where
        R: FnMut() + Send + 'static,
        P: FnMut() -> bool + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let pause_lock = Arc::new(Mutex::new(()));
        let pause_cv = Arc::new(Condvar::new());

        let stop2 = stop.clone();
        let pause_lock2 = pause_lock.clone();
        let pause_cv2 = pause_cv.clone();
        let name = name.into();

        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                while !stop2.load(Ordering::SeqCst) {
                    if should_pause() {
                        let guard = pause_lock2.lock().unwrap_or_else(|e| e.into_inner());
                        let _ = pause_cv2
                            .wait_timeout(guard, Duration::from_millis(100))
                            .unwrap_or_else(|e| e.into_inner());
                        continue;
                    }
                    on_run();
                }
            })
            .expect("failed to spawn worker thread");

        Self {
            stop,
            pause_lock,
            pause_cv,
            handle: Some(handle),
        }
    }

    /// Wakes a thread currently parked in its pause wait, e.g. after a
    /// binding change makes `should_pause` false.
    pub fn wake(&self) {
        let _guard = self.pause_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.pause_cv.notify_all();
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Requests shutdown and joins the underlying thread.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.wake();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop.store(true, Ordering::SeqCst);
            self.wake();
            if let Some(h) = self.handle.take() {
                let _ = h.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn runs_on_run_while_not_paused() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c2 = counter.clone();
        let worker = WorkerThread::spawn(
            "test-worker",
            move || {
                c2.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
            },
            || false,
        );
        thread::sleep(Duration::from_millis(60));
        worker.stop();
        assert!(counter.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn paused_worker_does_not_run() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c2 = counter.clone();
        let worker = WorkerThread::spawn("paused-worker", move || {
            c2.fetch_add(1, Ordering::SeqCst);
        }, || true);
        thread::sleep(Duration::from_millis(50));
        worker.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
