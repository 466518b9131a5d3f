use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::queue::BoundedQueue;
use crate::core::worker::WorkerThread;

/// Single-input/single-output stage: reads from one input queue, applies an
/// optional transform, and writes to one output queue. Pauses whenever
/// either endpoint is unbound.
pub struct SisoStage<In, Out> {
    input: Arc<Mutex<Option<Arc<BoundedQueue<In>>>>>,
    output: Arc<Mutex<Option<Arc<BoundedQueue<Out>>>>>,
    worker: Option<WorkerThread>,
}

impl<In, Out> SisoStage<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            input: Arc::new(Mutex::new(None)),
            output: Arc::new(Mutex::new(None)),
            worker: None,
        }
    }

    /// Starts the stage's worker thread. `transform` is applied to every
    /// item popped from the input; returning `None` drops it instead of
    /// forwarding.
    pub fn start<F>(&mut self, name: impl Into<String>, mut transform: F)
    where
        F: FnMut(In) -> Option<Out> + Send + 'static,
    {
        let input = self.input.clone();
        let output = self.output.clone();
        let input_pause = self.input.clone();
        let output_pause = self.output.clone();

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
                while let Some(item) = in_q.next() {
                    if let Some(out_item) = transform(item) {
                        let out_q = { output.lock().unwrap_or_else(|e| e.into_inner()).clone() };
                        if let Some(out_q) = out_q {
                            out_q.push(out_item);
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

    /// Rebinds the input queue. Drains waiters on the old input before
    /// swapping so a blocked worker observes the change promptly.
    pub fn set_input(&self, q: Option<Arc<BoundedQueue<In>>>) {
        let old = {
            let mut g = self.input.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *g, q.clone())
        };
        if let Some(old) = old {
            old.wake_all();
        }
        if let Some(new_q) = &q {
            new_q.wake_all();
        }
        if let Some(w) = &self.worker {
            w.wake();
        }
    }

    pub fn set_output(&self, q: Option<Arc<BoundedQueue<Out>>>) {
        *self.output.lock().unwrap_or_else(|e| e.into_inner()) = q;
        if let Some(w) = &self.worker {
            w.wake();
        }
    }

    pub fn stop(&mut self) {
        if let Some(w) = self.worker.take() {
            w.stop();
        }
    }
}

impl<In: Send + 'static, Out: Send + 'static> Default for SisoStage<In, Out> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn forwards_transformed_items() {
        let mut stage: SisoStage<i32, i32> = SisoStage::new();
        let input = BoundedQueue::new(8);
        let output = BoundedQueue::new(8);
        stage.set_input(Some(input.clone()));
        stage.set_output(Some(output.clone()));
        stage.start("test-siso", |v| Some(v * 2));

        input.push(21);
        let mut got = None;
        for _ in 0..50 {
            if let Some(v) = output.next() {
                got = Some(v);
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(got, Some(42));
        stage.stop();
    }

    #[test]
    fn pauses_when_output_unbound() {
        let mut stage: SisoStage<i32, i32> = SisoStage::new();
        let input = BoundedQueue::new(8);
        stage.set_input(Some(input.clone()));
        stage.start("test-siso-paused", Some);
        input.push(1);
        thread::sleep(Duration::from_millis(50));
        // No output bound: nothing should have been consumed destructively
        // beyond being held; the item may or may not still be in the queue
        // depending on pause timing, so just assert no panic/deadlock.
        stage.stop();
    }
}
