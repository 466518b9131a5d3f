use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::queue::BoundedQueue;
use crate::core::worker::WorkerThread;

/// Single-input/multi-output stage: reads from one input queue and fans the
/// (possibly transformed) item out to every currently-bound output. Pauses
/// if the input is unbound or the output set is empty.
pub struct SimoStage<In, Out> {
    input: Arc<Mutex<Option<Arc<BoundedQueue<In>>>>>,
    outputs: Arc<Mutex<Vec<Arc<BoundedQueue<Out>>>>>,
    worker: Option<WorkerThread>,
}

impl<In, Out> SimoStage<In, Out>
where
    In: Send + 'static,
    Out: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            input: Arc::new(Mutex::new(None)),
            outputs: Arc::new(Mutex::new(Vec::new())),
            worker: None,
        }
    }

    pub fn start<F>(&mut self, name: impl Into<String>, mut transform: F)
    where
        F: FnMut(In) -> Option<Out> + Send + 'static,
    {
        let input = self.input.clone();
        let outputs = self.outputs.clone();
        let input_pause = self.input.clone();
        let outputs_pause = self.outputs.clone();

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
                        let outs = outputs.lock().unwrap_or_else(|e| e.into_inner()).clone();
                        for out_q in outs {
                            out_q.push(out_item.clone());
                        }
                    }
                }
            },
            move || {
                input_pause.lock().unwrap_or_else(|e| e.into_inner()).is_none()
                    || outputs_pause.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
            },
        );
        self.worker = Some(worker);
    }

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

    pub fn add_output(&self, q: Arc<BoundedQueue<Out>>) {
        self.outputs.lock().unwrap_or_else(|e| e.into_inner()).push(q);
        if let Some(w) = &self.worker {
            w.wake();
        }
    }

    pub fn remove_output(&self, target: &Arc<BoundedQueue<Out>>) {
        self.outputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|q| !Arc::ptr_eq(q, target));
    }

    pub fn stop(&mut self) {
        if let Some(w) = self.worker.take() {
            w.stop();
        }
    }
}

impl<In: Send + 'static, Out: Clone + Send + 'static> Default for SimoStage<In, Out> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration as StdDuration;

    #[test]
    fn fans_out_to_all_outputs() {
        let mut stage: SimoStage<i32, i32> = SimoStage::new();
        let input = BoundedQueue::new(8);
        let out_a = BoundedQueue::new(8);
        let out_b = BoundedQueue::new(8);
        stage.set_input(Some(input.clone()));
        stage.add_output(out_a.clone());
        stage.add_output(out_b.clone());
        stage.start("test-simo", Some);

        input.push(7);
        let mut got_a = None;
        let mut got_b = None;
        for _ in 0..50 {
            got_a = got_a.or_else(|| out_a.next());
            got_b = got_b.or_else(|| out_b.next());
            if got_a.is_some() && got_b.is_some() {
                break;
            }
            thread::sleep(StdDuration::from_millis(10));
        }
        assert_eq!(got_a, Some(7));
        assert_eq!(got_b, Some(7));
        stage.stop();
    }
}
