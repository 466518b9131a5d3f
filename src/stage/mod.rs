//! Stage shapes that bind bounded queues together and run a per-stage
//! worker thread (C4). A stage owns its input queue handle by shared
//! reference; the queue holds no back-pointer, so wakeups travel through
//! the queue's own condvar rather than a stage callback.

pub mod simo;
pub mod siso;

pub use simo::SimoStage;
pub use siso::SisoStage;
