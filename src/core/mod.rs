//! The `core` module contains the engine facade, stage-graph building
//! blocks (bounded queue, worker thread, frame model), and event handling.
mod constants;
pub mod engine;
pub mod engine_error;
pub mod events;
pub mod frame;
pub mod queue;
pub mod worker;
