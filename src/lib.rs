//! streamweave is a real-time peer-to-peer live-streaming engine: capture
//! feeds frames in, the stage graph encodes and FEC-protects them onto RTP,
//! and the same graph runs in reverse on receive.
//!
//! The crate is a library with no bundled binary; a host application links it
//! and drives the engine facade directly. Capture devices, concrete codecs,
//! pixel conversion, and rendering are all supplied by the host.

/// Handles configuration loading and management.
pub mod config;
/// Contains the engine facade, stage-graph building blocks, and event handling.
pub mod core;
/// Forward error correction: symbol encode/decode and receive-side reassembly.
pub mod fec;
/// Logging utilities for the application.
pub mod log;
/// Handles media encoding and decoding.
pub mod media_agent;
/// RTCP (RTP Control Protocol) packet parsing and building.
pub mod rtcp;
/// RTP (Real-time Transport Protocol) packet parsing and building.
pub mod rtp;
/// Manages RTP sessions for sending and receiving media.
pub mod rtp_session;
/// Remote-peer aggregation: SSRC-to-display-name membership.
pub mod room;
/// Worker-thread pipeline stages connecting capture, codec, FEC, and network.
pub mod stage;
