//! Forward error correction: splitting an encoded packet into source+repair
//! symbols on send (C7), reassembling symbols keyed by block timestamp on
//! receive (C8), and running systematic decode on a complete block (C9).

pub mod block;
pub mod decoder;
pub mod decoder_cache;
pub mod encoder;
pub mod fec_error;

pub use block::{FecBlock, SymbolMeta};
pub use decoder::decode_block;
pub use decoder_cache::DecoderCache;
pub use encoder::encode_block;
pub use fec_error::FecError;
