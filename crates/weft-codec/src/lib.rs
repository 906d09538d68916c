//! # weft-codec
//!
//! Splits a byte stream into frames at configured delimiters.
//!
//! Decoders work on a per-connection `BytesMut` cumulation buffer and hand
//! out frames as `Bytes` slices of that buffer; payload bytes are never
//! copied. A decoder instance belongs to one connection and is only ever
//! driven from that connection's event loop.
//!
//! ## Modules
//!
//! - `decoder` - `Decoder` trait
//! - `delimiter` - Multi-delimiter decoder (shortest frame wins)
//! - `line` - `\n` / `\r\n` fast path
//! - `delimiters` - Common delimiter sets
//! - `accumulator` - Cumulation buffer + decode loop feeding a `FrameSink`
//! - `config` - Decoder limits and flags
//! - `error` - `CodecError`

pub mod decoder;
pub mod delimiter;
pub mod line;
pub mod delimiters;
pub mod accumulator;
pub mod config;
pub mod error;

pub use decoder::Decoder;
pub use delimiter::{DecodeState, DelimiterBasedFrameDecoder};
pub use line::LineBasedFrameDecoder;
pub use delimiters::Delimiters;
pub use accumulator::{FrameAccumulator, FrameSink};
pub use config::DecoderConfig;
pub use error::{CodecError, CodecResult};

// Frames and buffers are plain `bytes` types
pub use bytes::{Bytes, BytesMut};
