//! # weft - event loop groups and frame decoding
//!
//! A small threading and framing core for connection-oriented servers:
//!
//! - **EventLoopGroup**: N single-threaded loops, picked round-robin, one
//!   per connection for the connection's whole life
//! - **Graceful shutdown**: quiet period then hard deadline, one
//!   termination signal for the whole group
//! - **Frame decoding**: split a byte stream at one or more delimiters,
//!   shortest frame first, with a bounded frame length
//! - **Zero-copy frames**: frames are `Bytes` slices of the connection
//!   buffer
//!
//! ## Quick Start
//!
//! ```ignore
//! use weft::{
//!     DecoderConfig, DelimiterBasedFrameDecoder, Delimiters, EventExecutorExt,
//!     EventLoopGroup, FrameAccumulator, GroupConfig,
//! };
//!
//! let group = EventLoopGroup::new(GroupConfig::from_env())?;
//!
//! // once per accepted connection
//! let event_loop = group.next();
//! let decoder = DelimiterBasedFrameDecoder::new(
//!     DecoderConfig::from_env(),
//!     Delimiters::line_delimiter(),
//! )?;
//! let mut frames = FrameAccumulator::new(decoder, conn_id);
//!
//! // every read from that connection runs on the same loop
//! event_loop.spawn(move || {
//!     frames.feed(&chunk, &mut sink);
//! })?;
//!
//! group.shutdown_gracefully_default().wait();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          weft                               │
//! │                   (facade, re-exports)                      │
//! └─────────────────────────────────────────────────────────────┘
//!          │                     │                     │
//!          ▼                     ▼                     ▼
//! ┌─────────────────┐  ┌───────────────────┐  ┌──────────────────┐
//! │   weft-core     │  │   weft-runtime    │  │   weft-codec     │
//! │ EventExecutor   │◀─│ SingleThreadEvent │  │ Decoder          │
//! │ Promise         │  │   Loop            │  │ Delimiter/Line   │
//! │ Chooser         │  │ ExecutorGroup     │  │ FrameAccumulator │
//! └─────────────────┘  └───────────────────┘  └──────────────────┘
//! ```

pub use weft_core::{
    BoxError, ChooserFactory, DefaultChooserFactory, EventExecutor, EventExecutorExt,
    ExecutorChooser, ExecutorError, ExecutorResult, GenericChooser, PowerOfTwoChooser, Promise,
    Task,
};

pub use weft_runtime::{
    ConfigError, EventLoopGroup, ExecutorGroup, GroupConfig, SingleThreadEventLoop, ThreadFactory,
};

pub use weft_codec::{
    Bytes, BytesMut, CodecError, CodecResult, DecodeState, Decoder, DecoderConfig,
    DelimiterBasedFrameDecoder, Delimiters, FrameAccumulator, FrameSink, LineBasedFrameDecoder,
};

/// Lower-level crates, for custom executors and choosers
pub use weft_codec;
pub use weft_core;
pub use weft_runtime;
