//! Per-connection cumulation buffer and decode loop
//!
//! Bytes read from a connection are appended to one `BytesMut`; the decoder
//! is then run until it stops making progress. Frames are split off the
//! front of that buffer, so once every frame handed out has been dropped
//! and the buffer is drained, `BytesMut` reuses the allocation on the next
//! append.

use bytes::{Bytes, BytesMut};
use tracing::{trace, warn};

use crate::decoder::Decoder;
use crate::error::CodecError;

/// Receives decoded frames and decode errors for a connection
pub trait FrameSink {
    fn on_frame(&mut self, conn_id: u64, frame: Bytes);

    /// Decoding continues after this returns; closing the connection, if
    /// wanted, is up to the sink.
    fn on_error(&mut self, conn_id: u64, error: &CodecError);
}

/// Drives a decoder over a growing per-connection buffer
#[derive(Debug)]
pub struct FrameAccumulator<D> {
    decoder: D,
    conn_id: u64,
    buf: BytesMut,
}

impl<D: Decoder<Item = Bytes>> FrameAccumulator<D> {
    pub fn new(decoder: D, conn_id: u64) -> Self {
        Self {
            decoder,
            conn_id,
            buf: BytesMut::new(),
        }
    }

    pub fn conn_id(&self) -> u64 {
        self.conn_id
    }

    /// Readable bytes waiting for a delimiter
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Append `data` and decode as many frames as are complete.
    ///
    /// Returns the number of frames delivered to `sink`.
    pub fn feed<S: FrameSink + ?Sized>(&mut self, data: &[u8], sink: &mut S) -> usize {
        self.buf.extend_from_slice(data);

        let mut frames = 0;
        while !self.buf.is_empty() {
            let before = self.buf.len();
            match self.decoder.decode(&mut self.buf) {
                Ok(Some(frame)) => {
                    frames += 1;
                    sink.on_frame(self.conn_id, frame);
                }
                Ok(None) => {
                    if self.buf.len() == before {
                        break;
                    }
                }
                Err(e) => {
                    warn!(conn_id = self.conn_id, error = %e, "decode error");
                    sink.on_error(self.conn_id, &e);
                    if self.buf.len() == before {
                        break;
                    }
                }
            }
        }

        trace!(conn_id = self.conn_id, frames, buffered = self.buf.len(), "fed");
        frames
    }

    /// Give back whatever is still buffered, e.g. when the connection ends.
    ///
    /// Bytes dropped in discard mode are gone and are not part of this.
    pub fn into_remaining(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecoderConfig;
    use crate::delimiter::DelimiterBasedFrameDecoder;
    use crate::delimiters::Delimiters;
    use crate::line::LineBasedFrameDecoder;

    #[derive(Default)]
    struct Collect {
        frames: Vec<(u64, Bytes)>,
        errors: Vec<(u64, CodecError)>,
    }

    impl FrameSink for Collect {
        fn on_frame(&mut self, conn_id: u64, frame: Bytes) {
            self.frames.push((conn_id, frame));
        }

        fn on_error(&mut self, conn_id: u64, error: &CodecError) {
            self.errors.push((conn_id, error.clone()));
        }
    }

    impl Collect {
        fn payloads(&self) -> Vec<&[u8]> {
            self.frames.iter().map(|(_, f)| &f[..]).collect()
        }
    }

    #[test]
    fn test_feed_in_small_chunks() {
        let dec = DelimiterBasedFrameDecoder::new(
            DecoderConfig::new(64),
            Delimiters::line_delimiter(),
        )
        .unwrap();
        let mut acc = FrameAccumulator::new(dec, 7);
        let mut sink = Collect::default();

        let input = b"GET /\r\nHost: x\r\n\r\nbody";
        for chunk in input.chunks(3) {
            acc.feed(chunk, &mut sink);
        }

        assert_eq!(sink.payloads(), vec![&b"GET /"[..], &b"Host: x"[..], &b""[..]]);
        assert!(sink.frames.iter().all(|(id, _)| *id == 7));
        assert_eq!(acc.buffered(), 4);
        assert_eq!(&acc.into_remaining()[..], b"body");
    }

    #[test]
    fn test_feed_returns_frame_count() {
        let dec = DelimiterBasedFrameDecoder::with_delimiter(DecoderConfig::new(8), b"\0").unwrap();
        let mut acc = FrameAccumulator::new(dec, 1);
        let mut sink = Collect::default();

        assert_eq!(acc.feed(b"a\0b\0c", &mut sink), 2);
        assert_eq!(acc.feed(b"\0", &mut sink), 1);
        assert_eq!(acc.buffered(), 0);
    }

    #[test]
    fn test_error_then_resume() {
        let dec = LineBasedFrameDecoder::new(DecoderConfig::new(4)).unwrap();
        let mut acc = FrameAccumulator::new(dec, 3);
        let mut sink = Collect::default();

        acc.feed(b"ok\n0123456789", &mut sink);
        assert_eq!(sink.payloads(), vec![&b"ok"[..]]);
        assert_eq!(sink.errors, vec![(3, CodecError::too_long(4, 10))]);
        assert_eq!(acc.buffered(), 0);

        acc.feed(b"rest of it\nfine\n", &mut sink);
        assert_eq!(sink.payloads(), vec![&b"ok"[..], &b"fine"[..]]);
        assert_eq!(sink.errors.len(), 1);
    }

    #[test]
    fn test_oversized_with_delimiter_in_same_chunk() {
        let config = DecoderConfig::new(4).fail_fast(false);
        let dec = DelimiterBasedFrameDecoder::with_delimiter(config, b";").unwrap();
        let mut acc = FrameAccumulator::new(dec, 9);
        let mut sink = Collect::default();

        acc.feed(b"toolong;a;", &mut sink);
        assert_eq!(sink.errors, vec![(9, CodecError::too_long(4, 7))]);
        assert_eq!(sink.payloads(), vec![&b"a"[..]]);
    }
}
