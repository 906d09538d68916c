//! Multi-delimiter frame decoder
//!
//! Each call scans the readable bytes for every configured delimiter and
//! cuts at the one that yields the shortest frame. With delimiters
//! `"\n"` and `"\r\n"`, input `"ABC\nDEF\r\n"` therefore gives `"ABC"`
//! and `"DEF"`, never `"ABC\nDEF"`.
//!
//! Frames longer than `max_frame_length` are skipped. When no delimiter is
//! in sight and more than `max_frame_length` bytes are buffered, the
//! decoder drops everything it has and switches to discarding until the
//! next delimiter:
//!
//! ```text
//!             no delimiter, len > max
//!   Normal ───────────────────────────▶ Discarding { discarded }
//!     ▲                                      │  no delimiter: discarded += len
//!     └──────────── delimiter found ─────────┘
//! ```
//!
//! With `fail_fast` the error is reported on entering discard mode,
//! otherwise on leaving it.

use bytes::{Buf, Bytes, BytesMut};
use tracing::debug;

use crate::config::DecoderConfig;
use crate::decoder::Decoder;
use crate::error::{CodecError, CodecResult};
use crate::line::LineBasedFrameDecoder;

/// Decoder mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    Normal,
    /// Skipping an oversized frame; `discarded` bytes dropped so far
    Discarding { discarded: usize },
}

/// Splits frames at any of a set of delimiters
#[derive(Debug)]
pub struct DelimiterBasedFrameDecoder {
    delimiters: Vec<Bytes>,
    max_frame_length: usize,
    strip_delimiter: bool,
    fail_fast: bool,
    state: DecodeState,
    /// Set when the delimiters are exactly `\n` and `\r\n`
    line_based: Option<LineBasedFrameDecoder>,
}

impl DelimiterBasedFrameDecoder {
    /// Build a decoder over one or more non-empty delimiters.
    ///
    /// Delimiters are copied. On equal-length matches at the same offset the
    /// one listed first wins.
    pub fn new<I, D>(config: DecoderConfig, delimiters: I) -> CodecResult<Self>
    where
        I: IntoIterator<Item = D>,
        D: AsRef<[u8]>,
    {
        config.validate()?;

        let delimiters = delimiters
            .into_iter()
            .map(|d| {
                let d = d.as_ref();
                if d.is_empty() {
                    Err(CodecError::EmptyDelimiter)
                } else {
                    Ok(Bytes::copy_from_slice(d))
                }
            })
            .collect::<CodecResult<Vec<_>>>()?;

        if delimiters.is_empty() {
            return Err(CodecError::NoDelimiters);
        }

        let line_based = if is_line_based(&delimiters) {
            Some(LineBasedFrameDecoder::new(config)?)
        } else {
            None
        };

        Ok(Self {
            delimiters,
            max_frame_length: config.max_frame_length,
            strip_delimiter: config.strip_delimiter,
            fail_fast: config.fail_fast,
            state: DecodeState::Normal,
            line_based,
        })
    }

    /// Decoder with a single delimiter
    pub fn with_delimiter(config: DecoderConfig, delimiter: impl AsRef<[u8]>) -> CodecResult<Self> {
        Self::new(config, [delimiter])
    }

    pub fn delimiters(&self) -> &[Bytes] {
        &self.delimiters
    }

    /// Whether decoding is delegated to the line fast path
    pub fn is_line_based(&self) -> bool {
        self.line_based.is_some()
    }

    pub fn state(&self) -> DecodeState {
        match &self.line_based {
            Some(line) if line.is_discarding() => DecodeState::Discarding {
                discarded: line.discarded_bytes(),
            },
            Some(_) => DecodeState::Normal,
            None => self.state,
        }
    }

    /// Shortest frame length and the delimiter length that ends it
    fn find_shortest(&self, buf: &[u8]) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        for delim in &self.delimiters {
            if let Some(frame_length) = index_of(buf, delim) {
                if best.map_or(true, |(len, _)| frame_length < len) {
                    best = Some((frame_length, delim.len()));
                }
            }
        }
        best
    }

    fn fail(&self, frame_length: usize) -> CodecError {
        debug!(max = self.max_frame_length, frame_length, "frame too long");
        CodecError::too_long(self.max_frame_length, frame_length)
    }
}

impl Decoder for DelimiterBasedFrameDecoder {
    type Item = Bytes;

    fn decode(&mut self, buf: &mut BytesMut) -> CodecResult<Option<Bytes>> {
        if let Some(line) = self.line_based.as_mut() {
            return line.decode(buf);
        }

        match self.find_shortest(buf) {
            Some((frame_length, delim_length)) => {
                if let DecodeState::Discarding { discarded } = self.state {
                    self.state = DecodeState::Normal;
                    buf.advance(frame_length + delim_length);
                    if !self.fail_fast {
                        return Err(self.fail(discarded));
                    }
                    return Ok(None);
                }

                if frame_length > self.max_frame_length {
                    buf.advance(frame_length + delim_length);
                    return Err(self.fail(frame_length));
                }

                let frame = if self.strip_delimiter {
                    let frame = buf.split_to(frame_length).freeze();
                    buf.advance(delim_length);
                    frame
                } else {
                    buf.split_to(frame_length + delim_length).freeze()
                };
                Ok(Some(frame))
            }
            None => {
                let readable = buf.len();
                match self.state {
                    DecodeState::Normal => {
                        if readable > self.max_frame_length {
                            buf.clear();
                            self.state = DecodeState::Discarding {
                                discarded: readable,
                            };
                            if self.fail_fast {
                                return Err(self.fail(readable));
                            }
                        }
                    }
                    DecodeState::Discarding { discarded } => {
                        buf.clear();
                        self.state = DecodeState::Discarding {
                            discarded: discarded + readable,
                        };
                    }
                }
                Ok(None)
            }
        }
    }
}

/// Exactly `\n` and `\r\n`, in either order
fn is_line_based(delimiters: &[Bytes]) -> bool {
    if delimiters.len() != 2 {
        return false;
    }
    let (a, b) = (&delimiters[0][..], &delimiters[1][..]);
    (a == b"\r\n" && b == b"\n") || (a == b"\n" && b == b"\r\n")
}

/// Offset of the first full occurrence of `needle` in `haystack`.
///
/// A match that would run past the end of `haystack` is no match.
fn index_of(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    match needle {
        [b] => haystack.iter().position(|x| x == b),
        _ if needle.len() > haystack.len() => None,
        _ => haystack.windows(needle.len()).position(|w| w == needle),
    }
}
