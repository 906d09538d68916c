//! Line decoder for `\n` and `\r\n`
//!
//! A `\r` directly in front of the `\n` belongs to the delimiter, a lone
//! `\r` anywhere else is payload. The decoder remembers how far it has
//! already scanned so a long line arriving in small pieces is not rescanned
//! from the start on every call.

use bytes::{Buf, Bytes, BytesMut};
use tracing::debug;

use crate::config::DecoderConfig;
use crate::decoder::Decoder;
use crate::error::{CodecError, CodecResult};

/// Splits on `\n` / `\r\n`
#[derive(Debug)]
pub struct LineBasedFrameDecoder {
    max_length: usize,
    strip_delimiter: bool,
    fail_fast: bool,
    discarding: bool,
    discarded_bytes: usize,
    /// Readable bytes already scanned without finding `\n`
    offset: usize,
}

impl LineBasedFrameDecoder {
    pub fn new(config: DecoderConfig) -> CodecResult<Self> {
        config.validate()?;
        Ok(Self {
            max_length: config.max_frame_length,
            strip_delimiter: config.strip_delimiter,
            fail_fast: config.fail_fast,
            discarding: false,
            discarded_bytes: 0,
            offset: 0,
        })
    }

    pub fn is_discarding(&self) -> bool {
        self.discarding
    }

    /// Bytes dropped in the current discard episode
    pub fn discarded_bytes(&self) -> usize {
        self.discarded_bytes
    }

    /// Index of the end of line (`\r` of `\r\n`, or the `\n`) and the
    /// delimiter length
    fn find_end_of_line(&mut self, buf: &BytesMut) -> Option<(usize, usize)> {
        let start = self.offset.min(buf.len());
        match buf[start..].iter().position(|&b| b == b'\n') {
            Some(pos) => {
                self.offset = 0;
                let i = start + pos;
                if i > 0 && buf[i - 1] == b'\r' {
                    Some((i - 1, 2))
                } else {
                    Some((i, 1))
                }
            }
            None => {
                self.offset = buf.len();
                None
            }
        }
    }

    fn fail(&self, frame_length: usize) -> CodecError {
        debug!(max = self.max_length, frame_length, "line too long");
        CodecError::too_long(self.max_length, frame_length)
    }
}

impl Decoder for LineBasedFrameDecoder {
    type Item = Bytes;

    fn decode(&mut self, buf: &mut BytesMut) -> CodecResult<Option<Bytes>> {
        let eol = self.find_end_of_line(buf);

        if !self.discarding {
            match eol {
                Some((length, delim_length)) => {
                    if length > self.max_length {
                        buf.advance(length + delim_length);
                        return Err(self.fail(length));
                    }

                    let frame = if self.strip_delimiter {
                        let frame = buf.split_to(length).freeze();
                        buf.advance(delim_length);
                        frame
                    } else {
                        buf.split_to(length + delim_length).freeze()
                    };
                    Ok(Some(frame))
                }
                None => {
                    let length = buf.len();
                    if length > self.max_length {
                        self.discarded_bytes = length;
                        buf.advance(length);
                        self.discarding = true;
                        self.offset = 0;
                        if self.fail_fast {
                            return Err(self.fail(length));
                        }
                    }
                    Ok(None)
                }
            }
        } else {
            match eol {
                Some((length, delim_length)) => {
                    let frame_length = self.discarded_bytes + length;
                    buf.advance(length + delim_length);
                    self.discarded_bytes = 0;
                    self.discarding = false;
                    if !self.fail_fast {
                        return Err(self.fail(frame_length));
                    }
                    Ok(None)
                }
                None => {
                    self.discarded_bytes += buf.len();
                    buf.clear();
                    self.offset = 0;
                    Ok(None)
                }
            }
        }
    }
}
