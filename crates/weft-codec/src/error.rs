//! Codec error types

use thiserror::Error;

/// Result type for decoder construction and decoding
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised by frame decoders
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A configured delimiter has no bytes
    #[error("empty delimiter")]
    EmptyDelimiter,

    /// No delimiter was configured
    #[error("empty delimiters")]
    NoDelimiters,

    /// `max_frame_length` must be positive
    #[error("max_frame_length must be a positive integer: {0}")]
    InvalidMaxFrameLength(usize),

    /// A frame exceeded `max_frame_length` and was (or is being) discarded.
    ///
    /// `frame_length == 0` means the length is not known yet because the
    /// decoder is still discarding.
    #[error("{}", too_long_message(*.max_frame_length, *.frame_length))]
    TooLongFrame {
        max_frame_length: usize,
        frame_length: usize,
    },
}

impl CodecError {
    /// Configuration problem, as opposed to a problem with the data
    pub fn is_config(&self) -> bool {
        !matches!(self, CodecError::TooLongFrame { .. })
    }

    pub(crate) fn too_long(max_frame_length: usize, frame_length: usize) -> Self {
        CodecError::TooLongFrame {
            max_frame_length,
            frame_length,
        }
    }
}

fn too_long_message(max_frame_length: usize, frame_length: usize) -> String {
    if frame_length > 0 {
        format!(
            "frame length exceeds {}: {} - discarded",
            max_frame_length, frame_length
        )
    } else {
        format!("frame length exceeds {} - discarding", max_frame_length)
    }
}
