//! Decoder configuration
//!
//! Same priority as the group config: builder setters, then environment
//! variables, then the defaults below.

use weft_core::env::{env_get, env_get_bool};

use crate::error::{CodecError, CodecResult};

pub mod defaults {
    pub const MAX_FRAME_LENGTH: usize = 8192;
    pub const STRIP_DELIMITER: bool = true;
    pub const FAIL_FAST: bool = true;
}

/// Limits and flags shared by all frame decoders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Longest frame, delimiter excluded, that is emitted
    pub max_frame_length: usize,
    /// Leave the matched delimiter out of emitted frames
    pub strip_delimiter: bool,
    /// Report an oversized frame as soon as it is detected rather than
    /// once the whole frame has been skipped
    pub fail_fast: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl DecoderConfig {
    /// Defaults with environment overrides.
    ///
    /// - `WEFT_MAX_FRAME_LENGTH`
    /// - `WEFT_STRIP_DELIMITER`
    /// - `WEFT_FAIL_FAST`
    pub fn from_env() -> Self {
        Self {
            max_frame_length: env_get("WEFT_MAX_FRAME_LENGTH", defaults::MAX_FRAME_LENGTH),
            strip_delimiter: env_get_bool("WEFT_STRIP_DELIMITER", defaults::STRIP_DELIMITER),
            fail_fast: env_get_bool("WEFT_FAIL_FAST", defaults::FAIL_FAST),
        }
    }

    /// Library defaults, environment ignored
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            max_frame_length,
            strip_delimiter: defaults::STRIP_DELIMITER,
            fail_fast: defaults::FAIL_FAST,
        }
    }

    pub fn max_frame_length(mut self, n: usize) -> Self {
        self.max_frame_length = n;
        self
    }

    pub fn strip_delimiter(mut self, strip: bool) -> Self {
        self.strip_delimiter = strip;
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn validate(&self) -> CodecResult<()> {
        if self.max_frame_length == 0 {
            return Err(CodecError::InvalidMaxFrameLength(self.max_frame_length));
        }
        Ok(())
    }
}
