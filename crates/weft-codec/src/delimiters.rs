//! Common delimiter sets

use bytes::Bytes;

/// Ready-made delimiter lists for `DelimiterBasedFrameDecoder`
pub struct Delimiters;

impl Delimiters {
    /// `\r\n` and `\n`; selects the line fast path
    pub fn line_delimiter() -> Vec<Bytes> {
        vec![Bytes::from_static(b"\r\n"), Bytes::from_static(b"\n")]
    }

    /// A single NUL byte, as used by Flash XML sockets and similar
    pub fn nul_delimiter() -> Vec<Bytes> {
        vec![Bytes::from_static(b"\0")]
    }
}
