//! Decoder trait

use bytes::BytesMut;

use crate::error::CodecResult;

/// Incremental decoder over a cumulation buffer.
///
/// `decode` is called whenever new bytes were appended to `buf`, and again
/// on the same buffer until it returns `Ok(None)`. Each call yields at most
/// one item and never blocks. Consumed bytes are removed from the front of
/// `buf`; bytes that do not yet form an item are left in place.
///
/// An `Err` is a report, not a terminal state: the buffer has already been
/// advanced past the offending data and decoding may continue.
pub trait Decoder {
    type Item;

    fn decode(&mut self, buf: &mut BytesMut) -> CodecResult<Option<Self::Item>>;
}

impl<D: Decoder + ?Sized> Decoder for Box<D> {
    type Item = D::Item;

    fn decode(&mut self, buf: &mut BytesMut) -> CodecResult<Option<Self::Item>> {
        (**self).decode(buf)
    }
}
