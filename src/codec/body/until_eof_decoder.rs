//! Decoder implementation for response bodies with no declared framing.
//!
//! HTTP/1.0 peers (and misbehaving HTTP/1.1 ones) may send a body with
//! neither `Content-Length` nor `Transfer-Encoding: chunked`; the body then
//! runs until the peer closes the connection, per
//! [RFC 7230 Section 3.3.3](https://tools.ietf.org/html/rfc7230#section-3.3.3).
//! Since the end of the body is indistinguishable from a dropped connection,
//! a connection that carried one of these can never be reused.

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// A decoder that treats the end of the stream as the end of the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UntilEofDecoder {
    finished: bool,
}

impl UntilEofDecoder {
    /// Creates a new UntilEofDecoder instance.
    pub fn new() -> Self {
        Self { finished: false }
    }
}

impl Default for UntilEofDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for UntilEofDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.finished {
            return Ok(Some(PayloadItem::Eof));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let bytes = src.split().freeze();
        Ok(Some(PayloadItem::Chunk(bytes)))
    }

    /// End of stream is the only terminator this framing has.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if !src.is_empty() {
            let bytes = src.split().freeze();
            return Ok(Some(PayloadItem::Chunk(bytes)));
        }
        self.finished = true;
        Ok(Some(PayloadItem::Eof))
    }
}
