//! Decoder implementation for response bodies with a Content-Length header.
//!
//! This module provides functionality to decode bodies whose size is
//! specified by the Content-Length header, as defined in
//! [RFC 7230 Section 3.3.2](https://tools.ietf.org/html/rfc7230#section-3.3.2).

use std::cmp;

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// A decoder for handling a body with a known content length.
///
/// The decoder tracks the remaining bytes to be read; if the stream ends
/// before the count reaches zero the body was truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    /// The number of bytes remaining to be read from the payload
    length: u64,
}

impl LengthDecoder {
    /// Creates a decoder for a body of exactly `length` bytes.
    pub fn new(length: u64) -> Self {
        Self { length }
    }

    /// The number of body bytes still outstanding.
    pub fn remaining(&self) -> u64 {
        self.length
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Decodes bytes from the input buffer according to the content length.
    ///
    /// # Returns
    /// * `Ok(Some(PayloadItem::Eof))` when all bytes have been read
    /// * `Ok(Some(PayloadItem::Chunk(bytes)))` when a chunk is successfully decoded
    /// * `Ok(None)` when more data is needed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.length == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        // Read the minimum of remaining length and available bytes
        let len = cmp::min(self.length, src.len() as u64);
        let bytes = src.split_to(len as usize).freeze();

        self.length -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }

    /// End of stream with bytes still outstanding is a truncated body.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(ParseError::unexpected_eof("fixed-length body")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        let mut buffer: BytesMut = BytesMut::from(&b"101234567890abcdef\r\n\r\n"[..]);

        let mut length_decoder = LengthDecoder::new(10);
        let item = length_decoder.decode(&mut buffer);

        let payload = item.unwrap().unwrap();
        assert!(payload.is_chunk());

        let bytes = payload.as_bytes().unwrap();

        assert_eq!(bytes.len(), 10);

        assert_eq!(&bytes[..], b"1012345678");
        assert_eq!(&buffer[..], b"90abcdef\r\n\r\n");

        let eof = length_decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
    }

    #[test]
    fn zero_length_yields_immediate_eof() {
        let mut buffer = BytesMut::new();
        let mut decoder = LengthDecoder::new(0);
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn eof_before_length_is_truncation() {
        let mut buffer: BytesMut = BytesMut::from(&b"1234"[..]);
        let mut decoder = LengthDecoder::new(10);

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap().len(), 4);
        assert_eq!(decoder.remaining(), 6);

        let err = decoder.decode_eof(&mut buffer).unwrap_err();
        assert!(err.is_unexpected_eof());
    }
}
