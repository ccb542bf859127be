//! Decoder implementation for HTTP response payloads.
//!
//! This module provides a unified decoder over the framing strategies a
//! response body may use:
//! - Content-Length based payloads
//! - Chunked transfer encoding (with trailer capture)
//! - Close-delimited payloads with no declared framing
//! - Messages with no body
//!
//! The exchange codec picks the strategy from the response head and drives
//! this decoder until it yields `Eof`.

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::codec::body::until_eof_decoder::UntilEofDecoder;
use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use http::HeaderMap;
use tokio_util::codec::Decoder;

/// A unified decoder for handling HTTP response payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    /// The specific decoding strategy to use
    kind: Kind,
}

/// Enum representing different payload decoding strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// Decode payload with a fixed content length
    Length(LengthDecoder),

    /// Decode payload using chunked transfer encoding
    Chunked(ChunkedDecoder),

    /// Decode payload delimited by the end of the stream
    UntilEof(UntilEofDecoder),

    /// Handle messages with no body
    NoBody,
}

impl PayloadDecoder {
    /// Creates a PayloadDecoder for messages with no body.
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    /// Creates a PayloadDecoder for chunked transfer encoding.
    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedDecoder::new()) }
    }

    /// Creates a PayloadDecoder for a fixed-length payload.
    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthDecoder::new(size)) }
    }

    /// Creates a PayloadDecoder for a close-delimited payload.
    pub fn until_eof() -> Self {
        Self { kind: Kind::UntilEof(UntilEofDecoder::new()) }
    }

    /// Returns whether this decoder handles chunked transfer encoding.
    pub fn is_chunked(&self) -> bool {
        matches!(self.kind, Kind::Chunked(_))
    }

    /// Returns whether this decoder handles messages with no body.
    pub fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::NoBody)
    }

    /// Returns whether this decoder handles fixed-length payloads.
    pub fn is_fix_length(&self) -> bool {
        matches!(self.kind, Kind::Length(_))
    }

    /// Returns whether this decoder reads until the end of the stream.
    pub fn is_until_eof(&self) -> bool {
        matches!(self.kind, Kind::UntilEof(_))
    }

    /// Returns the trailer section of the payload, once `Eof` was decoded.
    ///
    /// Only chunked payloads can carry trailers; every other framing yields
    /// an empty map.
    pub fn take_trailers(&mut self) -> Result<HeaderMap, ParseError> {
        match &mut self.kind {
            Kind::Chunked(chunked_decoder) => chunked_decoder.take_trailers(),
            _ => Ok(HeaderMap::new()),
        }
    }
}

/// Delegates to the appropriate decoder based on the payload framing.
impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode(src),
            Kind::UntilEof(until_eof_decoder) => until_eof_decoder.decode(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode_eof(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode_eof(src),
            Kind::UntilEof(until_eof_decoder) => until_eof_decoder.decode_eof(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_predicates() {
        assert!(PayloadDecoder::empty().is_empty());
        assert!(PayloadDecoder::chunked().is_chunked());
        assert!(PayloadDecoder::fix_length(10).is_fix_length());
        assert!(PayloadDecoder::until_eof().is_until_eof());
    }

    #[test]
    fn no_body_yields_immediate_eof() {
        let mut decoder = PayloadDecoder::empty();
        let mut buffer = BytesMut::new();
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert!(decoder.take_trailers().unwrap().is_empty());
    }

    #[test]
    fn non_chunked_payloads_have_no_trailers() {
        let mut decoder = PayloadDecoder::fix_length(0);
        let mut buffer = BytesMut::new();
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert!(decoder.take_trailers().unwrap().is_empty());
    }
}
