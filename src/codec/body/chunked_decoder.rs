//! Decoder implementation for HTTP chunked transfer encoding.
//!
//! This module provides functionality to decode response bodies that use
//! chunked transfer encoding as specified in
//! [RFC 7230 Section 4.1](https://tools.ietf.org/html/rfc7230#section-4.1).
//!
//! Chunked encoding transmits the body as a series of chunks, each prefixed
//! with its size in hexadecimal. The terminating zero-length chunk may be
//! followed by a trailer section with the same grammar as headers; the
//! decoder captures it so the exchange can surface trailers to the caller.

use crate::protocol::{ParseError, PayloadItem};
use bytes::{Buf, Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::task::Poll;
use tokio_util::codec::Decoder;
use tracing::trace;
use ChunkedState::*;

/// Trailer sections share the header bound: a peer cannot smuggle an
/// oversized header block past the limit by tacking it onto the body.
const MAX_TRAILER_BYTES: usize = 8 * 1024;
const MAX_TRAILER_NUM: usize = 64;

/// A decoder for handling HTTP chunked transfer encoding.
///
/// The decoder processes incoming bytes according to the chunked format:
/// - Each chunk starts with its size in hexadecimal
/// - Followed by optional extensions and CRLF
/// - Then the chunk data and CRLF
/// - A zero-sized chunk indicates the end of the message
/// - An optional trailer section follows the zero-sized chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u64,
    /// Raw trailer section bytes, captured for parsing after Eof
    trailer_bytes: BytesMut,
}

impl ChunkedDecoder {
    /// Creates a new ChunkedDecoder instance.
    ///
    /// The decoder starts in the Size state, ready to read the size of the
    /// first chunk.
    pub fn new() -> Self {
        Self { state: Size, remaining_size: 0, trailer_bytes: BytesMut::new() }
    }

    /// Parses and returns the captured trailer section.
    ///
    /// Valid once `decode` has produced `PayloadItem::Eof`; the returned map
    /// is empty when the peer sent no trailers.
    pub fn take_trailers(&mut self) -> Result<HeaderMap, ParseError> {
        debug_assert_eq!(self.state, End);

        let mut section = std::mem::take(&mut self.trailer_bytes);
        if section.is_empty() {
            return Ok(HeaderMap::new());
        }
        // parse_headers wants the blank line that the state machine already
        // consumed
        section.extend_from_slice(b"\r\n");

        let mut parsed = [httparse::EMPTY_HEADER; MAX_TRAILER_NUM];
        let section = section.freeze();
        match httparse::parse_headers(&section, &mut parsed) {
            Ok(httparse::Status::Complete((_, headers))) => {
                let mut trailers = HeaderMap::with_capacity(headers.len());
                for header in headers {
                    let name = HeaderName::from_bytes(header.name.as_bytes())
                        .map_err(ParseError::invalid_header)?;
                    let value = HeaderValue::from_bytes(header.value)
                        .map_err(ParseError::invalid_header)?;
                    trailers.append(name, value);
                }
                trace!(count = trailers.len(), "parsed chunked trailers");
                Ok(trailers)
            }
            Ok(httparse::Status::Partial) => Err(ParseError::invalid_header("incomplete trailer section")),
            Err(httparse::Error::TooManyHeaders) => Err(ParseError::too_many_headers(MAX_TRAILER_NUM)),
            Err(e) => Err(ParseError::invalid_header(e.to_string())),
        }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the chunk size in hex
    Size,
    /// Handle whitespace after size
    SizeLws,
    /// Skip chunk extensions
    Extension,
    /// Read LF after chunk size
    SizeLf,
    /// Read chunk data
    Body,
    /// Read CR after chunk data
    BodyCr,
    /// Read LF after chunk data
    BodyLf,
    /// Read trailer field bytes
    Trailer,
    /// Read LF after a trailer field
    TrailerLf,
    /// Read final CR
    EndCr,
    /// Read final LF
    EndLf,
    /// Final state after reading last chunk
    End,
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Decodes chunked transfer encoded data from the input buffer.
    ///
    /// # Returns
    /// - `Ok(Some(PayloadItem::Chunk(bytes)))` when a chunk is successfully decoded
    /// - `Ok(Some(PayloadItem::Eof))` when the final chunk is processed
    /// - `Ok(None)` when more data is needed
    /// - `Err(ParseError)` if the chunked encoding is invalid
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == End {
                trace!("finished reading chunked data");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                // need more data
                return Ok(None);
            }

            let mut buf = None;

            self.state = match self.state.step(src, &mut self.remaining_size, &mut buf, &mut self.trailer_bytes) {
                Poll::Pending => return Ok(None),
                Poll::Ready(Ok(new_state)) => new_state,
                Poll::Ready(Err(e)) => return Err(e),
            };

            if let Some(bytes) = buf {
                trace!(len = bytes.len(), "read chunked bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }
        }
    }

    /// End of stream is only valid once the terminating chunk was read;
    /// anything earlier is a truncated body.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(ParseError::unexpected_eof("chunked body")),
        }
    }
}

macro_rules! try_next_byte {
    ($src:ident) => {{
        if $src.len() > 0 {
            $src.get_u8()
        } else {
            return Poll::Pending;
        }
    }};
}

impl ChunkedState {
    /// Processes the next step in the chunked decoding state machine.
    fn step(
        &self,
        src: &mut BytesMut,
        remaining_size: &mut u64,
        buf: &mut Option<Bytes>,
        trailers: &mut BytesMut,
    ) -> Poll<Result<ChunkedState, ParseError>> {
        match self {
            Size => ChunkedState::read_size(src, remaining_size),
            SizeLws => ChunkedState::read_size_lws(src),
            Extension => ChunkedState::read_extension(src),
            SizeLf => ChunkedState::read_size_lf(src, remaining_size),
            Body => ChunkedState::read_body(src, remaining_size, buf),
            BodyCr => ChunkedState::read_body_cr(src),
            BodyLf => ChunkedState::read_body_lf(src),
            Trailer => ChunkedState::read_trailer(src, trailers),
            TrailerLf => ChunkedState::read_trailer_lf(src, trailers),
            EndCr => ChunkedState::read_end_cr(src, trailers),
            EndLf => ChunkedState::read_end_lf(src),
            End => Poll::Ready(Ok(End)),
        }
    }

    /// Reads and parses the chunk size in hexadecimal format.
    ///
    /// The size is read digit by digit until a delimiter is encountered.
    /// Supports both uppercase and lowercase hex digits.
    fn read_size(src: &mut BytesMut, size_per_chunk: &mut u64) -> Poll<Result<ChunkedState, ParseError>> {
        macro_rules! or_overflow {
            ($e:expr) => {
                match $e {
                    Some(val) => val,
                    None => return Poll::Ready(Err(ParseError::invalid_chunk("chunk size overflow"))),
                }
            };
        }

        let radix = 16;
        match try_next_byte!(src) {
            b @ b'0'..=b'9' => {
                *size_per_chunk = or_overflow!(size_per_chunk.checked_mul(radix));
                *size_per_chunk = or_overflow!(size_per_chunk.checked_add((b - b'0') as u64));
            }

            b @ b'a'..=b'f' => {
                *size_per_chunk = or_overflow!(size_per_chunk.checked_mul(radix));
                *size_per_chunk = or_overflow!(size_per_chunk.checked_add((b + 10 - b'a') as u64));
            }
            b @ b'A'..=b'F' => {
                *size_per_chunk = or_overflow!(size_per_chunk.checked_mul(radix));
                *size_per_chunk = or_overflow!(size_per_chunk.checked_add((b + 10 - b'A') as u64));
            }
            b'\t' | b' ' => return Poll::Ready(Ok(SizeLws)),
            b';' => return Poll::Ready(Ok(Extension)),
            b'\r' => return Poll::Ready(Ok(SizeLf)),

            _ => return Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk size line"))),
        }

        Poll::Ready(Ok(Size))
    }

    /// Processes linear whitespace after the chunk size. Only tabs and
    /// spaces may follow the size; extensions start at a semicolon and CR
    /// ends the size line.
    fn read_size_lws(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            // LWS can follow the chunk size, but no more digits can come
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk size linear white space"))),
        }
    }

    /// Skips chunk extensions. Extensions must begin with `;` (enforced by
    /// the size states) and "end" at the next CRLF.
    ///
    /// Some implementations may not check for the CR, so to save them from
    /// themselves we reject extensions containing a plain LF as well.
    fn read_extension(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(SizeLf)),
            b'\n' => Poll::Ready(Err(ParseError::invalid_chunk("chunk extension contains newline"))),
            _ => Poll::Ready(Ok(Extension)), // no supported extensions
        }
    }

    /// Validates the LF byte after the chunk size line and checks for the
    /// terminating zero-length chunk.
    fn read_size_lf(src: &mut BytesMut, size_per_chunk: &mut u64) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => {
                if *size_per_chunk == 0 {
                    Poll::Ready(Ok(EndCr))
                } else {
                    Poll::Ready(Ok(Body))
                }
            }

            _ => Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk size LF"))),
        }
    }

    /// Reads the actual chunk data bytes, up to the remaining size of the
    /// current chunk.
    fn read_body(
        src: &mut BytesMut,
        size_per_chunk: &mut u64,
        buf: &mut Option<Bytes>,
    ) -> Poll<Result<ChunkedState, ParseError>> {
        if src.is_empty() {
            return Poll::Ready(Ok(Body));
        }

        if *size_per_chunk == 0 {
            return Poll::Ready(Ok(BodyCr));
        }

        // cap remaining bytes at the max capacity of usize
        let remaining = match *size_per_chunk {
            r if r > usize::MAX as u64 => usize::MAX,
            r => r as usize,
        };

        let read_size = std::cmp::min(remaining, src.len());

        *size_per_chunk -= read_size as u64;
        let bytes = src.split_to(read_size).freeze();
        *buf = Some(bytes);

        if *size_per_chunk > 0 {
            Poll::Ready(Ok(Body))
        } else {
            Poll::Ready(Ok(BodyCr))
        }
    }

    /// Validates the CR byte after chunk data.
    fn read_body_cr(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(BodyLf)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk body CR"))),
        }
    }

    /// Validates the LF byte after chunk data.
    fn read_body_lf(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(Size)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk body LF"))),
        }
    }

    /// Captures trailer field bytes after the last chunk, up to the CR that
    /// ends the current trailer line.
    fn read_trailer(src: &mut BytesMut, trailers: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        let b = try_next_byte!(src);
        if trailers.len() >= MAX_TRAILER_BYTES {
            return Poll::Ready(Err(ParseError::too_large_header(trailers.len(), MAX_TRAILER_BYTES)));
        }
        trailers.extend_from_slice(&[b]);
        match b {
            b'\r' => Poll::Ready(Ok(TrailerLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    /// Validates the LF byte after a trailer field.
    fn read_trailer_lf(src: &mut BytesMut, trailers: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => {
                trailers.extend_from_slice(b"\n");
                Poll::Ready(Ok(EndCr))
            }
            _ => Poll::Ready(Err(ParseError::invalid_chunk("invalid trailer end LF"))),
        }
    }

    /// Validates the final CR byte of the chunked message. Any other byte
    /// starts another trailer field.
    fn read_end_cr(src: &mut BytesMut, trailers: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(EndLf)),
            b => {
                trailers.extend_from_slice(&[b]);
                Poll::Ready(Ok(Trailer))
            }
        }
    }

    /// Validates the final LF byte of the chunked message.
    fn read_end_lf(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(End)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk end LF"))),
        }
    }
}
