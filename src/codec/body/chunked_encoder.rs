//! Encoder implementation for HTTP chunked transfer encoding.
//!
//! This module provides functionality to encode a request body using chunked
//! transfer encoding as specified in
//! [RFC 7230 Section 4.1](https://tools.ietf.org/html/rfc7230#section-4.1).
//!
//! The chunked encoding allows the sender to transmit a body of unknown
//! length as a series of chunks, where each chunk is prefixed with its size
//! in hexadecimal format.

use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BytesMut};
use std::io::Write;
use tokio_util::codec::Encoder;

/// An encoder for handling HTTP chunked transfer encoding.
///
/// The encoder converts body data into chunks according to the chunked
/// format:
/// - Each chunk starts with its size in hexadecimal
/// - Followed by CRLF
/// - Then the chunk data and CRLF
/// - A zero-sized chunk indicates the end of the message
///
/// A zero-length data chunk is never emitted: the zero chunk is reserved for
/// the terminator, so empty writes are suppressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedEncoder {
    /// Indicates if the final zero-length chunk has been sent
    eof: bool,
}

impl ChunkedEncoder {
    /// Creates a new ChunkedEncoder instance.
    pub fn new() -> Self {
        Self { eof: false }
    }

    /// Returns whether the terminating zero-length chunk has been sent.
    pub fn is_finished(&self) -> bool {
        self.eof
    }
}

impl Default for ChunkedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Implementation of the Encoder trait for chunked transfer encoding.
///
/// - For PayloadItem::Chunk, writes the chunk size, data and terminating CRLF
/// - For PayloadItem::Eof, writes the final zero-length chunk
impl<D: Buf> Encoder<PayloadItem<D>> for ChunkedEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            return Ok(());
        }

        match item {
            PayloadItem::Chunk(bytes) => {
                // the zero chunk terminates the body, so empty writes must
                // not reach the wire
                if !bytes.has_remaining() {
                    return Ok(());
                }
                write!(helper::Writer(dst), "{:x}\r\n", bytes.remaining())?;
                dst.reserve(bytes.remaining() + 2);
                dst.extend_from_slice(bytes.chunk());
                dst.extend_from_slice(b"\r\n");
                Ok(())
            }
            PayloadItem::Eof => {
                self.eof = true;
                dst.extend_from_slice(b"0\r\n\r\n");
                Ok(())
            }
        }
    }
}

/// Helper module providing an io::Write implementation for BytesMut, used to
/// format chunk sizes in hexadecimal.
mod helper {
    use bytes::{BufMut, BytesMut};
    use std::io;

    pub struct Writer<'a>(pub &'a mut BytesMut);

    impl io::Write for Writer<'_> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.put_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn encode(encoder: &mut ChunkedEncoder, item: PayloadItem) -> BytesMut {
        let mut dst = BytesMut::new();
        encoder.encode(item, &mut dst).unwrap();
        dst
    }

    #[test]
    fn frames_chunks_with_hex_sizes() {
        let mut encoder = ChunkedEncoder::new();
        let dst = encode(&mut encoder, PayloadItem::Chunk(Bytes::from_static(b"hello")));
        assert_eq!(&dst[..], b"5\r\nhello\r\n");

        let dst = encode(&mut encoder, PayloadItem::Chunk(Bytes::from_static(&[b'x'; 26])));
        assert_eq!(&dst[..4], b"1a\r\n");
    }

    #[test]
    fn empty_chunk_is_suppressed() {
        let mut encoder = ChunkedEncoder::new();
        let dst = encode(&mut encoder, PayloadItem::Chunk(Bytes::new()));
        assert!(dst.is_empty());
        assert!(!encoder.is_finished());
    }

    #[test]
    fn eof_emits_terminator_once() {
        let mut encoder = ChunkedEncoder::new();
        let dst = encode(&mut encoder, PayloadItem::Eof);
        assert_eq!(&dst[..], b"0\r\n\r\n");
        assert!(encoder.is_finished());

        // anything after the terminator is dropped
        let dst = encode(&mut encoder, PayloadItem::Chunk(Bytes::from_static(b"late")));
        assert!(dst.is_empty());
        let dst = encode(&mut encoder, PayloadItem::Eof);
        assert!(dst.is_empty());
    }
}
