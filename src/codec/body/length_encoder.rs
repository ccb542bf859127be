//! Encoder implementation for request bodies with a known content length.
//!
//! Bytes pass through verbatim; the framing is entirely carried by the
//! `Content-Length` header that was already written with the request head.

use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

/// An encoder for a body whose length was declared up front.
///
/// Tracks how many bytes are still owed so writes past the declared length
/// are dropped rather than corrupting the framing of the next message on
/// the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    received_eof: bool,
    remaining: u64,
}

impl LengthEncoder {
    /// Creates an encoder for a body of exactly `length` bytes.
    pub fn new(length: u64) -> Self {
        Self { received_eof: false, remaining: length }
    }

    /// Returns whether the declared length was written and EOF was seen.
    pub fn is_finished(&self) -> bool {
        self.remaining == 0 && self.received_eof
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(bytes) => {
                if !bytes.has_remaining() {
                    return Ok(());
                }
                if self.remaining == 0 {
                    warn!(extra = bytes.remaining(), "write past declared content length dropped");
                    return Ok(());
                }
                let n = (bytes.remaining() as u64).min(self.remaining);
                if (n as usize) < bytes.remaining() {
                    warn!(
                        extra = bytes.remaining() - n as usize,
                        "write past declared content length truncated"
                    );
                }
                dst.extend_from_slice(&bytes.chunk()[..n as usize]);
                self.remaining -= n;
                Ok(())
            }
            PayloadItem::Eof => {
                self.received_eof = true;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn passes_bytes_through_verbatim() {
        let mut encoder = LengthEncoder::new(5);
        let mut dst = BytesMut::new();
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"hello")), &mut dst).unwrap();
        assert_eq!(&dst[..], b"hello");

        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();
        assert_eq!(&dst[..], b"hello");
        assert!(encoder.is_finished());
    }

    #[test]
    fn drops_bytes_past_the_declared_length() {
        let mut encoder = LengthEncoder::new(3);
        let mut dst = BytesMut::new();
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"abcdef")), &mut dst).unwrap();
        assert_eq!(&dst[..], b"abc");

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"ghi")), &mut dst).unwrap();
        assert_eq!(&dst[..], b"abc");
    }
}
