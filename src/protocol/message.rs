use bytes::{Buf, Bytes};

/// Represents an item in an HTTP message payload stream.
///
/// This enum is produced by the body decoders and consumed by the body
/// encoders: either a chunk of payload data or the end of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    /// A chunk of payload data
    Chunk(Data),
    /// Marks the end of the payload stream
    Eof,
}

impl<Data: Buf> PayloadItem<Data> {
    /// Returns true if this item is a data chunk
    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }

    /// Returns true if this item marks the end of the payload
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    /// Returns the chunk data if this item is a chunk
    pub fn as_bytes(&self) -> Option<&Data> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}

/// Represents the framing of an HTTP message payload.
///
/// For a response this is the outcome of the framing decision of
/// [RFC 7230 Section 3.3.3](https://tools.ietf.org/html/rfc7230#section-3.3.3):
/// - Empty: HTTP semantics forbid a body (1xx, 204, 304, replies to HEAD)
/// - Chunked: `Transfer-Encoding: chunked`, length not known in advance
/// - Length: an explicit `Content-Length`
/// - Unknown: no framing information; the body runs until the peer closes
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// No payload is permitted
    Empty,
    /// Payload uses chunked transfer encoding
    Chunked,
    /// Payload with known length in bytes
    Length(u64),
    /// Payload is delimited only by the end of the stream
    Unknown,
}

impl PayloadSize {
    /// Returns true if the payload uses chunked transfer encoding
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    /// Returns true if no payload is permitted
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }

    /// Returns true if the payload length is only known once the stream ends
    #[inline]
    pub fn is_unknown(&self) -> bool {
        matches!(self, PayloadSize::Unknown)
    }

    /// The length reported to callers that think in `Content-Length` terms:
    /// `0` when no body is permitted, `-1` when the length is not known in
    /// advance (chunked or close-delimited), the declared length otherwise.
    pub fn reported_content_length(&self) -> i64 {
        match self {
            PayloadSize::Empty => 0,
            PayloadSize::Chunked | PayloadSize::Unknown => -1,
            PayloadSize::Length(length) => *length as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_item_accessors() {
        let chunk: PayloadItem = PayloadItem::Chunk(Bytes::from_static(b"hello"));
        assert!(chunk.is_chunk());
        assert!(!chunk.is_eof());
        assert_eq!(chunk.as_bytes().unwrap().len(), 5);

        let eof: PayloadItem = PayloadItem::Eof;
        assert!(eof.is_eof());
        assert!(eof.as_bytes().is_none());
    }

    #[test]
    fn reported_content_length() {
        assert_eq!(PayloadSize::Empty.reported_content_length(), 0);
        assert_eq!(PayloadSize::Chunked.reported_content_length(), -1);
        assert_eq!(PayloadSize::Unknown.reported_content_length(), -1);
        assert_eq!(PayloadSize::Length(42).reported_content_length(), 42);
    }
}
