//! Encoder implementation for HTTP request payloads.
//!
//! This module provides a unified encoder over the two framings an outbound
//! request body may use: a declared content length, or chunked transfer
//! encoding for bodies of unknown length.

use crate::codec::body::chunked_encoder::ChunkedEncoder;
use crate::codec::body::length_encoder::LengthEncoder;
use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;

/// A unified encoder for handling HTTP request payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEncoder {
    /// The specific encoding strategy to use
    kind: Kind,
}

/// Enum representing different payload encoding strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// Encode payload with a fixed content length
    Length(LengthEncoder),

    /// Encode payload using chunked transfer encoding
    Chunked(ChunkedEncoder),
}

impl PayloadEncoder {
    /// Creates a PayloadEncoder for chunked transfer encoding.
    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedEncoder::new()) }
    }

    /// Creates a PayloadEncoder for a body of exactly `length` bytes.
    pub fn fix_length(length: u64) -> Self {
        Self { kind: Kind::Length(LengthEncoder::new(length)) }
    }

    /// Returns whether this encoder uses chunked transfer encoding.
    pub fn is_chunked(&self) -> bool {
        matches!(self.kind, Kind::Chunked(_))
    }
}

/// Delegates to the appropriate encoder based on the payload framing.
impl<D: Buf> Encoder<PayloadItem<D>> for PayloadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match &mut self.kind {
            Kind::Length(length_encoder) => length_encoder.encode(item, dst),
            Kind::Chunked(chunked_encoder) => chunked_encoder.encode(item, dst),
        }
    }
}
