//! HTTP response head handling implementation.
//!
//! This module provides type definitions for HTTP response heads. It uses
//! the standard `http::Response` type with an empty body placeholder, plus
//! the client-side helpers that decide how (and whether) a response body is
//! framed on the wire.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{Method, Response, StatusCode};

use crate::protocol::{chunked_transfer, PayloadSize};

/// Type alias for an HTTP response head.
///
/// This type represents the status line and header portion of an HTTP
/// response, using `http::Response<()>` with an empty body placeholder.
/// The body is read separately through the exchange codec.
pub type ResponseHead = Response<()>;

/// A non-standard reason phrase from a response status line.
///
/// `http::Response` does not carry the reason phrase, so the decoder stores
/// one in the response extensions whenever the peer sent something other
/// than the canonical phrase for the status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonPhrase(Bytes);

impl ReasonPhrase {
    pub(crate) fn new(phrase: Bytes) -> Self {
        Self(phrase)
    }

    /// The reason phrase as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The reason phrase as a string, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

/// Returns true if the response declares `Transfer-Encoding: chunked` as its
/// final transfer coding.
pub fn is_chunked(head: &ResponseHead) -> bool {
    chunked_transfer(head.headers().get(TRANSFER_ENCODING))
}

/// Returns the parsed `Content-Length` header, if present and valid.
pub fn content_length(head: &ResponseHead) -> Option<u64> {
    head.headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

/// Decides how the body of `head` is framed on the wire, per
/// [RFC 7230 Section 3.3.3](https://tools.ietf.org/html/rfc7230#section-3.3.3).
///
/// Responses that cannot carry a body — any 1xx, 204, 304, or a reply to a
/// HEAD request — report [`PayloadSize::Empty`]. Chunked transfer encoding
/// reports [`PayloadSize::Chunked`]. An explicit `Content-Length` reports
/// that length; anything else is [`PayloadSize::Unknown`] and runs until the
/// peer closes the stream.
pub fn reported_payload_size(head: &ResponseHead, request_method: &Method) -> PayloadSize {
    if request_method == Method::HEAD {
        return PayloadSize::Empty;
    }

    let status = head.status();
    if status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return PayloadSize::Empty;
    }

    if is_chunked(head) {
        return PayloadSize::Chunked;
    }

    match content_length(head) {
        Some(length) => PayloadSize::Length(length),
        None => PayloadSize::Unknown,
    }
}
