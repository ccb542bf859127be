//! Error types for HTTP exchange handling
//!
//! This module provides error types for the error conditions that may occur
//! while encoding a request onto a connection and while decoding the response
//! that comes back.
//!
//! # Error Types
//!
//! - [`HttpError`]: The top-level error type that wraps all other error types
//!   - [`ParseError`]: Errors that occur while decoding the response
//!   - [`SendError`]: Errors that occur while encoding the request
//!
//! The error types form a hierarchy where `HttpError` is the top-level error
//! that can contain either a `ParseError` or `SendError`. Protocol violations
//! (bad framing on the wire, unsupported request shapes) and transport
//! failures are kept distinguishable through [`HttpError::is_protocol`] and
//! [`HttpError::is_io`]: protocol violations additionally poison the
//! connection for reuse, while plain I/O errors are reported as-is.
//!
//! Programmer errors — driving the exchange codec in the wrong lifecycle
//! state — are not represented here; they panic with a `state:` message.
use std::io;
use thiserror::Error;

/// The top-level error type for HTTP exchange operations
///
/// This enum represents all possible errors that can occur while driving one
/// request/response exchange over a connection.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Errors that occur while reading and decoding the response
    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: ParseError,
    },

    /// Errors that occur while encoding and writing the request
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: SendError,
    },
}

impl HttpError {
    /// Returns true if this error is a protocol violation: malformed framing
    /// received from the peer, or a request shape HTTP/1 cannot carry.
    pub fn is_protocol(&self) -> bool {
        match self {
            HttpError::ResponseError { source } => !matches!(source, ParseError::Io { .. }),
            HttpError::RequestError { source } => !matches!(source, SendError::Io { .. }),
        }
    }

    /// Returns true if this error is a transport failure.
    pub fn is_io(&self) -> bool {
        !self.is_protocol()
    }

    /// Returns the underlying transport error, if this is one.
    pub fn as_io(&self) -> Option<&io::Error> {
        match self {
            HttpError::ResponseError { source: ParseError::Io { source } } => Some(source),
            HttpError::RequestError { source: SendError::Io { source } } => Some(source),
            _ => None,
        }
    }
}

/// Errors that occur while decoding an HTTP response
///
/// This enum represents the error conditions that can occur while parsing
/// the status line, header blocks, body framing and trailers of a response.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Header section exceeds the maximum allowed size
    #[error("header section too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    /// Number of headers exceeds the maximum allowed
    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    /// Invalid header format or content
    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    /// Malformed status line
    #[error("invalid status line: {reason}")]
    InvalidStatusLine { reason: String },

    /// Unsupported HTTP version in the status line
    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    /// Invalid Content-Length header
    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    /// Invalid chunk size line or chunk framing
    #[error("invalid chunked body: {reason}")]
    InvalidChunk { reason: String },

    /// The stream ended before the message did
    #[error("unexpected end of stream while reading {context}")]
    UnexpectedEof { context: &'static str },

    /// I/O error while reading from the connection
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    /// Creates a new TooLargeHeader error
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    /// Creates a new TooManyHeaders error
    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    /// Creates a new InvalidHeader error
    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    /// Creates a new InvalidStatusLine error
    pub fn invalid_status_line<S: ToString>(str: S) -> Self {
        Self::InvalidStatusLine { reason: str.to_string() }
    }

    /// Creates a new InvalidContentLength error
    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    /// Creates a new InvalidChunk error
    pub fn invalid_chunk<S: ToString>(str: S) -> Self {
        Self::InvalidChunk { reason: str.to_string() }
    }

    /// Creates a new UnexpectedEof error
    pub fn unexpected_eof(context: &'static str) -> Self {
        Self::UnexpectedEof { context }
    }

    /// Creates a new I/O error
    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Returns true if the stream ended before the message did.
    pub fn is_unexpected_eof(&self) -> bool {
        matches!(self, Self::UnexpectedEof { .. })
    }
}

/// Converts a ParseError into the `io::Error` surfaced through `io::Read`
/// implementations. Transport errors pass through verbatim; protocol errors
/// are wrapped so callers can still downcast to the original [`ParseError`].
impl From<ParseError> for io::Error {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::Io { source } => source,
            eof @ ParseError::UnexpectedEof { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, eof),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

/// Errors that occur while encoding and sending an HTTP request
#[derive(Error, Debug)]
pub enum SendError {
    /// The request body cannot be expressed over HTTP/1
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    /// I/O error while writing to the connection
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    /// Creates a new InvalidBody error
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    /// Creates a new I/O error
    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Converts a SendError into the `io::Error` surfaced through `io::Write`
/// implementations.
impl From<SendError> for io::Error {
    fn from(e: SendError) -> Self {
        match e {
            SendError::Io { source } => source,
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}
