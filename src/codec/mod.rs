//! Encoder/decoder state machines for the client side of HTTP/1.1: header
//! codecs, body codecs, and the exchange lifecycle that drives one request
//! and one response over a pooled connection.

pub mod body;
mod exchange;
pub mod header;

pub use exchange::{
    Http1Codec, RequestBodyWriter, ResponseBodyReader, DISCARD_STREAM_TIMEOUT_MILLIS,
};
