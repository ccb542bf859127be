//! HTTP body handling module for request and response payloads
//!
//! This module provides functionality for encoding and decoding HTTP message
//! bodies using the transfer strategies of a client exchange: the request
//! side writes a declared-length or chunked body, the response side reads a
//! declared-length, chunked or close-delimited body.
//!
//! # Components
//!
//! ## Decoders
//! - [`ChunkedDecoder`]: chunked transfer encoded payloads, with trailer capture
//! - [`LengthDecoder`]: fixed-length payloads
//! - [`UntilEofDecoder`]: close-delimited payloads
//! - [`PayloadDecoder`]: unified decoder over the response strategies
//!
//! ## Encoders
//! - [`ChunkedEncoder`]: chunked transfer encoding
//! - [`LengthEncoder`]: fixed-length payload encoding
//! - [`PayloadEncoder`]: unified encoder over the request strategies
//!
//! All of them are `tokio_util::codec` state machines over `BytesMut`,
//! driven by the blocking [`ExchangeStream`](crate::connection::ExchangeStream).

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;
mod until_eof_decoder;

pub use chunked_decoder::ChunkedDecoder;
pub use chunked_encoder::ChunkedEncoder;
pub use length_decoder::LengthDecoder;
pub use length_encoder::LengthEncoder;
pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
pub use until_eof_decoder::UntilEofDecoder;
