//! The message vocabulary shared by the exchange codec: request and response
//! heads, payload framing, and the error hierarchy.

mod error;
mod message;
mod request;
mod response;

pub use error::{HttpError, ParseError, SendError};
pub use message::{PayloadItem, PayloadSize};
pub use request::RequestHead;
pub use response::{
    content_length, is_chunked, reported_payload_size, ReasonPhrase, ResponseHead,
};

pub(crate) use request::redact;

use http::HeaderValue;

/// Returns true if `chunked` is the final transfer coding of the given
/// `Transfer-Encoding` value. Per RFC 7230 the chunked coding must come
/// last; `chunked, gzip` does not delimit the message.
pub(crate) fn chunked_transfer(header_value: Option<&HeaderValue>) -> bool {
    header_value
        .and_then(|value| value.to_str().ok())
        .and_then(|encodings| encodings.rsplit(',').next())
        .map(|last_encoding| last_encoding.trim().eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
}
