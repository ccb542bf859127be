//! Encoder implementation for HTTP/1.1 request heads.
//!
//! Writes the request line followed by `Name: value` header lines and the
//! terminating blank line, per
//! [RFC 7230 Section 3](https://tools.ietf.org/html/rfc7230#section-3).
//! Header names and values pass through as the caller supplied them; this
//! encoder frames, it does not validate.

use crate::protocol::{RequestHead, SendError};
use bytes::BytesMut;
use tokio_util::codec::Encoder;
use tracing::trace;

/// An encoder producing the wire form of a request head.
///
/// The request-target form is fixed at construction from the route: direct
/// connections use origin form, plaintext HTTP-proxy routes use absolute
/// form.
#[derive(Debug, Clone, Copy)]
pub struct RequestEncoder {
    absolute_form: bool,
}

impl RequestEncoder {
    /// Creates an encoder writing the given request-target form.
    pub fn new(absolute_form: bool) -> Self {
        Self { absolute_form }
    }
}

impl Encoder<&RequestHead> for RequestEncoder {
    type Error = SendError;

    fn encode(&mut self, head: &RequestHead, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let target = head.target(self.absolute_form);
        trace!(method = %head.method(), %target, "encoding request head");

        dst.reserve(target.len() + 64);
        dst.extend_from_slice(head.method().as_str().as_bytes());
        dst.extend_from_slice(b" ");
        dst.extend_from_slice(target.as_bytes());
        dst.extend_from_slice(b" HTTP/1.1\r\n");

        for (name, value) in head.headers() {
            dst.extend_from_slice(name.as_str().as_bytes());
            dst.extend_from_slice(b": ");
            dst.extend_from_slice(value.as_bytes());
            dst.extend_from_slice(b"\r\n");
        }

        dst.extend_from_slice(b"\r\n");
        Ok(())
    }
}
