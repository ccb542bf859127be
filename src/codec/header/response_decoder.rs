//! Decoder implementation for HTTP/1.1 response heads.
//!
//! Parses a status line (`HTTP/<major>.<minor> <code> [<reason>]`) followed
//! by a header block terminated by an empty line, producing a
//! [`ResponseHead`]. The accumulated header block is bounded: a peer that
//! streams an endless header section is rejected before it exhausts memory.
//!
//! One response may be preceded by any number of interim (1xx) heads; the
//! exchange codec simply runs this decoder once per head.

use crate::ensure;
use crate::protocol::{ParseError, ReasonPhrase, ResponseHead};
use bytes::{Bytes, BytesMut};
use http::{HeaderName, HeaderValue, Response, StatusCode};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

pub(crate) const MAX_HEADER_NUM: usize = 64;
pub(crate) const MAX_HEADER_BYTES: usize = 8 * 1024;

/// A decoder producing one [`ResponseHead`] per header block.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseHeadDecoder;

impl Decoder for ResponseHeadDecoder {
    type Item = ResponseHead;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut resp = httparse::Response::new(&mut headers);

        let parsed_result = resp.parse(src).map_err(|e| match e {
            httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            httparse::Error::Status => ParseError::invalid_status_line(e.to_string()),
            httparse::Error::Version => ParseError::InvalidVersion(None),
            e => ParseError::invalid_header(e.to_string()),
        });

        match parsed_result? {
            Status::Complete(head_size) => {
                trace!(head_size, "parsed response head");
                ensure!(
                    head_size <= MAX_HEADER_BYTES,
                    ParseError::too_large_header(head_size, MAX_HEADER_BYTES)
                );

                // compute the header bytes index before the borrow of src ends
                let mut header_index: [HeaderIndex; MAX_HEADER_NUM] = EMPTY_HEADER_INDEX_ARRAY;
                HeaderIndex::record(src, resp.headers, &mut header_index);
                let header_count = resp.headers.len();

                let version = match resp.version {
                    Some(0) => http::Version::HTTP_10,
                    Some(1) => http::Version::HTTP_11,
                    other => return Err(ParseError::InvalidVersion(other)),
                };

                let code = resp.code.ok_or_else(|| ParseError::invalid_status_line("missing status code"))?;
                let status = StatusCode::from_u16(code)
                    .map_err(|_| ParseError::invalid_status_line(format!("status code {code}")))?;

                // the reason phrase may be empty or non-canonical; keep it
                // only when it carries information
                let reason = match resp.reason {
                    Some(reason) if !reason.is_empty() && Some(reason) != status.canonical_reason() => {
                        Some(Bytes::copy_from_slice(reason.as_bytes()))
                    }
                    _ => None,
                };

                let mut builder = Response::builder().status(status).version(version);
                if let Some(reason) = reason {
                    builder = builder.extension(ReasonPhrase::new(reason));
                }

                let header_map = builder.headers_mut().ok_or_else(|| {
                    ParseError::invalid_header("response builder rejected parsed head")
                })?;
                header_map.reserve(header_count);

                let header_bytes = src.split_to(head_size).freeze();
                for index in &header_index[..header_count] {
                    // it's safe to use unwrap here because httparse has checked the header name is valid ASCII
                    let name = HeaderName::from_bytes(&header_bytes[index.name.0..index.name.1]).unwrap();

                    // SAFETY: httparse already checks header value is only visible ASCII bytes
                    // from_maybe_shared_unchecked contains debug assertions so they are omitted here
                    let value = unsafe {
                        HeaderValue::from_maybe_shared_unchecked(
                            header_bytes.slice(index.value.0..index.value.1),
                        )
                    };

                    header_map.append(name, value);
                }

                let head = builder.body(()).map_err(ParseError::invalid_header)?;
                Ok(Some(head))
            }
            Status::Partial => {
                ensure!(
                    src.len() <= MAX_HEADER_BYTES,
                    ParseError::too_large_header(src.len(), MAX_HEADER_BYTES)
                );
                Ok(None)
            }
        }
    }

    /// A response head can never end at end of stream; the connection died
    /// before (or while) the peer sent its status line and headers.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(ParseError::unexpected_eof("response headers")),
        }
    }
}

#[derive(Clone, Copy)]
struct HeaderIndex {
    pub(crate) name: (usize, usize),
    pub(crate) value: (usize, usize),
}

const EMPTY_HEADER_INDEX: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

const EMPTY_HEADER_INDEX_ARRAY: [HeaderIndex; MAX_HEADER_NUM] = [EMPTY_HEADER_INDEX; MAX_HEADER_NUM];

impl HeaderIndex {
    fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, indices) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            let name_end = name_start + header.name.len();
            indices.name = (name_start, name_end);
            let value_start = header.value.as_ptr() as usize - bytes_ptr;
            let value_end = value_start + header.value.len();
            indices.value = (value_start, value_end);
        }
    }
}
