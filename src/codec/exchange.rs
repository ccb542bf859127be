//! The HTTP/1.1 exchange codec.
//!
//! [`Http1Codec`] serializes one HTTP/1.1 request and parses one HTTP/1.1
//! response over a reusable byte-stream socket. The exchange moves through a
//! strict linear lifecycle:
//!
//! 1. write request headers
//! 2. optionally stream the request body (known-length or chunked)
//! 3. read response headers, looping past interim (1xx) responses
//! 4. stream the response body (fixed-length, chunked or close-delimited)
//!
//! Exactly one thread drives the codec through its lifecycle; the socket is
//! shared with a connection pool, so any deviation from the lifecycle — or
//! any framing the codec cannot trust — retires the connection through the
//! [`Carrier`] rather than risking a corrupted follow-up exchange. Calling
//! an operation out of order is a caller bug and panics with the current
//! state.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, Bytes};
use http::{HeaderMap, Method, Uri};
use tracing::{debug, trace, warn};

use crate::codec::body::{PayloadDecoder, PayloadEncoder};
use crate::codec::header::{RequestEncoder, ResponseHeadDecoder};
use crate::connection::{Carrier, CookieJar, ExchangeStream, Transport};
use crate::protocol::{
    content_length, redact, reported_payload_size, HttpError, ParseError, PayloadItem,
    PayloadSize, RequestHead, ResponseHead, SendError,
};

/// How long an early-closed response body may spend draining its remainder
/// before the connection is given up for reuse.
pub const DISCARD_STREAM_TIMEOUT_MILLIS: u64 = 100;

/// The lifecycle states of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    OpenRequestBody,
    WritingRequestBody,
    ReadResponseHeaders,
    OpenResponseBody,
    ReadingResponseBody,
    Closed,
}

/// The trailers slot, populated when the response body terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Trailers {
    /// The body completed normally; empty unless the peer sent trailers.
    Headers(HeaderMap),
    /// The body ended abnormally; trailers are unreadable.
    Truncated,
}

/// A codec driving one HTTP/1.1 request/response exchange over a socket.
pub struct Http1Codec<T> {
    carrier: Arc<dyn Carrier>,
    cookie_jar: Arc<dyn CookieJar>,
    stream: ExchangeStream<T>,
    state: State,
    trailers: Option<Trailers>,
    request_method: Option<Method>,
    request_url: Option<Uri>,
}

impl<T: Transport> Http1Codec<T> {
    /// Creates a codec for one exchange over `stream`.
    pub fn new(
        carrier: Arc<dyn Carrier>,
        cookie_jar: Arc<dyn CookieJar>,
        stream: ExchangeStream<T>,
    ) -> Self {
        Self {
            carrier,
            cookie_jar,
            stream,
            state: State::Idle,
            trailers: None,
            request_method: None,
            request_url: None,
        }
    }

    /// Writes the request line and headers.
    ///
    /// The request-target form follows the carrier's route: origin form for
    /// direct connections, absolute form through a plaintext HTTP proxy.
    ///
    /// # Panics
    ///
    /// Panics if the exchange is not idle.
    pub fn write_request_headers(&mut self, head: &RequestHead) -> Result<(), HttpError> {
        assert!(self.state == State::Idle, "state: {:?}", self.state);

        let mut encoder = RequestEncoder::new(self.carrier.route().uses_absolute_form());
        self.stream.write_frame(&mut encoder, head)?;

        self.request_method = Some(head.method().clone());
        self.request_url = Some(head.uri().clone());
        self.state = State::OpenRequestBody;
        debug!(method = %head.method(), url = %head.redacted_url(), "wrote request headers");
        Ok(())
    }

    /// Opens a writer for the request body.
    ///
    /// Chunked transfer encoding is used when the request declares it;
    /// otherwise `content_length` must be non-negative and the body passes
    /// through verbatim. Duplex bodies cannot be expressed over HTTP/1 and
    /// are rejected.
    ///
    /// # Panics
    ///
    /// Panics if request headers were not just written, or if the caller
    /// supplied neither chunked encoding nor a known length.
    pub fn create_request_body(
        &mut self,
        head: &RequestHead,
        content_length: i64,
    ) -> Result<RequestBodyWriter<'_, T>, HttpError> {
        assert!(self.state == State::OpenRequestBody, "state: {:?}", self.state);

        if head.is_duplex() {
            return Err(SendError::invalid_body("duplex request bodies are not supported over HTTP/1").into());
        }

        let encoder = if head.is_chunked() {
            PayloadEncoder::chunked()
        } else if content_length >= 0 {
            PayloadEncoder::fix_length(content_length as u64)
        } else {
            panic!("cannot stream a request body without chunked encoding or a known content length");
        };

        self.state = State::WritingRequestBody;
        trace!(chunked = encoder.is_chunked(), "opened request body");
        Ok(RequestBodyWriter { codec: self, encoder })
    }

    /// Flushes the request to the socket.
    pub fn flush_request(&mut self) -> Result<(), HttpError> {
        self.stream.flush().map_err(SendError::io)?;
        Ok(())
    }

    /// Flushes the request to the socket, including the body if one was
    /// written. The outbound direction is never half-closed: the connection
    /// must survive into the response.
    pub fn finish_request(&mut self) -> Result<(), HttpError> {
        self.stream.flush().map_err(SendError::io)?;
        Ok(())
    }

    /// Reads one response header block.
    ///
    /// Returns `Ok(None)` when `expect_continue` is set and the peer sent
    /// `100 Continue`: the caller decides when to resume and must call again
    /// with `expect_continue = false`. Interim responses (100 without
    /// expectation, or any code in `[102, 200)`) are returned to the caller
    /// and leave the codec ready for the next header block; the first code
    /// `>= 200` (or 101) is final and opens the response body.
    ///
    /// # Panics
    ///
    /// Panics if a response body is already open or the exchange is closed.
    pub fn read_response_headers(&mut self, expect_continue: bool) -> Result<Option<ResponseHead>, HttpError> {
        assert!(
            matches!(
                self.state,
                State::Idle | State::OpenRequestBody | State::WritingRequestBody | State::ReadResponseHeaders
            ),
            "state: {:?}",
            self.state
        );

        let mut decoder = ResponseHeadDecoder;
        let head = match self.stream.read_frame(&mut decoder) {
            Ok(Some(head)) => head,
            Ok(None) => return Err(self.unexpected_end_of_stream().into()),
            Err(e) if e.is_unexpected_eof() => return Err(self.unexpected_end_of_stream().into()),
            Err(e) => return Err(e.into()),
        };

        let code = head.status().as_u16();
        trace!(code, "read response head");
        match code {
            100 if expect_continue => Ok(None),
            100 => {
                self.state = State::ReadResponseHeaders;
                Ok(Some(head))
            }
            // Everything below 200 (except 100 and 101) leaves the codec
            // receptive to another header block. Only 100, 102 and 103 are
            // defined interim codes; the rest of the range never occurs on
            // the wire but is handled the same way.
            102..=199 => {
                self.state = State::ReadResponseHeaders;
                Ok(Some(head))
            }
            _ => {
                self.state = State::OpenResponseBody;
                Ok(Some(head))
            }
        }
    }

    /// The framing of `response`'s body, given the request that elicited it.
    pub fn reported_payload_size(&self, response: &ResponseHead) -> PayloadSize {
        let method = self.request_method.clone().unwrap_or(Method::GET);
        reported_payload_size(response, &method)
    }

    /// Opens a reader over the response body.
    ///
    /// When the framing is close-delimited (no length, no chunking) the
    /// carrier is retired immediately: once that body ends there is no way
    /// to tell the next exchange's bytes from this one's.
    ///
    /// # Panics
    ///
    /// Panics unless a final response head was just read.
    pub fn open_response_body(&mut self, response: &ResponseHead) -> Result<ResponseBodyReader<'_, T>, HttpError> {
        assert!(self.state == State::OpenResponseBody, "state: {:?}", self.state);

        let size = self.reported_payload_size(response);
        let decoder = match size {
            PayloadSize::Empty => PayloadDecoder::fix_length(0),
            PayloadSize::Chunked => PayloadDecoder::chunked(),
            PayloadSize::Length(length) => PayloadDecoder::fix_length(length),
            PayloadSize::Unknown => {
                self.carrier.no_new_exchanges();
                PayloadDecoder::until_eof()
            }
        };

        self.state = State::ReadingResponseBody;
        debug!(?size, "opened response body");

        let mut reader = ResponseBodyReader {
            codec: self,
            decoder,
            pending: Bytes::new(),
            finished: false,
        };
        // A body of zero bytes is already complete; close out the exchange
        // so the connection can go back to the pool right away.
        if matches!(size, PayloadSize::Empty | PayloadSize::Length(0)) {
            if let Err(e) = reader.complete() {
                return Err(e.into());
            }
        }
        Ok(reader)
    }

    /// Returns the response trailers.
    ///
    /// `Ok(None)` while the body has not finished; an I/O error when the
    /// body was truncated and the trailers never arrived.
    ///
    /// # Panics
    ///
    /// Panics unless a response body is open or the exchange is closed.
    pub fn peek_trailers(&mut self) -> Result<Option<HeaderMap>, HttpError> {
        assert!(
            matches!(self.state, State::ReadingResponseBody | State::Closed),
            "state: {:?}",
            self.state
        );

        match &self.trailers {
            Some(Trailers::Truncated) => Err(ParseError::io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "trailers cannot be read because the response body was truncated",
            ))
            .into()),
            Some(Trailers::Headers(headers)) => Ok(Some(headers.clone())),
            None => Ok(None),
        }
    }

    /// Drains the body of a CONNECT response before the tunnel is used.
    ///
    /// A CONNECT response should not declare a body at all; when one does,
    /// its bytes must be consumed so they are not mistaken for tunnel data.
    pub fn skip_connect_body(&mut self, response: &ResponseHead) -> Result<(), HttpError> {
        let Some(declared) = content_length(response) else {
            return Ok(());
        };
        assert!(self.state == State::OpenResponseBody, "state: {:?}", self.state);

        if declared > 0 {
            warn!(declared, "CONNECT response declared a body, draining it before tunnel use");
        }
        self.state = State::ReadingResponseBody;
        let mut reader = ResponseBodyReader {
            codec: self,
            decoder: PayloadDecoder::fix_length(declared),
            pending: Bytes::new(),
            finished: false,
        };

        let mut sink = [0u8; 8 * 1024];
        loop {
            match Read::read(&mut reader, &mut sink) {
                Ok(0) => return Ok(()),
                Ok(_) => continue,
                Err(e) => return Err(ParseError::io(e).into()),
            }
        }
    }

    /// Aborts the underlying socket. May be called from any thread.
    pub fn cancel(&self) {
        self.carrier.cancel();
    }

    /// Returns true once the response body has fully terminated.
    pub fn is_response_complete(&self) -> bool {
        self.state == State::Closed
    }

    fn unexpected_end_of_stream(&self) -> ParseError {
        let io_err = io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("unexpected end of stream on {}", self.redacted_url()),
        );
        self.carrier.track_failure(Some(&io_err));
        ParseError::io(io_err)
    }

    fn redacted_url(&self) -> String {
        match &self.request_url {
            Some(url) => redact(url),
            None => redact(self.carrier.route().address()),
        }
    }

    /// Records trailers and hands any cookies they carry to the jar, the
    /// same way response headers are handed to it upstream.
    fn install_trailers(&mut self, trailers: HeaderMap) {
        if !trailers.is_empty() {
            let url = self
                .request_url
                .clone()
                .unwrap_or_else(|| self.carrier.route().address().clone());
            self.cookie_jar.save_from_response(&url, &trailers);
        }
        self.trailers = Some(Trailers::Headers(trailers));
    }

    /// The body stream ended; detach its timeouts so the pooled connection
    /// carries no stale deadline, and close the exchange.
    fn response_body_complete(&mut self) {
        self.stream.detach_timeouts();
        self.state = State::Closed;
    }

    /// The body stream ended abnormally: the connection cannot be trusted
    /// for another exchange and the trailers are unreadable.
    fn response_body_truncated(&mut self, error: Option<&io::Error>) {
        self.carrier.track_failure(error);
        self.carrier.no_new_exchanges();
        self.trailers = Some(Trailers::Truncated);
        self.response_body_complete();
    }
}

/// A writer streaming the request body onto the socket.
///
/// Obtained from [`Http1Codec::create_request_body`]; the body is not
/// complete until [`RequestBodyWriter::finish`] runs, which writes the
/// chunked terminator (known-length bodies emit no framing) and readies the
/// codec for the response.
pub struct RequestBodyWriter<'a, T: Transport> {
    codec: &'a mut Http1Codec<T>,
    encoder: PayloadEncoder,
}

impl<T: Transport> RequestBodyWriter<'_, T> {
    /// Completes the body and transitions the exchange to reading response
    /// headers.
    pub fn finish(mut self) -> Result<(), HttpError> {
        debug_assert_eq!(self.codec.state, State::WritingRequestBody);
        self.codec.stream.write_frame(&mut self.encoder, PayloadItem::<Bytes>::Eof)?;
        self.codec.stream.detach_timeouts();
        self.codec.state = State::ReadResponseHeaders;
        trace!("finished request body");
        Ok(())
    }
}

impl<T: Transport> Write for RequestBodyWriter<'_, T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let item = PayloadItem::Chunk(Bytes::copy_from_slice(buf));
        self.codec.stream.write_frame(&mut self.encoder, item).map_err(io::Error::from)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.codec.stream.flush()
    }
}

/// A lazy reader over the response body.
///
/// Obtained from [`Http1Codec::open_response_body`]. Reading to the end
/// installs the trailers and closes the exchange; dropping the reader early
/// tries to drain the remainder within [`DISCARD_STREAM_TIMEOUT_MILLIS`] so
/// the connection stays reusable, and otherwise retires it.
pub struct ResponseBodyReader<'a, T: Transport> {
    codec: &'a mut Http1Codec<T>,
    decoder: PayloadDecoder,
    pending: Bytes,
    finished: bool,
}

impl<T: Transport> ResponseBodyReader<'_, T> {
    /// Returns true once the body has fully terminated.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Clean termination: install trailers and close the exchange.
    fn complete(&mut self) -> Result<(), ParseError> {
        self.finished = true;
        match self.decoder.take_trailers() {
            Ok(trailers) => {
                self.codec.install_trailers(trailers);
                self.codec.response_body_complete();
                Ok(())
            }
            Err(e) => {
                // the body framing ended but its trailer section is garbage;
                // the connection cannot be trusted
                self.codec.response_body_truncated(None);
                Err(e)
            }
        }
    }

    /// Abnormal termination: mark the truncation and surface the error.
    fn fail(&mut self, e: ParseError) -> io::Error {
        self.finished = true;
        let io_err: io::Error = e.into();
        self.codec.response_body_truncated(Some(&io_err));
        io_err
    }

    /// Attempts to read the remainder of the body within the discard
    /// timeout. Returns true if the body terminated cleanly.
    fn discard(&mut self) -> bool {
        if self
            .codec
            .stream
            .set_read_timeout(Some(Duration::from_millis(DISCARD_STREAM_TIMEOUT_MILLIS)))
            .is_err()
        {
            return false;
        }

        let mut sink = [0u8; 8 * 1024];
        loop {
            match Read::read(self, &mut sink) {
                Ok(0) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    }
}

impl<T: Transport> Read for ResponseBodyReader<'_, T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if !self.pending.is_empty() {
                let n = self.pending.len().min(buf.len());
                buf[..n].copy_from_slice(&self.pending[..n]);
                self.pending.advance(n);
                return Ok(n);
            }

            if self.finished {
                return Ok(0);
            }

            match self.codec.stream.read_frame(&mut self.decoder) {
                Ok(Some(PayloadItem::Chunk(bytes))) => {
                    self.pending = bytes;
                }
                Ok(Some(PayloadItem::Eof)) | Ok(None) => {
                    self.complete().map_err(io::Error::from)?;
                    return Ok(0);
                }
                Err(e) => return Err(self.fail(e)),
            }
        }
    }
}

impl<T: Transport> Drop for ResponseBodyReader<'_, T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // closed before the body ended: drain the remainder if that is
        // quick, otherwise the connection is done for
        if !self.discard() && !self.finished {
            self.finished = true;
            self.codec.response_body_truncated(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::mock::{MockCarrier, MockCookieJar, MockTransport, MockTransportObserver};
    use crate::connection::{NoCookies, Route};
    use http::{Request, StatusCode, Uri};
    use std::sync::Arc as StdArc;

    struct Exchange {
        codec: Http1Codec<MockTransport>,
        carrier: StdArc<MockCarrier>,
        cookies: StdArc<MockCookieJar>,
        wire: MockTransportObserver,
    }

    fn exchange(transport: MockTransport) -> Exchange {
        let carrier = MockCarrier::direct();
        let cookies = MockCookieJar::new();
        let wire = transport.observer();
        let codec = Http1Codec::new(carrier.clone(), cookies.clone(), ExchangeStream::new(transport));
        Exchange { codec, carrier, cookies, wire }
    }

    fn get_head(uri: &str) -> RequestHead {
        Request::builder().method(Method::GET).uri(uri).body(()).unwrap().into()
    }

    fn post_head(uri: &str) -> RequestHead {
        Request::builder().method(Method::POST).uri(uri).body(()).unwrap().into()
    }

    #[test]
    fn simple_get_round_trip() {
        let transport = MockTransport::with_bytes(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi");
        let mut ex = exchange(transport);

        ex.codec.write_request_headers(&get_head("http://example.com/a?b=c")).unwrap();
        ex.codec.finish_request().unwrap();
        assert!(ex.wire.written().starts_with(b"GET /a?b=c HTTP/1.1\r\n"));

        let head = ex.codec.read_response_headers(false).unwrap().unwrap();
        assert_eq!(head.status(), StatusCode::OK);

        let mut body = Vec::new();
        {
            let mut reader = ex.codec.open_response_body(&head).unwrap();
            reader.read_to_end(&mut body).unwrap();
        }
        assert_eq!(body, b"hi");
        assert!(ex.codec.is_response_complete());
        assert_eq!(ex.codec.peek_trailers().unwrap().unwrap().len(), 0);
        assert_eq!(ex.carrier.no_new_exchanges_calls(), 0);
        assert!(ex.cookies.saved().is_empty());
    }

    #[test]
    fn known_length_request_body_writes_verbatim() {
        let transport = MockTransport::with_bytes(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
        let mut ex = exchange(transport);

        let head: RequestHead = Request::builder()
            .method(Method::POST)
            .uri("http://example.com/upload")
            .header("Content-Length", "5")
            .body(())
            .unwrap()
            .into();

        ex.codec.write_request_headers(&head).unwrap();
        {
            let mut writer = ex.codec.create_request_body(&head, 5).unwrap();
            writer.write_all(b"hello").unwrap();
            writer.finish().unwrap();
        }
        ex.codec.finish_request().unwrap();

        let wire = ex.wire.written();
        assert!(wire.ends_with(b"\r\n\r\nhello"));

        let head = ex.codec.read_response_headers(false).unwrap().unwrap();
        let _ = ex.codec.open_response_body(&head).unwrap();
        assert!(ex.codec.is_response_complete());
    }

    #[test]
    fn chunked_request_body_frames_each_write() {
        let transport = MockTransport::with_bytes(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
        let mut ex = exchange(transport);

        let head: RequestHead = Request::builder()
            .method(Method::POST)
            .uri("http://example.com/upload")
            .header("Transfer-Encoding", "chunked")
            .body(())
            .unwrap()
            .into();

        ex.codec.write_request_headers(&head).unwrap();
        {
            let mut writer = ex.codec.create_request_body(&head, -1).unwrap();
            writer.write_all(b"hello").unwrap();
            // a zero-length write must not emit the terminating chunk
            writer.write_all(b"").unwrap();
            writer.write_all(b"!").unwrap();
            writer.finish().unwrap();
        }

        let wire = ex.wire.written();
        let text = String::from_utf8(wire).unwrap();
        assert!(text.ends_with("\r\n\r\n5\r\nhello\r\n1\r\n!\r\n0\r\n\r\n"), "wire: {text:?}");
    }

    #[test]
    fn duplex_request_body_is_rejected() {
        let transport = MockTransport::with_bytes(b"");
        let mut ex = exchange(transport);

        let head = post_head("http://example.com/stream").with_duplex(true);
        ex.codec.write_request_headers(&head).unwrap();
        let err = match ex.codec.create_request_body(&head, -1) {
            Err(e) => e,
            Ok(_) => panic!("duplex body must be rejected"),
        };
        assert!(err.is_protocol());
    }

    #[test]
    #[should_panic(expected = "cannot stream a request body")]
    fn request_body_without_framing_is_a_caller_bug() {
        let transport = MockTransport::with_bytes(b"");
        let mut ex = exchange(transport);

        let head = post_head("http://example.com/upload");
        ex.codec.write_request_headers(&head).unwrap();
        let _ = ex.codec.create_request_body(&head, -1);
    }

    #[test]
    fn absolute_form_through_http_proxy() {
        let carrier = MockCarrier::new(Route::http_proxy(Uri::from_static("http://example.com/")));
        let transport = MockTransport::with_bytes(b"");
        let wire = transport.observer();
        let mut codec = Http1Codec::new(carrier, StdArc::new(NoCookies), ExchangeStream::new(transport));

        codec.write_request_headers(&get_head("http://example.com/a")).unwrap();
        assert!(wire.written().starts_with(b"GET http://example.com/a HTTP/1.1\r\n"));
    }

    /// S2: chunked response with a trailer.
    #[test]
    fn chunked_response_with_trailers() {
        let transport = MockTransport::with_bytes(
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\nX-Trailer: v\r\n\r\n",
        );
        let mut ex = exchange(transport);

        ex.codec.write_request_headers(&get_head("http://example.com/")).unwrap();
        let head = ex.codec.read_response_headers(false).unwrap().unwrap();
        assert_eq!(ex.codec.reported_payload_size(&head), PayloadSize::Chunked);

        let mut body = Vec::new();
        {
            let mut reader = ex.codec.open_response_body(&head).unwrap();
            reader.read_to_end(&mut body).unwrap();
        }
        assert_eq!(body, b"hello");
        assert!(ex.codec.is_response_complete());

        let trailers = ex.codec.peek_trailers().unwrap().unwrap();
        assert_eq!(trailers.get("x-trailer").unwrap(), "v");

        // trailers carry headers, so they are pushed to the cookie jar
        // against the request url
        let saved = ex.cookies.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, Uri::from_static("http://example.com/"));
        assert_eq!(saved[0].1.get("x-trailer").unwrap(), "v");
    }

    /// S3: Expect: 100-continue.
    #[test]
    fn expect_continue_interim_then_final() {
        let transport = MockTransport::with_bytes(
            b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n",
        );
        let mut ex = exchange(transport);

        let head: RequestHead = Request::builder()
            .method(Method::POST)
            .uri("http://example.com/upload")
            .header("Expect", "100-continue")
            .body(())
            .unwrap()
            .into();
        assert!(head.expects_continue());

        ex.codec.write_request_headers(&head).unwrap();

        // interim 100 with expectation: no response yet
        assert!(ex.codec.read_response_headers(true).unwrap().is_none());

        // resumed: the next header block is the final response
        let final_head = ex.codec.read_response_headers(false).unwrap().unwrap();
        assert_eq!(final_head.status(), StatusCode::OK);
        let _ = ex.codec.open_response_body(&final_head).unwrap();
    }

    /// S4: truncated fixed-length body.
    #[test]
    fn truncated_fixed_body_marks_the_connection() {
        let transport = MockTransport::with_bytes(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n1234");
        let mut ex = exchange(transport);

        ex.codec.write_request_headers(&get_head("http://example.com/")).unwrap();
        let head = ex.codec.read_response_headers(false).unwrap().unwrap();

        {
            let mut reader = ex.codec.open_response_body(&head).unwrap();
            let mut buf = [0u8; 16];
            assert_eq!(reader.read(&mut buf).unwrap(), 4);

            let err = reader.read(&mut buf).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        }

        assert!(ex.codec.is_response_complete());
        assert_eq!(ex.carrier.no_new_exchanges_calls(), 1);
        assert!(ex.carrier.tracked_failures() >= 1);
        assert!(ex.codec.peek_trailers().is_err());
    }

    /// S6: early hints, then a final response with an immediately-complete
    /// body.
    #[test]
    fn early_hints_then_final_response() {
        let transport = MockTransport::with_bytes(
            b"HTTP/1.1 103 Early Hints\r\nLink: </a>\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n",
        );
        let mut ex = exchange(transport);

        ex.codec.write_request_headers(&get_head("http://example.com/")).unwrap();

        let hints = ex.codec.read_response_headers(false).unwrap().unwrap();
        assert_eq!(hints.status().as_u16(), 103);
        assert_eq!(hints.headers().get("link").unwrap(), "</a>");

        let final_head = ex.codec.read_response_headers(false).unwrap().unwrap();
        assert_eq!(final_head.status(), StatusCode::OK);

        let mut body = Vec::new();
        {
            let mut reader = ex.codec.open_response_body(&final_head).unwrap();
            assert!(reader.is_finished());
            reader.read_to_end(&mut body).unwrap();
        }
        assert!(body.is_empty());
        assert!(ex.codec.is_response_complete());
        assert_eq!(ex.codec.peek_trailers().unwrap().unwrap().len(), 0);
    }

    #[test]
    fn close_delimited_body_retires_the_connection_up_front() {
        let transport = MockTransport::with_bytes(b"HTTP/1.1 200 OK\r\n\r\nall the bytes");
        let mut ex = exchange(transport);

        ex.codec.write_request_headers(&get_head("http://example.com/")).unwrap();
        let head = ex.codec.read_response_headers(false).unwrap().unwrap();
        assert_eq!(ex.codec.reported_payload_size(&head), PayloadSize::Unknown);

        let mut body = Vec::new();
        {
            let mut reader = ex.codec.open_response_body(&head).unwrap();
            // retired as soon as the framing was chosen
            assert_eq!(ex.carrier.no_new_exchanges_calls(), 1);
            reader.read_to_end(&mut body).unwrap();
        }
        assert_eq!(body, b"all the bytes");
        assert!(ex.codec.is_response_complete());
        assert_eq!(ex.codec.peek_trailers().unwrap().unwrap().len(), 0);
    }

    #[test]
    fn early_close_drains_small_remainder_and_stays_reusable() {
        let transport = MockTransport::with_bytes(b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\nabcdef");
        let mut ex = exchange(transport);

        ex.codec.write_request_headers(&get_head("http://example.com/")).unwrap();
        let head = ex.codec.read_response_headers(false).unwrap().unwrap();

        {
            let mut reader = ex.codec.open_response_body(&head).unwrap();
            let mut one = [0u8; 1];
            assert_eq!(reader.read(&mut one).unwrap(), 1);
            // dropped with five bytes outstanding
        }

        assert!(ex.codec.is_response_complete());
        assert_eq!(ex.carrier.no_new_exchanges_calls(), 0);
        assert_eq!(ex.codec.peek_trailers().unwrap().unwrap().len(), 0);

        // the discard tightened the read timeout, and completion detached it
        let timeouts = ex.wire.read_timeouts();
        assert!(timeouts.contains(&Some(Duration::from_millis(DISCARD_STREAM_TIMEOUT_MILLIS))));
        assert_eq!(timeouts.last(), Some(&None));
    }

    #[test]
    fn early_close_that_cannot_drain_retires_the_connection() {
        let transport = MockTransport::with_bytes(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nabcd")
            .timing_out_when_exhausted();
        let mut ex = exchange(transport);

        ex.codec.write_request_headers(&get_head("http://example.com/")).unwrap();
        let head = ex.codec.read_response_headers(false).unwrap().unwrap();

        {
            let _reader = ex.codec.open_response_body(&head).unwrap();
            // dropped with 96 bytes outstanding and a stalled peer
        }

        assert!(ex.codec.is_response_complete());
        assert_eq!(ex.carrier.no_new_exchanges_calls(), 1);
        assert!(ex.codec.peek_trailers().is_err());
    }

    #[test]
    fn head_responses_report_no_body() {
        let transport = MockTransport::with_bytes(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n");
        let mut ex = exchange(transport);

        let head: RequestHead = Request::builder()
            .method(Method::HEAD)
            .uri("http://example.com/")
            .body(())
            .unwrap()
            .into();
        ex.codec.write_request_headers(&head).unwrap();

        let response = ex.codec.read_response_headers(false).unwrap().unwrap();
        assert_eq!(ex.codec.reported_payload_size(&response), PayloadSize::Empty);
        assert_eq!(ex.codec.reported_payload_size(&response).reported_content_length(), 0);

        let _ = ex.codec.open_response_body(&response).unwrap();
        assert!(ex.codec.is_response_complete());
    }

    #[test]
    fn skip_connect_body_drains_declared_bytes() {
        let transport = MockTransport::with_bytes(b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nxyz");
        let mut ex = exchange(transport);

        let head = ex.codec.read_response_headers(false).unwrap().unwrap();
        ex.codec.skip_connect_body(&head).unwrap();
        assert!(ex.codec.is_response_complete());
        assert_eq!(ex.carrier.no_new_exchanges_calls(), 0);
    }

    #[test]
    fn end_of_stream_reading_headers_redacts_the_url() {
        let transport = MockTransport::with_bytes(b"HTTP/1.1 2");
        let mut ex = exchange(transport);

        ex.codec
            .write_request_headers(&get_head("http://user:pw@example.com/private?q=s"))
            .unwrap();
        let err = ex.codec.read_response_headers(false).unwrap_err();
        assert!(err.is_io());
        let message = err.as_io().unwrap().to_string();
        assert!(message.contains("unexpected end of stream"), "{message}");
        assert!(message.contains("http://example.com/..."), "{message}");
        assert!(!message.contains("private"), "{message}");
        assert_eq!(ex.carrier.tracked_failures(), 1);
    }

    #[test]
    fn cancel_delegates_to_the_carrier() {
        let transport = MockTransport::with_bytes(b"");
        let ex = exchange(transport);
        ex.codec.cancel();
        assert_eq!(ex.carrier.cancel_calls(), 1);
    }

    #[test]
    #[should_panic(expected = "state:")]
    fn open_response_body_before_headers_is_a_caller_bug() {
        let transport = MockTransport::with_bytes(b"");
        let mut ex = exchange(transport);
        let head = http::Response::builder().status(200).body(()).unwrap();
        let _ = ex.codec.open_response_body(&head);
    }

    #[test]
    #[should_panic(expected = "state:")]
    fn peek_trailers_before_body_is_a_caller_bug() {
        let transport = MockTransport::with_bytes(b"");
        let mut ex = exchange(transport);
        let _ = ex.codec.peek_trailers();
    }

    #[test]
    #[should_panic(expected = "state:")]
    fn writing_headers_twice_is_a_caller_bug() {
        let transport = MockTransport::with_bytes(b"");
        let mut ex = exchange(transport);
        let head = get_head("http://example.com/");
        ex.codec.write_request_headers(&head).unwrap();
        let _ = ex.codec.write_request_headers(&head);
    }
}
