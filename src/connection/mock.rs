//! Scripted test doubles for the connection layer.
//!
//! `MockTransport` plays back a scripted sequence of read segments and
//! captures everything written; `MockCarrier` and `MockCookieJar` record the
//! calls the codec makes. Codec tests across the crate share these.

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Uri};

use super::carrier::{Carrier, Route};
use super::cookie::CookieJar;
use super::stream::Transport;

/// What the transport does once every scripted segment has been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Exhausted {
    /// Report end of stream.
    Eof,
    /// Report a read timeout, as a socket with unread peer data would.
    TimeOut,
}

#[derive(Default)]
struct Shared {
    written: Vec<u8>,
    read_timeouts: Vec<Option<Duration>>,
    write_timeouts: Vec<Option<Duration>>,
}

/// A blocking transport that reads from a script and records writes.
pub(crate) struct MockTransport {
    segments: Vec<Bytes>,
    next_segment: usize,
    exhausted: Exhausted,
    shared: Arc<Mutex<Shared>>,
}

impl MockTransport {
    /// A transport that yields `segments` one read at a time, then EOF.
    pub(crate) fn with_segments(segments: Vec<Bytes>) -> Self {
        Self {
            segments,
            next_segment: 0,
            exhausted: Exhausted::Eof,
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    /// A transport that yields the whole of `bytes` in one read, then EOF.
    pub(crate) fn with_bytes(bytes: &[u8]) -> Self {
        Self::with_segments(vec![Bytes::copy_from_slice(bytes)])
    }

    /// Makes reads past the script fail with `TimedOut` instead of EOF.
    pub(crate) fn timing_out_when_exhausted(mut self) -> Self {
        self.exhausted = Exhausted::TimeOut;
        self
    }

    /// Everything written so far.
    pub(crate) fn written(&self) -> Vec<u8> {
        self.shared.lock().unwrap().written.clone()
    }

    /// A handle observing this transport after it moves into a stream.
    pub(crate) fn observer(&self) -> MockTransportObserver {
        MockTransportObserver { shared: Arc::clone(&self.shared) }
    }
}

/// Observes a [`MockTransport`] that has been moved into an `ExchangeStream`.
pub(crate) struct MockTransportObserver {
    shared: Arc<Mutex<Shared>>,
}

impl MockTransportObserver {
    pub(crate) fn written(&self) -> Vec<u8> {
        self.shared.lock().unwrap().written.clone()
    }

    pub(crate) fn read_timeouts(&self) -> Vec<Option<Duration>> {
        self.shared.lock().unwrap().read_timeouts.clone()
    }
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.next_segment < self.segments.len() {
            let segment = &mut self.segments[self.next_segment];
            if segment.is_empty() {
                self.next_segment += 1;
                continue;
            }
            let n = segment.len().min(buf.len());
            buf[..n].copy_from_slice(&segment[..n]);
            let _ = segment.split_to(n);
            return Ok(n);
        }

        match self.exhausted {
            Exhausted::Eof => Ok(0),
            Exhausted::TimeOut => Err(io::Error::new(io::ErrorKind::TimedOut, "scripted read timeout")),
        }
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.shared.lock().unwrap().written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockTransport {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.shared.lock().unwrap().read_timeouts.push(timeout);
        Ok(())
    }

    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.shared.lock().unwrap().write_timeouts.push(timeout);
        Ok(())
    }
}

#[derive(Default)]
struct CarrierCalls {
    failures: usize,
    no_new_exchanges: usize,
    cancels: usize,
}

/// A carrier that records the calls the codec makes.
pub(crate) struct MockCarrier {
    route: Route,
    calls: Mutex<CarrierCalls>,
}

impl MockCarrier {
    pub(crate) fn new(route: Route) -> Arc<Self> {
        Arc::new(Self { route, calls: Mutex::new(CarrierCalls::default()) })
    }

    pub(crate) fn direct() -> Arc<Self> {
        Self::new(Route::direct(Uri::from_static("http://example.com/")))
    }

    pub(crate) fn no_new_exchanges_calls(&self) -> usize {
        self.calls.lock().unwrap().no_new_exchanges
    }

    pub(crate) fn tracked_failures(&self) -> usize {
        self.calls.lock().unwrap().failures
    }

    pub(crate) fn cancel_calls(&self) -> usize {
        self.calls.lock().unwrap().cancels
    }
}

impl Carrier for MockCarrier {
    fn route(&self) -> &Route {
        &self.route
    }

    fn track_failure(&self, _error: Option<&io::Error>) {
        self.calls.lock().unwrap().failures += 1;
    }

    fn no_new_exchanges(&self) {
        self.calls.lock().unwrap().no_new_exchanges += 1;
    }

    fn cancel(&self) {
        self.calls.lock().unwrap().cancels += 1;
    }
}

/// A cookie jar that records every header block pushed to it.
#[derive(Default)]
pub(crate) struct MockCookieJar {
    saved: Mutex<Vec<(Uri, HeaderMap)>>,
}

impl MockCookieJar {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn saved(&self) -> Vec<(Uri, HeaderMap)> {
        self.saved.lock().unwrap().clone()
    }
}

impl CookieJar for MockCookieJar {
    fn save_from_response(&self, url: &Uri, headers: &HeaderMap) {
        self.saved.lock().unwrap().push((url.clone(), headers.clone()));
    }
}
