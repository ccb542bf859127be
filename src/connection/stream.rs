//! Blocking framed I/O over a connection transport.
//!
//! [`ExchangeStream`] drives the `tokio_util::codec` state machines in this
//! crate over a plain blocking byte stream: bytes are accumulated into a
//! `BytesMut` and offered to a decoder until it produces a frame, and frames
//! are encoded into a scratch buffer and written through in one call. It is
//! the synchronous counterpart of driving the same codecs with `FramedRead`
//! and `FramedWrite`.
//!
//! The stream also owns the timeout discipline of an exchange: callers can
//! tighten the read timeout for a bounded operation and must detach it again
//! before the connection returns to a pool, so one exchange's deadline never
//! leaks into the next.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// A blocking byte-stream transport with per-operation timeouts.
///
/// Implemented by `TcpStream`; tests substitute a scripted transport.
pub trait Transport: Read + Write + Send {
    /// Sets the timeout applied to each read operation. `None` blocks
    /// indefinitely.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Sets the timeout applied to each write operation. `None` blocks
    /// indefinitely.
    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }
}

/// A framed, buffered wrapper around a [`Transport`].
///
/// Reads go through `read_frame`, which loops fill-then-decode until the
/// decoder yields an item; at end of stream the decoder's `decode_eof` gets
/// the final word, so each codec decides whether EOF is a clean end or a
/// truncation. Writes go through `write_frame`, which encodes into a scratch
/// buffer and writes it out; `flush` pushes everything to the wire.
pub struct ExchangeStream<T> {
    transport: T,
    read_buf: BytesMut,
    write_buf: BytesMut,
    reached_eof: bool,
    default_read_timeout: Option<Duration>,
    default_write_timeout: Option<Duration>,
}

impl<T: Transport> ExchangeStream<T> {
    /// Creates a stream with no default timeouts.
    pub fn new(transport: T) -> Self {
        Self::with_timeouts(transport, None, None)
    }

    /// Creates a stream whose default per-operation timeouts are restored
    /// whenever [`ExchangeStream::detach_timeouts`] is called.
    pub fn with_timeouts(
        transport: T,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            read_buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            write_buf: BytesMut::new(),
            reached_eof: false,
            default_read_timeout: read_timeout,
            default_write_timeout: write_timeout,
        }
    }

    /// Reads frames with `decoder` until it produces an item.
    ///
    /// Returns `Ok(None)` only if the decoder's `decode_eof` accepts the end
    /// of stream without producing an item.
    pub fn read_frame<D>(&mut self, decoder: &mut D) -> Result<Option<D::Item>, D::Error>
    where
        D: Decoder,
    {
        loop {
            if let Some(item) = decoder.decode(&mut self.read_buf)? {
                return Ok(Some(item));
            }

            if self.reached_eof {
                return decoder.decode_eof(&mut self.read_buf);
            }

            if self.fill()? == 0 {
                self.reached_eof = true;
            }
        }
    }

    /// Encodes `item` with `encoder` and writes the resulting bytes through.
    ///
    /// The bytes land in the transport's own buffers; call
    /// [`ExchangeStream::flush`] to force them onto the wire.
    pub fn write_frame<I, E>(&mut self, encoder: &mut E, item: I) -> Result<(), E::Error>
    where
        E: Encoder<I>,
    {
        encoder.encode(item, &mut self.write_buf)?;
        let frame = self.write_buf.split();
        if !frame.is_empty() {
            self.transport.write_all(&frame)?;
        }
        Ok(())
    }

    /// Flushes the transport.
    pub fn flush(&mut self) -> io::Result<()> {
        self.transport.flush()
    }

    /// Tightens the read timeout for a bounded operation, e.g. draining a
    /// response remainder before early close.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.transport.set_read_timeout(timeout)
    }

    /// Restores the stream's default timeouts. Called when a body stream
    /// completes so a pooled connection carries no stale deadline into its
    /// next exchange.
    pub fn detach_timeouts(&mut self) {
        if let Err(e) = self.transport.set_read_timeout(self.default_read_timeout) {
            trace!(error = %e, "failed to restore read timeout");
        }
        if let Err(e) = self.transport.set_write_timeout(self.default_write_timeout) {
            trace!(error = %e, "failed to restore write timeout");
        }
    }

    /// Returns true if the transport reported end of stream.
    pub fn is_eof(&self) -> bool {
        self.reached_eof
    }

    /// Gives tests access to the underlying transport.
    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    fn fill(&mut self) -> io::Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let n = self.transport.read(&mut chunk)?;
        if n > 0 {
            self.read_buf.extend_from_slice(&chunk[..n]);
        }
        trace!(bytes = n, "filled read buffer");
        Ok(n)
    }
}
