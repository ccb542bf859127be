//! The connection-layer contract consumed by the exchange codec.
//!
//! A [`Carrier`] is whatever object owns the socket: it knows the route that
//! was dialed, participates in pool-retirement decisions, and can abort the
//! socket. The codec never manages the connection's lifetime itself; it only
//! reports what the wire told it.

use std::io;

use http::Uri;

/// How the connection reaches the origin server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proxy {
    /// A direct connection to the origin.
    Direct,
    /// A plaintext HTTP proxy forwarding on our behalf.
    Http,
}

/// The dialed route of a connection: the origin address and the proxy type.
#[derive(Debug, Clone)]
pub struct Route {
    address: Uri,
    proxy: Proxy,
}

impl Route {
    /// Creates a direct route to `address`.
    pub fn direct(address: Uri) -> Self {
        Self { address, proxy: Proxy::Direct }
    }

    /// Creates a route through a plaintext HTTP proxy.
    pub fn http_proxy(address: Uri) -> Self {
        Self { address, proxy: Proxy::Http }
    }

    /// The origin address this route reaches.
    pub fn address(&self) -> &Uri {
        &self.address
    }

    /// The proxy type of this route.
    pub fn proxy(&self) -> Proxy {
        self.proxy
    }

    /// Returns true if requests on this route must use the absolute-form
    /// request target. That is the case for plaintext requests forwarded by
    /// an HTTP proxy; everything tunneled or direct uses origin form.
    pub fn uses_absolute_form(&self) -> bool {
        self.proxy == Proxy::Http && self.address.scheme_str() != Some("https")
    }
}

/// The connection-layer adapter the codec reports to.
///
/// Implementations wrap a pooled connection. All methods may be called from
/// the thread driving the exchange; `cancel` may be called from any thread.
pub trait Carrier: Send + Sync {
    /// The route this connection was dialed over.
    fn route(&self) -> &Route;

    /// Records a failure observed while using this connection, so the pool
    /// can avoid the route or the connection on future calls.
    fn track_failure(&self, error: Option<&io::Error>);

    /// Retires the connection: it finishes the current exchange but must not
    /// host another one.
    fn no_new_exchanges(&self);

    /// Aborts the underlying socket.
    fn cancel(&self);
}
