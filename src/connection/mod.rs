//! The connection layer surface the exchange codec builds on: a blocking
//! framed byte stream with per-operation timeouts, the carrier contract of
//! the owning connection, and the cookie jar hook.

mod carrier;
mod cookie;
#[cfg(test)]
pub(crate) mod mock;
mod stream;

pub use carrier::{Carrier, Proxy, Route};
pub use cookie::{CookieJar, NoCookies};
pub use stream::{ExchangeStream, Transport};
