//! Cookie jar integration point.
//!
//! The codec itself has no cookie policy; it only forwards header blocks to
//! the configured jar. Response headers are handed to the jar by the caller
//! that owns the exchange; the codec forwards trailer blocks the same way
//! when a chunked body ends with trailers.

use http::{HeaderMap, Uri};

/// Receives cookie-bearing header blocks observed on responses.
pub trait CookieJar: Send + Sync {
    /// Saves the cookies of a response header or trailer block received for
    /// `url`. `headers` may contain no `Set-Cookie` entries at all; the jar
    /// decides what to keep.
    fn save_from_response(&self, url: &Uri, headers: &HeaderMap);
}

/// A cookie jar that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCookies;

impl CookieJar for NoCookies {
    fn save_from_response(&self, _url: &Uri, _headers: &HeaderMap) {}
}
