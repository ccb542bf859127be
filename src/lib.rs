//! A client-side HTTP/1.1 exchange core.
//!
//! Two tightly coupled pieces make up this crate:
//!
//! - [`task`]: a shared in-process scheduler that multiplexes logical task
//!   queues over on-demand worker threads, with delayed and recurrent
//!   execution coordinated through a single lock.
//! - [`codec`]: a strict state-machine codec that writes one HTTP/1.1
//!   request and reads one HTTP/1.1 response over a reusable byte-stream
//!   socket, including chunked transfer encoding, trailers, interim (1xx)
//!   responses and connection-reuse discipline.
//!
//! The [`connection`] module defines the surface between the codec and the
//! connection layer (a blocking framed stream, the carrier contract and the
//! cookie jar hook), and [`protocol`] holds the shared message vocabulary.

pub mod codec;
pub mod connection;
pub mod protocol;
pub mod task;

pub(crate) use help::ensure;

mod help {

    macro_rules! ensure {
        ($predicate:expr, $error:expr) => {
            if !$predicate {
                return Err($error);
            }
        };
    }
    pub(crate) use ensure;
}
