//! Readiness multiplexing module
//!
//! A blocking, `select`-style wait over read, write and exceptional interest
//! sets, built on `poll(2)`. Waits can be bounded by a timeout and interrupted
//! from another thread through a [`CancelToken`].

mod cancel;
mod multiplexer;
mod timeout;

pub use cancel::CancelToken;
pub use multiplexer::{select, SelectRequest, Selected};
pub use timeout::{parse_timeout, timeout_from_secs};
