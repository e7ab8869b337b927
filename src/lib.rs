//! # smartio - Stream Copy and Readiness Multiplexing
//!
//! smartio provides two blocking I/O primitives for Unix handles:
//!
//! - **Stream copy**: move bytes between files named by path and open handles,
//!   optionally bounded by a length and starting at a source offset that does
//!   not disturb the source's own position. Uses `copy_file_range` on Linux
//!   when the kernel allows it.
//! - **Readiness multiplexing**: a `select`-style wait over read, write and
//!   exceptional interest sets, with a timeout and cross-thread cancellation.
//!
//! ## Quick Start
//!
//! ```no_run
//! use smartio::copy_stream;
//! use std::fs::File;
//!
//! // Path to path
//! let copied = copy_stream("in.bin", "out.bin", None, None).unwrap();
//!
//! // 8 bytes from offset 4 of an open file, appended at the handle's position
//! let source = File::open("in.bin").unwrap();
//! let destination = File::create("slice.bin").unwrap();
//! copy_stream(&source, &destination, Some(8), Some(4)).unwrap();
//!
//! println!("Copied {} bytes", copied);
//! ```
//!
//! ## Waiting for Readiness
//!
//! ```no_run
//! use smartio::handle::pipe;
//! use smartio::select;
//! use std::time::Duration;
//!
//! let (rd, wr) = pipe().unwrap();
//! match select(&[&rd], &[&wr], &[], Some(Duration::from_secs(1))).unwrap() {
//!     Some(ready) => println!("{} writable", ready.writable.len()),
//!     None => println!("timed out"),
//! }
//! ```
//!
//! ## Cancellation
//!
//! ```no_run
//! use smartio::{CancelToken, SelectRequest};
//! use smartio::handle::pipe;
//!
//! let (rd, _wr) = pipe().unwrap();
//! let token = CancelToken::new().unwrap();
//!
//! std::thread::scope(|s| {
//!     s.spawn(|| {
//!         let result = SelectRequest::new().read(&rd).cancel_on(&token).wait();
//!         assert!(result.is_err());
//!     });
//!     token.cancel();
//! });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

#[cfg(not(unix))]
compile_error!("smartio only supports Unix platforms");

pub mod config;
pub mod copy;
pub mod error;
pub mod handle;
pub mod select;

// Re-export commonly used types
pub use copy::{copy_stream, CopyOptions, CopyRequest, CopyStats, Endpoint, StreamCopier};
pub use error::{Result, SmartIoError};
pub use handle::{ToHandle, ToPath};
pub use select::{select, CancelToken, SelectRequest, Selected};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use smartio::prelude::*;
    //! ```

    pub use crate::config::Settings;
    pub use crate::copy::{copy_stream, CopyMethod, CopyOptions, CopyRequest, Endpoint, StreamCopier};
    pub use crate::error::{Result, SmartIoError};
    pub use crate::handle::{pipe, ToHandle, ToPath};
    pub use crate::select::{select, CancelToken, SelectRequest, Selected};
}
