//! Cancellation for blocked waits
//!
//! A self-pipe: the read end is polled next to the caller's handles and a
//! single byte written to the other end wakes every wait using the token.

use crate::error::Result;
use crate::handle::{pipe, set_nonblocking};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

struct Inner {
    cancelled: AtomicBool,
    reader: OwnedFd,
    writer: File,
}

/// Cancels waits from another thread
///
/// Clones share state. Cancellation is sticky: once [`cancel`](Self::cancel)
/// has been called, every current and future wait registered with this token
/// returns [`SmartIoError::Cancelled`](crate::error::SmartIoError::Cancelled).
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// Create a token that has not been cancelled
    pub fn new() -> Result<Self> {
        let (reader, writer) = pipe()?;
        set_nonblocking(writer.as_fd())?;

        Ok(Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                reader,
                writer: File::from(writer),
            }),
        })
    }

    /// Wake all waits using this token
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        match (&self.inner.writer).write(&[1]) {
            Ok(_) => debug!("Cancellation signalled"),
            // A full pipe already wakes every poller.
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => warn!("Failed to signal cancellation: {}", e),
        }
    }

    /// Check if cancelled
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn wake_fd(&self) -> BorrowedFd<'_> {
        self.inner.reader.as_fd()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::select;
    use std::time::Duration;

    #[test]
    fn test_cancel_is_sticky_and_shared() {
        let token = CancelToken::new().unwrap();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        token.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(format!("{:?}", clone), "CancelToken { cancelled: true }");
    }

    #[test]
    fn test_cancel_makes_wake_end_readable() {
        let token = CancelToken::new().unwrap();
        let wake = token.wake_fd();
        assert!(select(&[&wake], &[], &[], Some(Duration::ZERO)).unwrap().is_none());

        token.cancel();
        let ready = select(&[&wake], &[], &[], Some(Duration::ZERO))
            .unwrap()
            .expect("wake end readable");
        assert_eq!(ready.readable.len(), 1);
    }
}
