//! `select`-style readiness multiplexer
//!
//! Every item of the three interest sets is converted to a descriptor once,
//! checked, and registered in a per-call poll array. The calling thread then
//! sleeps in `poll(2)` until something is ready, the deadline passes or the
//! cancellation token fires. The poll array lives on the caller's stack, so
//! returning by any path releases every registration.

use crate::error::{Result, SmartIoError};
use crate::handle::{ensure_open, ToHandle};
use crate::select::timeout::poll_slice;
use crate::select::CancelToken;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Handles found ready, grouped by interest set
///
/// Each list keeps the order of the corresponding input set and only holds
/// members that were ready. At least one list is non-empty.
#[derive(Debug)]
pub struct Selected<'a, T: ?Sized> {
    /// Ready for reading (including end-of-stream and error conditions)
    pub readable: Vec<&'a T>,
    /// Ready for writing
    pub writable: Vec<&'a T>,
    /// Exceptional condition pending (out-of-band data)
    pub exceptional: Vec<&'a T>,
}

impl<T: ?Sized> Selected<'_, T> {
    /// Total number of ready entries across all sets
    pub fn len(&self) -> usize {
        self.readable.len() + self.writable.len() + self.exceptional.len()
    }

    /// Whether no entry is ready
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One descriptor registered with poll, possibly on behalf of several sets
struct Registration<'a> {
    fd: BorrowedFd<'a>,
    interest: PollFlags,
    revents: PollFlags,
    muted: bool,
}

impl Registration<'_> {
    fn readable(&self) -> bool {
        self.interest.contains(PollFlags::POLLIN)
            && self
                .revents
                .intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
    }

    fn writable(&self) -> bool {
        self.interest.contains(PollFlags::POLLOUT)
            && self
                .revents
                .intersects(PollFlags::POLLOUT | PollFlags::POLLERR)
    }

    fn exceptional(&self) -> bool {
        self.interest.contains(PollFlags::POLLPRI) && self.revents.contains(PollFlags::POLLPRI)
    }
}

#[derive(Default)]
struct Registry<'a> {
    entries: Vec<Registration<'a>>,
}

impl<'a> Registry<'a> {
    fn register(&mut self, fd: BorrowedFd<'a>, interest: PollFlags) -> usize {
        let raw = fd.as_raw_fd();
        if let Some(slot) = self.entries.iter().position(|e| e.fd.as_raw_fd() == raw) {
            self.entries[slot].interest |= interest;
            return slot;
        }

        self.entries.push(Registration {
            fd,
            interest,
            revents: PollFlags::empty(),
            muted: false,
        });
        self.entries.len() - 1
    }

    /// Build the poll array for the entries still worth watching
    fn poll_fds(&self) -> (Vec<PollFd<'a>>, Vec<usize>) {
        let mut fds = Vec::with_capacity(self.entries.len() + 1);
        let mut slots = Vec::with_capacity(self.entries.len());

        for (slot, entry) in self.entries.iter().enumerate() {
            if !entry.muted {
                fds.push(PollFd::new(entry.fd, entry.interest));
                slots.push(slot);
            }
        }

        (fds, slots)
    }

    /// Copy poll results back into the registry
    fn record(&mut self, fds: &[PollFd<'_>], slots: &[usize]) -> Result<()> {
        for entry in &mut self.entries {
            entry.revents = PollFlags::empty();
        }

        for (pollfd, &slot) in fds.iter().zip(slots) {
            let revents = pollfd.revents().unwrap_or(PollFlags::empty());
            if revents.is_empty() {
                continue;
            }

            let entry = &mut self.entries[slot];
            if revents.contains(PollFlags::POLLNVAL) {
                return Err(SmartIoError::io_state(format!(
                    "descriptor {} was closed while waiting",
                    entry.fd.as_raw_fd()
                )));
            }

            entry.revents = revents;
            if !(entry.readable() || entry.writable() || entry.exceptional()) {
                // Hangup or error reported for a set that does not count it;
                // poll would report it again immediately, so stop watching.
                trace!(fd = entry.fd.as_raw_fd(), ?revents, "Muting descriptor");
                entry.muted = true;
            }
        }

        Ok(())
    }
}

/// Position of an input item and the registry slot it maps to
struct Watch {
    item: usize,
    slot: usize,
}

fn register_set<'a, T: ToHandle + ?Sized>(
    registry: &mut Registry<'a>,
    items: &[&'a T],
    interest: PollFlags,
    kind: &str,
) -> Result<Vec<Watch>> {
    let mut watches: Vec<Watch> = Vec::with_capacity(items.len());

    for (index, &item) in items.iter().enumerate() {
        let fd = T::to_handle(item).ok_or_else(|| {
            SmartIoError::type_mismatch(format!(
                "{} interest entry {} does not convert to a handle",
                kind, index
            ))
        })?;
        ensure_open(fd)?;

        let slot = registry.register(fd, interest);
        if watches.iter().any(|w| w.slot == slot) {
            continue;
        }
        watches.push(Watch { item: index, slot });
    }

    Ok(watches)
}

fn gather<'a, 'r, T: ?Sized>(
    items: &[&'a T],
    watches: &[Watch],
    registry: &Registry<'r>,
    ready: impl Fn(&Registration<'r>) -> bool,
) -> Vec<&'a T> {
    watches
        .iter()
        .filter(|w| ready(&registry.entries[w.slot]))
        .map(|w| items[w.item])
        .collect()
}

/// A readiness wait: three interest sets, a timeout and an optional cancel token
///
/// ```no_run
/// use smartio::handle::pipe;
/// use smartio::select::SelectRequest;
/// use std::time::Duration;
///
/// let (rd, wr) = pipe().unwrap();
/// let ready = SelectRequest::new()
///     .read(&rd)
///     .write(&wr)
///     .timeout(Duration::from_millis(100))
///     .wait()
///     .unwrap();
/// ```
pub struct SelectRequest<'a, T: ?Sized> {
    read: Vec<&'a T>,
    write: Vec<&'a T>,
    except: Vec<&'a T>,
    timeout: Option<Duration>,
    cancel: Option<&'a CancelToken>,
}

impl<T: ?Sized> Default for SelectRequest<'_, T> {
    fn default() -> Self {
        Self {
            read: Vec::new(),
            write: Vec::new(),
            except: Vec::new(),
            timeout: None,
            cancel: None,
        }
    }
}

impl<'a, T: ToHandle + ?Sized> SelectRequest<'a, T> {
    /// Empty request that would wait forever
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch a handle for read readiness
    pub fn read(mut self, handle: &'a T) -> Self {
        self.read.push(handle);
        self
    }

    /// Watch several handles for read readiness
    pub fn read_all(mut self, handles: &[&'a T]) -> Self {
        self.read.extend_from_slice(handles);
        self
    }

    /// Watch a handle for write readiness
    pub fn write(mut self, handle: &'a T) -> Self {
        self.write.push(handle);
        self
    }

    /// Watch several handles for write readiness
    pub fn write_all(mut self, handles: &[&'a T]) -> Self {
        self.write.extend_from_slice(handles);
        self
    }

    /// Watch a handle for exceptional conditions
    pub fn except(mut self, handle: &'a T) -> Self {
        self.except.push(handle);
        self
    }

    /// Watch several handles for exceptional conditions
    pub fn except_all(mut self, handles: &[&'a T]) -> Self {
        self.except.extend_from_slice(handles);
        self
    }

    /// Give up after `timeout`; zero polls once without blocking
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set or clear the timeout; `None` waits without bound
    pub fn timeout_opt(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Let `token` interrupt the wait
    pub fn cancel_on(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Block until something is ready
    ///
    /// Returns `Ok(None)` if the timeout expired with nothing ready. All
    /// argument errors are reported before the thread starts waiting.
    pub fn wait(&self) -> Result<Option<Selected<'a, T>>> {
        let mut registry = Registry::default();
        let reads = register_set(&mut registry, &self.read, PollFlags::POLLIN, "read")?;
        let writes = register_set(&mut registry, &self.write, PollFlags::POLLOUT, "write")?;
        let excepts = register_set(&mut registry, &self.except, PollFlags::POLLPRI, "exceptional")?;

        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(SmartIoError::Cancelled);
        }

        // A deadline too far out to represent is the same as no deadline.
        let deadline = self.timeout.and_then(|t| Instant::now().checked_add(t));

        debug!(
            handles = registry.entries.len(),
            timeout = ?self.timeout,
            "Waiting for readiness"
        );

        loop {
            let (mut fds, slots) = registry.poll_fds();
            if let Some(token) = self.cancel {
                fds.push(PollFd::new(token.wake_fd(), PollFlags::POLLIN));
            }

            let wait = match deadline {
                Some(deadline) => poll_slice(deadline.saturating_duration_since(Instant::now())),
                None => PollTimeout::NONE,
            };

            match poll(&mut fds, wait) {
                Ok(0) => {}
                Ok(_) => {
                    let woken = self.cancel.is_some()
                        && fds
                            .last()
                            .and_then(|wake| wake.revents())
                            .is_some_and(|revents| !revents.is_empty());
                    if woken {
                        debug!("Wait cancelled");
                        return Err(SmartIoError::Cancelled);
                    }

                    registry.record(&fds, &slots)?;

                    let selected = Selected {
                        readable: gather(&self.read, &reads, &registry, Registration::readable),
                        writable: gather(&self.write, &writes, &registry, Registration::writable),
                        exceptional: gather(
                            &self.except,
                            &excepts,
                            &registry,
                            Registration::exceptional,
                        ),
                    };
                    if !selected.is_empty() {
                        debug!(
                            readable = selected.readable.len(),
                            writable = selected.writable.len(),
                            exceptional = selected.exceptional.len(),
                            "Handles ready"
                        );
                        return Ok(Some(selected));
                    }
                }
                Err(Errno::EINTR) => trace!("poll interrupted, retrying"),
                Err(errno) => return Err(errno.into()),
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                debug!("Wait timed out with nothing ready");
                return Ok(None);
            }
        }
    }
}

/// Wait for readiness across three interest sets
///
/// Empty slices stand for absent sets. `timeout` of `None` waits without
/// bound, `Some(Duration::ZERO)` polls once. Returns `Ok(None)` when the
/// timeout expires with nothing ready.
pub fn select<'a, T: ToHandle + ?Sized>(
    read: &[&'a T],
    write: &[&'a T],
    except: &[&'a T],
    timeout: Option<Duration>,
) -> Result<Option<Selected<'a, T>>> {
    SelectRequest::new()
        .read_all(read)
        .write_all(write)
        .except_all(except)
        .timeout_opt(timeout)
        .wait()
}
