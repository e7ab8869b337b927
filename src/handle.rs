//! Stream handle capabilities and descriptor helpers
//!
//! A *handle* is anything that can lend out an OS descriptor. Types that
//! already implement [`AsFd`] get [`ToHandle`] for free; wrapper objects that
//! only know how to produce a handle on demand implement it themselves. The
//! same goes for [`ToPath`] and objects that stand in for a file name.

use crate::error::{Result, SmartIoError};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use std::fs::File;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::path::{Path, PathBuf};

/// Capability: convert an object into a file name
///
/// Returning `None` means the object could not produce a textual path; callers
/// report that as a type mismatch.
pub trait ToPath {
    /// Produce the file name this object stands for
    fn to_path(&self) -> Option<PathBuf>;
}

impl ToPath for Path {
    fn to_path(&self) -> Option<PathBuf> {
        Some(self.to_path_buf())
    }
}

impl ToPath for PathBuf {
    fn to_path(&self) -> Option<PathBuf> {
        Some(self.clone())
    }
}

impl ToPath for str {
    fn to_path(&self) -> Option<PathBuf> {
        Some(PathBuf::from(self))
    }
}

impl ToPath for String {
    fn to_path(&self) -> Option<PathBuf> {
        Some(PathBuf::from(self))
    }
}

/// Capability: convert an object into a borrowed OS handle
///
/// Returning `None` means the object has no handle to offer; callers report
/// that as a type mismatch.
pub trait ToHandle {
    /// Borrow the descriptor this object wraps
    fn to_handle(&self) -> Option<BorrowedFd<'_>>;
}

impl<T: AsFd + ?Sized> ToHandle for T {
    fn to_handle(&self) -> Option<BorrowedFd<'_>> {
        Some(self.as_fd())
    }
}

/// Access mode a descriptor was opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Opened for reading only
    ReadOnly,
    /// Opened for writing only
    WriteOnly,
    /// Opened for reading and writing
    ReadWrite,
}

impl AccessMode {
    /// Whether reads are permitted
    pub fn readable(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    /// Whether writes are permitted
    pub fn writable(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

/// Query the access mode of an open descriptor
///
/// A closed descriptor is reported as [`SmartIoError::IoState`].
pub fn access_mode(fd: BorrowedFd<'_>) -> Result<AccessMode> {
    let flags = fcntl(fd.as_raw_fd(), FcntlArg::F_GETFL).map_err(|e| descriptor_error(fd, e))?;
    let mode = OFlag::from_bits_truncate(flags) & OFlag::O_ACCMODE;

    if mode == OFlag::O_RDONLY {
        Ok(AccessMode::ReadOnly)
    } else if mode == OFlag::O_WRONLY {
        Ok(AccessMode::WriteOnly)
    } else if mode == OFlag::O_RDWR {
        Ok(AccessMode::ReadWrite)
    } else {
        Err(SmartIoError::io_state(format!(
            "descriptor {} has unknown access mode {:#o}",
            fd.as_raw_fd(),
            mode.bits()
        )))
    }
}

/// Fail with [`SmartIoError::IoState`] unless the descriptor is still open
pub fn ensure_open(fd: BorrowedFd<'_>) -> Result<()> {
    fcntl(fd.as_raw_fd(), FcntlArg::F_GETFD).map_err(|e| descriptor_error(fd, e))?;
    Ok(())
}

fn descriptor_error(fd: BorrowedFd<'_>, errno: Errno) -> SmartIoError {
    if errno == Errno::EBADF {
        SmartIoError::io_state(format!("descriptor {} is closed", fd.as_raw_fd()))
    } else {
        SmartIoError::from(errno)
    }
}

/// Switch a descriptor to non-blocking mode
pub fn set_nonblocking(fd: BorrowedFd<'_>) -> Result<()> {
    let raw = fd.as_raw_fd();
    let flags = fcntl(raw, FcntlArg::F_GETFL).map_err(|e| descriptor_error(fd, e))?;
    fcntl(
        raw,
        FcntlArg::F_SETFL(OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK),
    )?;
    Ok(())
}

/// Create an anonymous pipe, returning `(read_end, write_end)`
pub fn pipe() -> Result<(OwnedFd, OwnedFd)> {
    Ok(nix::unistd::pipe()?)
}

/// A `File` view over a descriptor the caller still owns
///
/// The descriptor is never closed through this view, so it can be used to
/// read or write a caller's handle with the usual `std::io` traits.
pub(crate) struct BorrowedFile<'fd> {
    file: ManuallyDrop<File>,
    _fd: PhantomData<BorrowedFd<'fd>>,
}

impl<'fd> BorrowedFile<'fd> {
    pub(crate) fn new(fd: BorrowedFd<'fd>) -> Self {
        // SAFETY: the File is wrapped in ManuallyDrop and never closes the
        // descriptor; the PhantomData keeps the borrow alive for 'fd.
        let file = unsafe { File::from_raw_fd(fd.as_raw_fd()) };
        Self {
            file: ManuallyDrop::new(file),
            _fd: PhantomData,
        }
    }
}

impl Deref for BorrowedFile<'_> {
    type Target = File;

    fn deref(&self) -> &File {
        &self.file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::{Read, Write};
    use tempfile::TempDir;

    #[test]
    fn test_access_modes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("modes.txt");
        std::fs::write(&path, b"data").unwrap();

        let read_only = File::open(&path).unwrap();
        assert_eq!(access_mode(read_only.as_fd()).unwrap(), AccessMode::ReadOnly);

        let append = OpenOptions::new().append(true).open(&path).unwrap();
        let mode = access_mode(append.as_fd()).unwrap();
        assert_eq!(mode, AccessMode::WriteOnly);
        assert!(!mode.readable());

        let both = OpenOptions::new().read(true).write(true).open(&path).unwrap();
        let mode = access_mode(both.as_fd()).unwrap();
        assert!(mode.readable() && mode.writable());
    }

    #[test]
    fn test_pipe_ends() {
        let (rd, wr) = pipe().unwrap();
        assert!(access_mode(rd.as_fd()).unwrap().readable());
        assert!(access_mode(wr.as_fd()).unwrap().writable());
        ensure_open(rd.as_fd()).unwrap();
    }

    #[test]
    fn test_closed_descriptor_is_io_state() {
        // Far above any descriptor the test process will have open.
        let stale = unsafe { BorrowedFd::borrow_raw(1 << 20) };
        assert!(matches!(ensure_open(stale), Err(SmartIoError::IoState(_))));
        assert!(matches!(access_mode(stale), Err(SmartIoError::IoState(_))));
    }

    #[test]
    fn test_borrowed_file_does_not_close() {
        let (rd, wr) = pipe().unwrap();
        {
            let view = BorrowedFile::new(wr.as_fd());
            (&*view).write_all(b"hi").unwrap();
        }
        let mut writer = File::from(wr);
        writer.write_all(b"!").unwrap();
        drop(writer);

        let mut out = String::new();
        File::from(rd).read_to_string(&mut out).unwrap();
        assert_eq!(out, "hi!");
    }

    #[test]
    fn test_path_capabilities() {
        assert_eq!("a/b".to_path(), Some(PathBuf::from("a/b")));
        assert_eq!(Path::new("/x").to_path(), Some(PathBuf::from("/x")));

        let file = tempfile::tempfile().unwrap();
        assert_eq!(
            file.to_handle().map(|fd| fd.as_raw_fd()),
            Some(file.as_raw_fd())
        );
    }

    #[test]
    fn test_set_nonblocking() {
        let (_rd, wr) = pipe().unwrap();
        set_nonblocking(wr.as_fd()).unwrap();
        let flags = fcntl(wr.as_raw_fd(), FcntlArg::F_GETFL).unwrap();
        assert!(OFlag::from_bits_truncate(flags).contains(OFlag::O_NONBLOCK));
        assert_eq!(access_mode(wr.as_fd()).unwrap(), AccessMode::WriteOnly);
    }
}
