//! Stream copier
//!
//! Moves bytes from a readable endpoint to a writable one. Handles supplied
//! by the caller are validated up front, used at their current position and
//! never closed; files opened from a path are owned by the copy and closed on
//! every exit path.

use crate::copy::endpoint::Resolved;
use crate::copy::Endpoint;
use crate::error::{IoResultExt, Result, SmartIoError};
use crate::handle::{access_mode, BorrowedFile};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Upper bound for a single `copy_file_range` request
#[cfg(target_os = "linux")]
const ZERO_COPY_CHUNK: u64 = 64 * 1024 * 1024;

/// Options for stream copy operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyOptions {
    /// Buffer size for the read/write loop
    pub buffer_size: usize,
    /// Try `copy_file_range` before falling back to the buffered loop
    pub use_zero_copy: bool,
    /// fsync destination files the copier opened itself
    pub sync: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            buffer_size: 128 * 1024,
            use_zero_copy: true,
            sync: false,
        }
    }
}

/// Copy method used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CopyMethod {
    /// Read/write loop through a user-space buffer
    #[default]
    Buffered,
    /// In-kernel copy using copy_file_range
    ZeroCopy,
}

/// Copy operation statistics
#[derive(Debug, Clone, Default)]
pub struct CopyStats {
    /// Bytes copied
    pub bytes_copied: u64,
    /// Duration of the copy
    pub duration: Duration,
    /// Throughput in bytes/second
    pub throughput: f64,
    /// Method used for copy
    pub method: CopyMethod,
}

impl CopyStats {
    /// Calculate throughput from bytes and duration
    pub fn calculate_throughput(&mut self) {
        if self.duration.as_secs_f64() > 0.0 {
            self.throughput = self.bytes_copied as f64 / self.duration.as_secs_f64();
        }
    }
}

/// A single copy: where from, where to, how much and from which offset
#[derive(Debug, Clone)]
pub struct CopyRequest<'s, 'd> {
    /// Readable endpoint
    pub source: Endpoint<'s>,
    /// Writable endpoint
    pub destination: Endpoint<'d>,
    /// Maximum bytes to copy; `None` copies to end of stream
    pub length: Option<u64>,
    /// Absolute source offset; `None` reads from (and advances) the current position
    pub offset: Option<u64>,
}

impl<'s, 'd> CopyRequest<'s, 'd> {
    /// Unbounded copy from the source's current position
    pub fn new(source: impl Into<Endpoint<'s>>, destination: impl Into<Endpoint<'d>>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            length: None,
            offset: None,
        }
    }

    /// Copy at most `length` bytes
    pub fn length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    /// Read from `offset` without moving the source position
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// An opened side of a copy
enum Stream<'a> {
    Owned { file: File, path: PathBuf },
    Borrowed(BorrowedFile<'a>),
}

impl Stream<'_> {
    fn file(&self) -> &File {
        match self {
            Self::Owned { file, .. } => file,
            Self::Borrowed(file) => &**file,
        }
    }

    fn error(&self, source: std::io::Error) -> SmartIoError {
        match self {
            Self::Owned { path, .. } => SmartIoError::io(path, source),
            Self::Borrowed(_) => SmartIoError::from(source),
        }
    }
}

/// Stream copier
pub struct StreamCopier {
    options: CopyOptions,
}

impl StreamCopier {
    /// Create a new copier with the given options
    pub fn new(options: CopyOptions) -> Self {
        Self { options }
    }

    /// Create with default options
    pub fn default_copier() -> Self {
        Self::new(CopyOptions::default())
    }

    /// Options in effect
    pub fn options(&self) -> &CopyOptions {
        &self.options
    }

    /// Copy `source` to `destination`, returning the number of bytes moved
    pub fn copy<'s, 'd>(
        &self,
        source: impl Into<Endpoint<'s>>,
        destination: impl Into<Endpoint<'d>>,
        length: Option<u64>,
        offset: Option<u64>,
    ) -> Result<u64> {
        let request = CopyRequest {
            source: source.into(),
            destination: destination.into(),
            length,
            offset,
        };
        self.execute(request).map(|stats| stats.bytes_copied)
    }

    /// Run a copy request and report how it went
    pub fn execute(&self, request: CopyRequest<'_, '_>) -> Result<CopyStats> {
        let start = Instant::now();

        // Handle modes are checked before any path is opened or truncated.
        if let Endpoint::Handle(fd) = &request.source {
            if !access_mode(*fd)?.readable() {
                return Err(SmartIoError::io_state(format!(
                    "source {} is not opened for reading",
                    request.source.describe()
                )));
            }
        }
        if let Endpoint::Handle(fd) = &request.destination {
            if !access_mode(*fd)?.writable() {
                return Err(SmartIoError::io_state(format!(
                    "destination {} is not opened for writing",
                    request.destination.describe()
                )));
            }
        }

        // Path conversions run once each, before anything is opened.
        let source = request.source.resolve()?;
        let destination = request.destination.resolve()?;

        let source = open_source(source)?;
        let destination = open_destination(destination)?;

        debug!(
            source = %request.source.describe(),
            destination = %request.destination.describe(),
            length = ?request.length,
            offset = ?request.offset,
            "Starting stream copy"
        );

        let (bytes_copied, method) =
            self.transfer(&source, &destination, request.length, request.offset)?;

        if self.options.sync {
            if let Stream::Owned { file, path } = &destination {
                file.sync_all().with_path(path)?;
            }
        }

        let mut stats = CopyStats {
            bytes_copied,
            duration: start.elapsed(),
            throughput: 0.0,
            method,
        };
        stats.calculate_throughput();

        debug!(bytes = bytes_copied, ?method, "Stream copy finished");
        Ok(stats)
    }

    fn transfer(
        &self,
        source: &Stream<'_>,
        destination: &Stream<'_>,
        length: Option<u64>,
        offset: Option<u64>,
    ) -> Result<(u64, CopyMethod)> {
        if length == Some(0) {
            return Ok((0, CopyMethod::Buffered));
        }

        if self.options.use_zero_copy && can_use_zero_copy() {
            if let Some(bytes) = self.copy_zero_copy(source, destination, length, offset)? {
                return Ok((bytes, CopyMethod::ZeroCopy));
            }
            debug!("copy_file_range unavailable for these streams, using buffered copy");
        }

        let bytes = self.copy_buffered(source, destination, length, offset)?;
        Ok((bytes, CopyMethod::Buffered))
    }

    /// Buffered copy - works for every kind of stream
    fn copy_buffered(
        &self,
        source: &Stream<'_>,
        destination: &Stream<'_>,
        length: Option<u64>,
        offset: Option<u64>,
    ) -> Result<u64> {
        let capacity = match length {
            Some(limit) => limit.min(self.options.buffer_size as u64) as usize,
            None => self.options.buffer_size,
        };
        let mut buffer = vec![0u8; capacity.max(1)];

        let mut reader = source.file();
        let mut writer = destination.file();
        let mut position = offset;
        let mut total = 0u64;

        loop {
            let want = match length {
                Some(limit) => (limit - total).min(buffer.len() as u64) as usize,
                None => buffer.len(),
            };
            if want == 0 {
                break;
            }

            let read = match position {
                Some(pos) => reader.read_at(&mut buffer[..want], pos),
                None => reader.read(&mut buffer[..want]),
            };
            let n = match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(source.error(e)),
            };

            writer
                .write_all(&buffer[..n])
                .map_err(|e| destination.error(e))?;

            total += n as u64;
            if let Some(pos) = position.as_mut() {
                *pos += n as u64;
            }
            trace!(chunk = n, total, "Buffered chunk written");
        }

        Ok(total)
    }

    /// Zero-copy using copy_file_range
    ///
    /// Returns `Ok(None)` when the kernel refuses these descriptors before any
    /// byte moved, so the caller can fall back to the buffered loop.
    #[cfg(target_os = "linux")]
    fn copy_zero_copy(
        &self,
        source: &Stream<'_>,
        destination: &Stream<'_>,
        length: Option<u64>,
        offset: Option<u64>,
    ) -> Result<Option<u64>> {
        use std::os::unix::io::AsRawFd;

        let src_fd = source.file().as_raw_fd();
        let dst_fd = destination.file().as_raw_fd();

        let mut offset_in: libc::loff_t = match offset {
            Some(pos) => libc::loff_t::try_from(pos).map_err(|_| {
                SmartIoError::invalid_argument(format!("source offset {} is out of range", pos))
            })?,
            None => 0,
        };

        let mut total: u64 = 0;

        loop {
            let remaining = match length {
                Some(limit) => limit - total,
                None => ZERO_COPY_CHUNK,
            };
            if remaining == 0 {
                break;
            }
            let to_copy = remaining.min(ZERO_COPY_CHUNK) as usize;

            // A null input offset makes the kernel use and advance the file position.
            let off_in = if offset.is_some() {
                &mut offset_in as *mut libc::loff_t
            } else {
                std::ptr::null_mut()
            };

            let copied = unsafe {
                libc::copy_file_range(src_fd, off_in, dst_fd, std::ptr::null_mut(), to_copy, 0)
            };

            if copied < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                if total == 0 && is_unsupported(&err) {
                    return Ok(None);
                }
                return Err(source.error(err));
            }

            if copied == 0 {
                // Some pseudo filesystems report 0 instead of an error; let the
                // buffered loop confirm end of stream.
                if total == 0 {
                    return Ok(None);
                }
                break; // EOF
            }

            total += copied as u64;
        }

        Ok(Some(total))
    }

    #[cfg(not(target_os = "linux"))]
    fn copy_zero_copy(
        &self,
        _source: &Stream<'_>,
        _destination: &Stream<'_>,
        _length: Option<u64>,
        _offset: Option<u64>,
    ) -> Result<Option<u64>> {
        Ok(None)
    }
}

impl Default for StreamCopier {
    fn default() -> Self {
        Self::default_copier()
    }
}

/// Check if zero-copy is available
fn can_use_zero_copy() -> bool {
    cfg!(target_os = "linux")
}

#[cfg(target_os = "linux")]
fn is_unsupported(err: &std::io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EINVAL)
            | Some(libc::EXDEV)
            | Some(libc::ENOSYS)
            | Some(libc::EOPNOTSUPP)
            | Some(libc::EBADF)
            | Some(libc::ESPIPE)
    )
}

fn open_source(endpoint: Resolved<'_>) -> Result<Stream<'_>> {
    match endpoint {
        Resolved::Path(path) => {
            let file = File::open(&path).with_path(&path)?;
            Ok(Stream::Owned { file, path })
        }
        Resolved::Handle(fd) => Ok(Stream::Borrowed(BorrowedFile::new(fd))),
    }
}

fn open_destination(endpoint: Resolved<'_>) -> Result<Stream<'_>> {
    match endpoint {
        Resolved::Path(path) => {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)
                .with_path(&path)?;
            Ok(Stream::Owned { file, path })
        }
        Resolved::Handle(fd) => Ok(Stream::Borrowed(BorrowedFile::new(fd))),
    }
}

/// Copy with default options
///
/// `length` bounds the number of bytes; `offset` reads from an absolute
/// source position and leaves the source's own position untouched.
pub fn copy_stream<'s, 'd>(
    source: impl Into<Endpoint<'s>>,
    destination: impl Into<Endpoint<'d>>,
    length: Option<u64>,
    offset: Option<u64>,
) -> Result<u64> {
    StreamCopier::default_copier().copy(source, destination, length, offset)
}
