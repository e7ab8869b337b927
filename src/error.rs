//! Error types for smartio
//!
//! Every failure surfaced by the copier and the multiplexer is a
//! [`SmartIoError`]. Contract violations (wrong argument shape, handle in the
//! wrong mode, negative timeout) are reported before any I/O happens; OS errors
//! are passed through unchanged.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for smartio operations
#[derive(Error, Debug)]
pub enum SmartIoError {
    /// I/O error during stream operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Argument has the wrong shape or a conversion yielded the wrong kind of value
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Handle is closed or not opened in the mode the operation needs
    #[error("Stream state error: {0}")]
    IoState(String),

    /// Argument has the right type but an unacceptable value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Wait cancelled through a cancellation token
    #[error("Operation cancelled")]
    Cancelled,
}

impl SmartIoError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch(message.into())
    }

    /// Create a stream state error
    pub fn io_state(message: impl Into<String>) -> Self {
        Self::IoState(message.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Check if this error is a caller contract violation rather than an OS failure
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::TypeMismatch(_) | Self::IoState(_) | Self::InvalidArgument(_)
        )
    }

    /// Get the underlying OS error kind, if any
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } if !path.as_os_str().is_empty() => Some(path),
            _ => None,
        }
    }
}

/// Result type alias for smartio operations
pub type Result<T> = std::result::Result<T, SmartIoError>;

impl From<std::io::Error> for SmartIoError {
    fn from(err: std::io::Error) -> Self {
        SmartIoError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

#[cfg(unix)]
impl From<nix::errno::Errno> for SmartIoError {
    fn from(errno: nix::errno::Errno) -> Self {
        SmartIoError::from(std::io::Error::from(errno))
    }
}

impl From<serde_json::Error> for SmartIoError {
    fn from(err: serde_json::Error) -> Self {
        SmartIoError::ConfigError(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| SmartIoError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = SmartIoError::io("/test/path", io_err);
        assert_eq!(err.path(), Some(&PathBuf::from("/test/path")));
        assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
    }

    #[test]
    fn test_bare_io_error_has_no_path() {
        let err: SmartIoError = std::io::Error::from(std::io::ErrorKind::BrokenPipe).into();
        assert!(err.path().is_none());
        assert!(!err.is_contract_violation());
    }

    #[test]
    fn test_contract_violations() {
        assert!(SmartIoError::type_mismatch("x").is_contract_violation());
        assert!(SmartIoError::io_state("x").is_contract_violation());
        assert!(SmartIoError::invalid_argument("x").is_contract_violation());
        assert!(!SmartIoError::Cancelled.is_contract_violation());
        assert!(!SmartIoError::config("x").is_contract_violation());
    }

    #[test]
    fn test_errno_conversion() {
        let err = SmartIoError::from(nix::errno::Errno::EBADF);
        assert!(matches!(err, SmartIoError::Io { .. }));
        assert_eq!(err.to_string(), format!("I/O error at '': {}", std::io::Error::from_raw_os_error(libc::EBADF)));
    }
}
