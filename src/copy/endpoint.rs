//! Copy endpoints: file names or caller-owned handles

use crate::error::{Result, SmartIoError};
use crate::handle::ToPath;
use std::fmt;
use std::fs::File;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::path::{Path, PathBuf};

/// One side of a copy
///
/// A `Path` endpoint is opened (and for destinations, created or truncated)
/// by the copier, which closes it again before returning. A `Handle` endpoint
/// belongs to the caller and is used at its current position. A `Convertible`
/// endpoint is turned into a path by the copier itself, exactly once per copy.
#[derive(Clone)]
pub enum Endpoint<'a> {
    /// File name opened by the copier
    Path(PathBuf),
    /// Open descriptor owned by the caller
    Handle(BorrowedFd<'a>),
    /// Object that produces a file name on request
    Convertible(&'a dyn ToPath),
}

/// An endpoint after path conversion
pub(crate) enum Resolved<'a> {
    Path(PathBuf),
    Handle(BorrowedFd<'a>),
}

impl<'a> Endpoint<'a> {
    /// Endpoint for a file name
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Endpoint for an open handle
    pub fn handle<H: AsFd + ?Sized>(handle: &'a H) -> Self {
        Self::Handle(handle.as_fd())
    }

    /// Resolve a path-convertible object, calling its conversion exactly once
    pub fn convert<P: ToPath + ?Sized>(object: &P) -> Result<Self> {
        path_from(object).map(Self::Path)
    }

    /// Endpoint for an object the copier converts to a file name
    pub fn convertible(object: &'a dyn ToPath) -> Self {
        Self::Convertible(object)
    }

    /// Whether the copier owns the underlying file for the duration of a copy
    pub fn is_path(&self) -> bool {
        matches!(self, Self::Path(_) | Self::Convertible(_))
    }

    /// Run any pending path conversion
    pub(crate) fn resolve(&self) -> Result<Resolved<'a>> {
        match self {
            Self::Path(path) => Ok(Resolved::Path(path.clone())),
            Self::Handle(fd) => Ok(Resolved::Handle(*fd)),
            Self::Convertible(object) => path_from(*object).map(Resolved::Path),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Handle(fd) => format!("<fd {}>", fd.as_raw_fd()),
            Self::Convertible(_) => "<path-convertible>".to_string(),
        }
    }
}

fn path_from<P: ToPath + ?Sized>(object: &P) -> Result<PathBuf> {
    match object.to_path() {
        Some(path) if !path.as_os_str().is_empty() => Ok(path),
        Some(_) => Err(SmartIoError::type_mismatch(
            "path conversion returned an empty path",
        )),
        None => Err(SmartIoError::type_mismatch(
            "path conversion did not return a file name",
        )),
    }
}

impl fmt::Debug for Endpoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Handle(fd) => f.debug_tuple("Handle").field(fd).finish(),
            Self::Convertible(_) => f.write_str("Convertible(..)"),
        }
    }
}

impl<'a> From<&'a dyn ToPath> for Endpoint<'a> {
    fn from(object: &'a dyn ToPath) -> Self {
        Self::Convertible(object)
    }
}

impl From<&str> for Endpoint<'_> {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<String> for Endpoint<'_> {
    fn from(path: String) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<&Path> for Endpoint<'_> {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for Endpoint<'_> {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&PathBuf> for Endpoint<'_> {
    fn from(path: &PathBuf) -> Self {
        Self::Path(path.clone())
    }
}

impl<'a> From<&'a File> for Endpoint<'a> {
    fn from(file: &'a File) -> Self {
        Self::Handle(file.as_fd())
    }
}

impl<'a> From<&'a OwnedFd> for Endpoint<'a> {
    fn from(fd: &'a OwnedFd) -> Self {
        Self::Handle(fd.as_fd())
    }
}

impl<'a> From<BorrowedFd<'a>> for Endpoint<'a> {
    fn from(fd: BorrowedFd<'a>) -> Self {
        Self::Handle(fd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(Option<&'static str>);

    impl ToPath for Named {
        fn to_path(&self) -> Option<PathBuf> {
            self.0.map(PathBuf::from)
        }
    }

    #[test]
    fn test_convert() {
        let endpoint = Endpoint::convert(&Named(Some("/tmp/out"))).unwrap();
        assert!(matches!(endpoint, Endpoint::Path(ref p) if p == Path::new("/tmp/out")));

        assert!(matches!(
            Endpoint::convert(&Named(None)),
            Err(SmartIoError::TypeMismatch(_))
        ));
        assert!(matches!(
            Endpoint::convert(&Named(Some(""))),
            Err(SmartIoError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_from_handle() {
        let file = tempfile::tempfile().unwrap();
        let endpoint = Endpoint::from(&file);
        assert!(!endpoint.is_path());
        assert_eq!(endpoint.describe(), format!("<fd {}>", file.as_raw_fd()));
        assert!(Endpoint::from("name.txt").is_path());
    }

    #[test]
    fn test_convertible_resolves_on_demand() {
        let named = Named(Some("/tmp/out"));
        let endpoint = Endpoint::convertible(&named);
        assert!(endpoint.is_path());
        assert_eq!(format!("{:?}", endpoint), "Convertible(..)");
        assert!(matches!(
            endpoint.resolve(),
            Ok(Resolved::Path(ref p)) if p == Path::new("/tmp/out")
        ));

        let unnamed = Named(None);
        assert!(matches!(
            Endpoint::from(&unnamed as &dyn ToPath).resolve(),
            Err(SmartIoError::TypeMismatch(_))
        ));
    }
}
