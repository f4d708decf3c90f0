/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

/// A boxed error that is `Send` and `Sync`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by bucket drivers.
///
/// The backend error that caused the failure is kept unchanged as the
/// [`source`](std::error::Error::source) of this error. Use
/// [`Driver::native_error`](crate::driver::Driver::native_error) to get at it
/// with its concrete type.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: BoxError,
}

/// Portable error codes shared by every driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The blob, container or host does not exist.
    NotFound,

    /// The caller's credentials were rejected.
    PermissionDenied,

    /// Operation input validation issues (bad method, duplicate metadata keys, ...)
    InvalidArgument,

    /// The driver does not support the requested feature.
    Unimplemented,

    /// The operation's cancellation signal fired before it finished.
    Canceled,

    /// Anything the driver could not classify.
    Unknown,
}

impl Error {
    /// Creates a new driver [`Error`] from a known kind of error as well as an arbitrary error
    /// source.
    pub fn new<E>(kind: ErrorKind, err: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            kind,
            source: err.into(),
        }
    }

    /// Returns the corresponding [`ErrorKind`] for this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Consumes the error, returning the underlying cause.
    pub fn into_source(self) -> BoxError {
        self.source
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "resource not found"),
            ErrorKind::PermissionDenied => write!(f, "permission denied"),
            ErrorKind::InvalidArgument => write!(f, "invalid argument"),
            ErrorKind::Unimplemented => write!(f, "not implemented"),
            ErrorKind::Canceled => write!(f, "operation canceled"),
            ErrorKind::Unknown => write!(f, "unknown error"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        let kind = match value.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::Unknown,
        };
        Self::new(kind, value)
    }
}

pub(crate) fn invalid_argument<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::InvalidArgument, err)
}

pub(crate) fn unimplemented<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::Unimplemented, err)
}

pub(crate) fn from_kind<E>(kind: ErrorKind) -> impl FnOnce(E) -> Error
where
    E: Into<BoxError>,
{
    move |err| Error::new(kind, err)
}

static CANCELLATION_ERROR: &str = "cancellation was requested before the operation finished";

pub(crate) fn canceled() -> Error {
    Error::new(ErrorKind::Canceled, CANCELLATION_ERROR)
}

/// Iterate `err` and every error in its source chain.
pub(crate) fn chain<'a>(
    err: &'a (dyn std::error::Error + 'static),
) -> impl Iterator<Item = &'a (dyn std::error::Error + 'static)> {
    std::iter::successors(Some(err), |e| e.source())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_source_is_preserved() {
        let err = invalid_argument("bad key");
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
        assert_eq!("invalid argument", err.to_string());
        assert_eq!("bad key", err.source().unwrap().to_string());
    }

    #[test]
    fn test_io_error_kinds() {
        let err: Error = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert_eq!(ErrorKind::NotFound, err.kind());
        let err: Error = std::io::Error::other("boom").into();
        assert_eq!(ErrorKind::Unknown, err.kind());
    }

    #[test]
    fn test_chain_walks_sources() {
        let inner = std::io::Error::other("no such host");
        let err = Error::new(ErrorKind::Unknown, inner);
        let messages: Vec<String> = chain(&err).map(|e| e.to_string()).collect();
        assert_eq!(vec!["unknown error", "no such host"], messages);
    }
}
