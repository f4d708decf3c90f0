/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Errors of the blob service and their mapping onto portable error codes.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::error::{self, ErrorKind};

/// Error returned by a blob service client.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The service answered with a storage error code.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The service answered with an HTTP error that carried no storage error body.
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// The request never got an answer.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
}

impl ServiceError {
    /// Storage error with the given status and code.
    pub fn storage(status: u16, code: StorageErrorCode, message: impl Into<String>) -> Self {
        ServiceError::Storage(StorageError {
            status,
            code,
            message: message.into(),
        })
    }

    /// HTTP response error without a storage error body.
    pub fn response(status: u16, error_code: Option<String>) -> Self {
        ServiceError::Response(ResponseError { status, error_code })
    }

    /// The service's error code, if it sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ServiceError::Storage(err) => Some(err.code.as_str()),
            ServiceError::Response(err) => err.error_code.as_deref(),
            ServiceError::Transport(_) => None,
        }
    }

    /// HTTP status of the response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Storage(err) => Some(err.status),
            ServiceError::Response(err) => Some(err.status),
            ServiceError::Transport(_) => None,
        }
    }
}

/// A storage service error response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code} (HTTP {status}): {message}")]
pub struct StorageError {
    /// HTTP status code
    pub status: u16,
    /// Service error code
    pub code: StorageErrorCode,
    /// Human readable message from the service
    pub message: String,
}

/// A generic HTTP error response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unexpected HTTP status {status}{}", .error_code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
pub struct ResponseError {
    /// HTTP status code
    pub status: u16,
    /// `x-ms-error-code` header, if present
    pub error_code: Option<String>,
}

/// Error codes the blob service returns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum StorageErrorCode {
    /// `BlobNotFound`
    BlobNotFound,
    /// `ContainerNotFound`
    ContainerNotFound,
    /// `AuthenticationFailed`
    AuthenticationFailed,
    /// `AuthorizationFailure`
    AuthorizationFailure,
    /// `InvalidRange`
    InvalidRange,
    /// `CannotVerifyCopySource`
    CannotVerifyCopySource,
    /// `InternalError`
    InternalError,
    /// Any code without a dedicated variant
    Other(String),
}

impl StorageErrorCode {
    /// Wire spelling of the code.
    pub fn as_str(&self) -> &str {
        match self {
            StorageErrorCode::BlobNotFound => "BlobNotFound",
            StorageErrorCode::ContainerNotFound => "ContainerNotFound",
            StorageErrorCode::AuthenticationFailed => "AuthenticationFailed",
            StorageErrorCode::AuthorizationFailure => "AuthorizationFailure",
            StorageErrorCode::InvalidRange => "InvalidRange",
            StorageErrorCode::CannotVerifyCopySource => "CannotVerifyCopySource",
            StorageErrorCode::InternalError => "InternalError",
            StorageErrorCode::Other(code) => code,
        }
    }
}

impl From<&str> for StorageErrorCode {
    fn from(value: &str) -> Self {
        match value {
            "BlobNotFound" => StorageErrorCode::BlobNotFound,
            "ContainerNotFound" => StorageErrorCode::ContainerNotFound,
            "AuthenticationFailed" => StorageErrorCode::AuthenticationFailed,
            "AuthorizationFailure" => StorageErrorCode::AuthorizationFailure,
            "InvalidRange" => StorageErrorCode::InvalidRange,
            "CannotVerifyCopySource" => StorageErrorCode::CannotVerifyCopySource,
            "InternalError" => StorageErrorCode::InternalError,
            other => StorageErrorCode::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fragments of the messages resolvers report for a host that could not be looked up.
///
/// `getaddrinfo` failures surface through `std::net` and tokio as
/// `failed to lookup address information: ..`, Windows reports `No such host is known`.
const HOST_LOOKUP_FAILURES: [&str; 4] = [
    "failed to lookup address information",
    "name or service not known",
    "nodename nor servname provided",
    "no such host",
];

fn is_host_lookup_failure(err: &(dyn std::error::Error + 'static)) -> bool {
    error::chain(err).any(|e| {
        let message = e.to_string().to_ascii_lowercase();
        HOST_LOOKUP_FAILURES.iter().any(|f| message.contains(f))
    })
}

/// Map an error onto a portable code.
///
/// The first [`ServiceError`] in the source chain decides: `BlobNotFound` or HTTP 404 is
/// [`ErrorKind::NotFound`], `AuthenticationFailed` is [`ErrorKind::PermissionDenied`]. Without
/// a service response, a failed host lookup is [`ErrorKind::NotFound`] since the account does
/// not exist. Everything else is [`ErrorKind::Unknown`].
pub fn classify(err: &(dyn std::error::Error + 'static)) -> ErrorKind {
    let service = error::chain(err).find_map(|e| e.downcast_ref::<ServiceError>());
    if let Some(status) = service.and_then(ServiceError::status) {
        let code = service.and_then(ServiceError::code);
        return match code {
            Some("BlobNotFound") => ErrorKind::NotFound,
            _ if status == 404 => ErrorKind::NotFound,
            Some("AuthenticationFailed") => ErrorKind::PermissionDenied,
            _ => ErrorKind::Unknown,
        };
    }
    if is_host_lookup_failure(err) {
        return ErrorKind::NotFound;
    }
    ErrorKind::Unknown
}

/// Wrap a backend error, tagging it with its portable code.
pub(crate) fn service_error(err: ServiceError) -> crate::error::Error {
    let kind = classify(&err);
    crate::error::Error::new(kind, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_classify_storage_errors() {
        let tests = [
            (404, "BlobNotFound", ErrorKind::NotFound),
            (404, "ContainerNotFound", ErrorKind::NotFound),
            (400, "BlobNotFound", ErrorKind::NotFound),
            (403, "AuthenticationFailed", ErrorKind::PermissionDenied),
            (403, "AuthorizationFailure", ErrorKind::Unknown),
            (500, "InternalError", ErrorKind::Unknown),
        ];

        for (status, code, expected) in tests {
            let err = ServiceError::storage(status, code.into(), "boom");
            assert_eq!(expected, classify(&err), "{status} {code}");
        }
    }

    #[test]
    fn test_classify_response_errors() {
        assert_eq!(
            ErrorKind::NotFound,
            classify(&ServiceError::response(404, None))
        );
        assert_eq!(
            ErrorKind::PermissionDenied,
            classify(&ServiceError::response(
                403,
                Some("AuthenticationFailed".into())
            ))
        );
        assert_eq!(
            ErrorKind::Unknown,
            classify(&ServiceError::response(503, None))
        );
    }

    #[test]
    fn test_classify_transport_errors() {
        let dns = ServiceError::Transport(io::Error::other(
            "dial tcp: lookup nope.blob.core.windows.net: no such host",
        ));
        assert_eq!(ErrorKind::NotFound, classify(&dns));

        let reset = ServiceError::Transport(io::Error::other("connection reset by peer"));
        assert_eq!(ErrorKind::Unknown, classify(&reset));

        let plain = io::Error::other("no such host");
        assert_eq!(ErrorKind::NotFound, classify(&plain));
    }

    #[test]
    fn test_classify_unresolvable_host() {
        use std::net::ToSocketAddrs;

        let lookup = "invalidstorageaccount.blob.core.invalid:443"
            .to_socket_addrs()
            .unwrap_err();
        let err = service_error(ServiceError::Transport(lookup));
        assert_eq!(ErrorKind::NotFound, err.kind());
        assert_eq!(ErrorKind::NotFound, classify(&err));

        let windows = io::Error::other("No such host is known. (os error 11001)");
        assert_eq!(
            ErrorKind::NotFound,
            classify(&ServiceError::Transport(windows))
        );
    }

    #[test]
    fn test_classify_looks_through_wrappers() {
        let wrapped = Error::new(
            ErrorKind::Unknown,
            ServiceError::storage(404, StorageErrorCode::BlobNotFound, "gone"),
        );
        assert_eq!(ErrorKind::NotFound, classify(&wrapped));
    }

    #[test]
    fn test_service_error_tags_kind() {
        let err = service_error(ServiceError::storage(
            403,
            StorageErrorCode::AuthenticationFailed,
            "bad signature",
        ));
        assert_eq!(ErrorKind::PermissionDenied, err.kind());
        assert_eq!(
            "AuthenticationFailed (HTTP 403): bad signature",
            std::error::Error::source(&err).unwrap().to_string()
        );
    }
}
