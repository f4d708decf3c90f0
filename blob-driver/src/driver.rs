/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The contract every storage backend implements.
//!
//! A portable front end calls drivers only through these traits. Backend specific request
//! and response types are exposed through the associated types so callers can reach the native
//! layer through the `before_*` hooks, the `native()` accessors and [`Driver::native_error`].

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, ErrorKind};
use crate::types::{
    Attributes, CopyOptions, ListOptions, ListPage, ReaderAttributes, ReaderOptions,
    SignedUrlOptions, WriterOptions,
};

/// Bucket driver operations.
///
/// Every operation takes a [`CancellationToken`]; once it fires the operation stops waiting on
/// the backend and fails with [`ErrorKind::Canceled`].
#[async_trait]
pub trait Driver: Send + Sync + fmt::Debug {
    /// Native handle exposed by [`Driver::native`].
    type Native: Send + Sync;
    /// Native copy request, mutable through [`CopyOptions::before_copy`].
    type CopyRequest: Send + Sync + fmt::Debug;
    /// Native download request, mutable through [`ReaderOptions::before_read`].
    type ReadRequest: Send + Sync + fmt::Debug;
    /// Native upload request, mutable through [`WriterOptions::before_write`].
    type WriteRequest: Send + Sync + fmt::Debug;
    /// Native list request, mutable through [`ListOptions::before_list`].
    type ListRequest: Send + Sync + fmt::Debug;
    /// Native signing request, mutable through [`SignedUrlOptions::before_sign`].
    type SignRequest: Send + Sync + fmt::Debug;
    /// Native representation of each listed entry.
    type ListItem: Send + Sync + fmt::Debug;
    /// Native property response behind [`Attributes`].
    type AttributesResponse: Send + Sync + fmt::Debug;
    /// The backend's error type.
    type NativeError: std::error::Error + Send + Sync + 'static;
    /// Reader returned by [`Driver::new_range_reader`].
    type Reader: Reader;
    /// Writer returned by [`Driver::new_typed_writer`].
    type Writer: Writer;

    /// The backend client this driver talks to.
    fn native(&self) -> &Self::Native;

    /// Map any error produced by this driver or its backend onto a portable code.
    fn error_kind(&self, err: &(dyn std::error::Error + 'static)) -> ErrorKind;

    /// Find the backend error inside `err`, if there is one.
    fn native_error<'a>(&self, err: &'a Error) -> Option<&'a Self::NativeError>;

    /// Release the driver's resources.
    async fn close(&self) -> Result<(), Error>;

    /// Server side copy of `src_key` to `dst_key`, waiting until the copy reaches a terminal
    /// state.
    async fn copy(
        &self,
        cancel: &CancellationToken,
        dst_key: &str,
        src_key: &str,
        opts: CopyOptions<Self::CopyRequest>,
    ) -> Result<(), Error>;

    /// Delete the blob stored at `key`.
    async fn delete(&self, cancel: &CancellationToken, key: &str) -> Result<(), Error>;

    /// Read `length` bytes of `key` starting at `offset`; `None` reads to the end.
    async fn new_range_reader(
        &self,
        cancel: &CancellationToken,
        key: &str,
        offset: u64,
        length: Option<u64>,
        opts: ReaderOptions<Self::ReadRequest>,
    ) -> Result<Self::Reader, Error>;

    /// Start writing a blob. Nothing is committed until [`Writer::close`] succeeds.
    async fn new_typed_writer(
        &self,
        cancel: &CancellationToken,
        key: &str,
        content_type: &str,
        opts: WriterOptions<Self::WriteRequest>,
    ) -> Result<Self::Writer, Error>;

    /// Fetch the full attributes of `key`.
    async fn attributes(
        &self,
        cancel: &CancellationToken,
        key: &str,
    ) -> Result<Attributes<Self::AttributesResponse>, Error>;

    /// Fetch one page of a listing.
    async fn list_paged(
        &self,
        cancel: &CancellationToken,
        opts: ListOptions<Self::ListRequest>,
    ) -> Result<ListPage<Self::ListItem>, Error>;

    /// Produce a time limited URL granting `opts.method` on `key` without further
    /// credentials.
    async fn signed_url(
        &self,
        cancel: &CancellationToken,
        key: &str,
        opts: SignedUrlOptions<Self::SignRequest>,
    ) -> Result<String, Error>;
}

/// Streaming read of a blob range.
#[async_trait]
pub trait Reader: Send + fmt::Debug {
    /// Native download response.
    type Native: Send + Sync;

    /// Pull the next chunk, `None` once the range is exhausted.
    async fn next(&mut self) -> Option<Result<Bytes, Error>>;

    /// Attributes known from the download response.
    fn attributes(&self) -> &ReaderAttributes;

    /// The backend's own download response.
    fn native(&self) -> &Self::Native;

    /// Release the underlying stream.
    async fn close(self) -> Result<(), Error>
    where
        Self: Sized;
}

/// Streaming write of a blob.
#[async_trait]
pub trait Writer: Send + fmt::Debug {
    /// Hand `buf` to the upload, returning the number of bytes accepted.
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Error>;

    /// Finish the upload and wait for the backend to commit it.
    async fn close(self) -> Result<(), Error>
    where
        Self: Sized;
}
