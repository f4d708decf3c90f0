/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime};

use bytes::Bytes;

use crate::error::Error;

/// Callback given mutable access to a driver's native request just before it is sent.
///
/// `T` is the backend-specific request type, e.g.
/// [`UploadStreamOptions`](crate::azblob::UploadStreamOptions) for writes. Returning an error
/// aborts the operation before any backend call is made.
pub struct BeforeHook<T> {
    f: Box<dyn FnOnce(&mut T) -> Result<(), Error> + Send + Sync>,
}

impl<T> BeforeHook<T> {
    /// Wrap a callback.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&mut T) -> Result<(), Error> + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }

    pub(crate) fn call(self, native: &mut T) -> Result<(), Error> {
        (self.f)(native)
    }
}

impl<T> fmt::Debug for BeforeHook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BeforeHook").field(&"<closure>").finish()
    }
}

/// Run an optional hook against a native request.
pub(crate) fn run_hook<T>(hook: Option<BeforeHook<T>>, native: &mut T) -> Result<(), Error> {
    match hook {
        Some(hook) => hook.call(native),
        None => Ok(()),
    }
}

/// Options for [`Driver::new_typed_writer`](crate::driver::Driver::new_typed_writer).
///
/// Zero values for `buffer_size` and `max_concurrency` select the driver's defaults.
#[derive(Debug)]
pub struct WriterOptions<R> {
    /// Size of each chunk the backend uploads.
    pub buffer_size: usize,
    /// Number of chunks the backend may upload in parallel.
    pub max_concurrency: usize,
    /// `Cache-Control` to store with the blob
    pub cache_control: Option<String>,
    /// `Content-Disposition` to store with the blob
    pub content_disposition: Option<String>,
    /// `Content-Encoding` to store with the blob
    pub content_encoding: Option<String>,
    /// `Content-Language` to store with the blob
    pub content_language: Option<String>,
    /// MD5 of the full content, stored as the blob's content hash
    pub content_md5: Option<Vec<u8>>,
    /// User metadata, with arbitrary keys and values.
    pub metadata: HashMap<String, String>,
    /// Hook run against the native upload options.
    pub before_write: Option<BeforeHook<R>>,
}

impl<R> Default for WriterOptions<R> {
    fn default() -> Self {
        Self {
            buffer_size: 0,
            max_concurrency: 0,
            cache_control: None,
            content_disposition: None,
            content_encoding: None,
            content_language: None,
            content_md5: None,
            metadata: HashMap::new(),
            before_write: None,
        }
    }
}

/// Options for [`Driver::new_range_reader`](crate::driver::Driver::new_range_reader).
#[derive(Debug)]
pub struct ReaderOptions<R> {
    /// Hook run against the native download options.
    pub before_read: Option<BeforeHook<R>>,
}

impl<R> Default for ReaderOptions<R> {
    fn default() -> Self {
        Self { before_read: None }
    }
}

/// Options for [`Driver::copy`](crate::driver::Driver::copy).
#[derive(Debug)]
pub struct CopyOptions<R> {
    /// Hook run against the native copy options.
    pub before_copy: Option<BeforeHook<R>>,
}

impl<R> Default for CopyOptions<R> {
    fn default() -> Self {
        Self { before_copy: None }
    }
}

/// Options for [`Driver::list_paged`](crate::driver::Driver::list_paged).
#[derive(Debug)]
pub struct ListOptions<R> {
    /// Only list keys starting with this prefix.
    pub prefix: String,
    /// Group keys sharing a prefix up to the next occurrence of the delimiter into a single
    /// directory entry. Empty means a flat listing.
    pub delimiter: String,
    /// Token from a previous page's [`ListPage::next_page_token`]; `None` starts from the
    /// beginning.
    pub page_token: Option<Bytes>,
    /// Maximum entries per page, zero selects the driver default.
    pub page_size: usize,
    /// Hook run against the native list options.
    pub before_list: Option<BeforeHook<R>>,
}

impl<R> Default for ListOptions<R> {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            delimiter: String::new(),
            page_token: None,
            page_size: 0,
            before_list: None,
        }
    }
}

/// Options for [`Driver::signed_url`](crate::driver::Driver::signed_url).
#[derive(Debug)]
pub struct SignedUrlOptions<R> {
    /// HTTP method the URL is valid for.
    pub method: http::Method,
    /// How long the URL stays valid.
    pub expiry: Duration,
    /// Content type a PUT must carry.
    pub content_type: Option<String>,
    /// Require that a PUT carries no content type.
    pub enforce_absent_content_type: bool,
    /// Hook run against the native permission set.
    pub before_sign: Option<BeforeHook<R>>,
}

impl<R> Default for SignedUrlOptions<R> {
    fn default() -> Self {
        Self {
            method: http::Method::GET,
            expiry: Duration::from_secs(60 * 60),
            content_type: None,
            enforce_absent_content_type: false,
            before_sign: None,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct ListPage<N> {
    /// Directory entries and blobs, ordered by key.
    pub objects: Vec<ListObject<N>>,
    /// Token for the next page; `None` on the last page.
    pub next_page_token: Option<Bytes>,
}

/// A blob or directory entry in a [`ListPage`].
#[derive(Debug, Clone)]
pub struct ListObject<N> {
    /// Unescaped key. Directory entries end with the delimiter.
    pub key: String,
    /// Last modification time, `None` for directory entries.
    pub mod_time: Option<SystemTime>,
    /// Size in bytes, zero for directory entries.
    pub size: u64,
    /// Content MD5 if the backend has one.
    pub md5: Option<Vec<u8>>,
    /// Whether this is a directory entry rather than a blob.
    pub is_dir: bool,
    native: N,
}

impl<N> ListObject<N> {
    pub(crate) fn new(
        key: String,
        mod_time: Option<SystemTime>,
        size: u64,
        md5: Option<Vec<u8>>,
        is_dir: bool,
        native: N,
    ) -> Self {
        Self {
            key,
            mod_time,
            size,
            md5,
            is_dir,
            native,
        }
    }

    /// The backend's own representation of this entry.
    pub fn native(&self) -> &N {
        &self.native
    }
}

/// Full attributes of a stored blob.
#[derive(Debug, Clone)]
pub struct Attributes<N> {
    /// `Cache-Control`
    pub cache_control: Option<String>,
    /// `Content-Disposition`
    pub content_disposition: Option<String>,
    /// `Content-Encoding`
    pub content_encoding: Option<String>,
    /// `Content-Language`
    pub content_language: Option<String>,
    /// `Content-Type`
    pub content_type: Option<String>,
    /// Unescaped user metadata
    pub metadata: HashMap<String, String>,
    /// Creation time
    pub create_time: SystemTime,
    /// Last modification time
    pub mod_time: SystemTime,
    /// Size in bytes
    pub size: u64,
    /// Content MD5 if the backend has one.
    pub md5: Option<Vec<u8>>,
    /// Entity tag
    pub etag: Option<String>,
    native: N,
}

impl<N> Attributes<N> {
    /// Attributes with every field empty, to be filled in by the driver.
    pub(crate) fn new(native: N) -> Attributes<N> {
        Attributes {
            cache_control: None,
            content_disposition: None,
            content_encoding: None,
            content_language: None,
            content_type: None,
            metadata: HashMap::new(),
            create_time: SystemTime::UNIX_EPOCH,
            mod_time: SystemTime::UNIX_EPOCH,
            size: 0,
            md5: None,
            etag: None,
            native,
        }
    }

    /// The backend's own property response.
    pub fn native(&self) -> &N {
        &self.native
    }
}

/// The subset of attributes known as soon as a read starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderAttributes {
    /// `Content-Type` of the blob
    pub content_type: Option<String>,
    /// Last modification time
    pub mod_time: SystemTime,
    /// Size of the whole blob, not of the requested range
    pub size: u64,
}
