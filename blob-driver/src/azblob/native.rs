/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Request and response types of the blob service API.

use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

use crate::io::ByteBody;

/// Options for [`ContainerClient::download`](super::ContainerClient::download).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    /// First byte to return.
    pub offset: u64,
    /// Number of bytes to return. `None` or zero reads to the end of the blob.
    pub count: Option<u64>,
}

impl DownloadOptions {
    /// Whether these options request anything other than the whole blob.
    pub fn is_ranged(&self) -> bool {
        self.offset > 0 || self.count.is_some_and(|count| count > 0)
    }
}

/// Headers of a download response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResponse {
    /// `Content-Type`
    pub content_type: Option<String>,
    /// `Content-Length` of this response, i.e. of the returned range.
    pub content_length: u64,
    /// `Content-Range`, e.g. `bytes 0-499/1234`, present for ranged responses.
    pub content_range: Option<String>,
    /// `Last-Modified`
    pub last_modified: SystemTime,
    /// `ETag`
    pub etag: Option<String>,
    /// Escaped user metadata
    pub metadata: HashMap<String, String>,
}

/// A download response together with its body.
#[derive(Debug)]
pub struct Download {
    /// Response headers
    pub response: DownloadResponse,
    /// Response body, not read until polled.
    pub body: ByteBody,
}

/// Standard HTTP headers stored with a blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobHttpHeaders {
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
    /// Content MD5
    pub content_md5: Option<Vec<u8>>,
}

/// Options for [`ContainerClient::upload_stream`](super::ContainerClient::upload_stream).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadStreamOptions {
    /// Size of each staged block.
    pub block_size: usize,
    /// Number of blocks staged concurrently.
    pub concurrency: usize,
    /// HTTP headers to store with the blob
    pub http_headers: BlobHttpHeaders,
    /// Escaped user metadata
    pub metadata: HashMap<String, String>,
}

/// Result of a committed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    /// `ETag` of the new blob
    pub etag: String,
    /// `Last-Modified` of the new blob
    pub last_modified: SystemTime,
}

/// Properties of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobProperties {
    /// Standard HTTP headers
    pub http_headers: BlobHttpHeaders,
    /// Size in bytes
    pub content_length: u64,
    /// Creation time
    pub creation_time: SystemTime,
    /// Last modification time
    pub last_modified: SystemTime,
    /// `ETag`
    pub etag: Option<String>,
    /// Escaped user metadata
    pub metadata: HashMap<String, String>,
    /// State of the last copy into this blob, if it was ever a copy destination.
    pub copy_status: Option<CopyStatus>,
    /// Backend supplied detail for a failed or aborted copy.
    pub copy_status_description: Option<String>,
}

/// Options for [`ContainerClient::start_copy_from_url`](super::ContainerClient::start_copy_from_url).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartCopyOptions {
    /// Metadata for the destination; `None` copies the source's metadata.
    pub metadata: Option<HashMap<String, String>>,
}

/// Result of starting a server side copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCopyResponse {
    /// Identifier of the copy operation
    pub copy_id: String,
    /// State right after the copy was accepted
    pub copy_status: CopyStatus,
}

/// State of a server side copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CopyStatus {
    /// Still running
    Pending,
    /// Completed
    Success,
    /// Aborted by a client
    Aborted,
    /// Failed on the service side
    Failed,
}

impl CopyStatus {
    /// Wire spelling of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyStatus::Pending => "pending",
            CopyStatus::Success => "success",
            CopyStatus::Aborted => "aborted",
            CopyStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for [`ContainerClient::list_blobs_hierarchy`](super::ContainerClient::list_blobs_hierarchy).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListBlobsHierarchyOptions {
    /// Only return names with this prefix.
    pub prefix: Option<String>,
    /// Continuation marker from a previous page.
    pub marker: Option<String>,
    /// Maximum entries (blobs plus prefixes) in the page.
    pub max_results: Option<u32>,
}

/// One page of a hierarchical listing.
///
/// Prefixes and blobs are returned as two separate groups, each ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListBlobsHierarchyPage {
    /// Blob name prefixes ending at the delimiter
    pub blob_prefixes: Vec<BlobPrefix>,
    /// Blobs
    pub blob_items: Vec<BlobItem>,
    /// Marker for the next page, empty or `None` on the last page.
    pub next_marker: Option<String>,
}

/// A listed name prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobPrefix {
    /// Escaped prefix, ending with the delimiter
    pub name: String,
}

/// A listed blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobItem {
    /// Escaped blob name
    pub name: String,
    /// Blob properties included in the listing
    pub properties: BlobItemProperties,
}

/// Properties returned with each listed blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobItemProperties {
    /// Size in bytes
    pub content_length: u64,
    /// Last modification time
    pub last_modified: SystemTime,
    /// Content MD5
    pub content_md5: Option<Vec<u8>>,
    /// `ETag`
    pub etag: Option<String>,
    /// `Content-Type`
    pub content_type: Option<String>,
}

/// Native form of each entry in a driver listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListItem {
    /// A blob
    Blob(BlobItem),
    /// A directory-like prefix
    Prefix(BlobPrefix),
}

/// Permissions granted by a shared access signature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SasPermissions {
    /// `r`
    pub read: bool,
    /// `a`
    pub add: bool,
    /// `c`
    pub create: bool,
    /// `w`
    pub write: bool,
    /// `d`
    pub delete: bool,
}

impl SasPermissions {
    /// Permission string in the service's canonical order.
    pub fn to_permission_string(&self) -> String {
        [
            (self.read, 'r'),
            (self.add, 'a'),
            (self.create, 'c'),
            (self.write, 'w'),
            (self.delete, 'd'),
        ]
        .into_iter()
        .filter_map(|(granted, c)| granted.then_some(c))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_string_order() {
        let perms = SasPermissions {
            write: true,
            create: true,
            ..Default::default()
        };
        assert_eq!("cw", perms.to_permission_string());
        assert_eq!("", SasPermissions::default().to_permission_string());
    }

    #[test]
    fn test_is_ranged() {
        assert!(!DownloadOptions::default().is_ranged());
        assert!(!DownloadOptions { offset: 0, count: Some(0) }.is_ranged());
        assert!(DownloadOptions { offset: 0, count: Some(1) }.is_ranged());
        assert!(DownloadOptions { offset: 3, count: None }.is_ranged());
    }
}
