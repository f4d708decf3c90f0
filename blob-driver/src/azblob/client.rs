/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::config::ServiceUrl;
use crate::io::ByteBody;

use super::service_error::ServiceError;
use super::native::{
    BlobProperties, Download, DownloadOptions, ListBlobsHierarchyOptions, ListBlobsHierarchyPage,
    SasPermissions, StartCopyOptions, StartCopyResponse, UploadResponse, UploadStreamOptions,
};

/// Client for a blob service account.
pub trait ServiceClient: Send + Sync + fmt::Debug {
    /// Client type for a single container.
    type Container: ContainerClient;

    /// URL of the service account.
    fn url(&self) -> &ServiceUrl;

    /// Create a client for the container `name`. The container is not contacted.
    fn container_client(&self, name: &str) -> Self::Container;
}

/// Client for a single container.
///
/// Blob names passed to these methods are already escaped for the service.
#[async_trait]
pub trait ContainerClient: Send + Sync + fmt::Debug + 'static {
    /// URL of the container.
    fn url(&self) -> String;

    /// URL of the blob `name`, with any SAS query string of the service URL.
    fn blob_url(&self, name: &str) -> String;

    /// Start downloading `name`. The body is not read until polled.
    async fn download(&self, name: &str, opts: &DownloadOptions)
        -> Result<Download, ServiceError>;

    /// Fetch the properties of `name`.
    async fn get_properties(&self, name: &str) -> Result<BlobProperties, ServiceError>;

    /// Upload `body` as the new content of `name`, staging it in blocks.
    async fn upload_stream(
        &self,
        name: &str,
        body: ByteBody,
        opts: &UploadStreamOptions,
    ) -> Result<UploadResponse, ServiceError>;

    /// Delete `name`.
    async fn delete(&self, name: &str) -> Result<(), ServiceError>;

    /// Start a server side copy of `source_url` into `name`.
    async fn start_copy_from_url(
        &self,
        name: &str,
        source_url: &str,
        opts: &StartCopyOptions,
    ) -> Result<StartCopyResponse, ServiceError>;

    /// List one page of blobs, grouping names at `delimiter` (flat when empty).
    async fn list_blobs_hierarchy(
        &self,
        delimiter: &str,
        opts: &ListBlobsHierarchyOptions,
    ) -> Result<ListBlobsHierarchyPage, ServiceError>;

    /// Produce a URL for `name` signed with the client's credential.
    fn sas_url(
        &self,
        name: &str,
        permissions: &SasPermissions,
        start: SystemTime,
        expiry: SystemTime,
    ) -> Result<String, ServiceError>;
}
