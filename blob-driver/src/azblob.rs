/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Bucket driver for Azure Blob Storage style services.
//!
//! A [`Bucket`] maps a single container onto the [`Driver`] contract.
//!
//! # Escaping
//!
//! Blob names cannot hold every key. Backslashes, control characters, a trailing `/` of a
//! full key and the `/` of `../` are stored as `__0x<hex>__` markers and restored on the way
//! out, so listings and attributes always show the caller's original keys.
//!
//! Metadata keys must be identifiers: every character other than ASCII letters, digits and
//! `_`, and a leading digit, is stored as a marker. Metadata values are percent escaped.
//!
//! # Native access
//!
//! The `before_*` hooks receive [`DownloadOptions`], [`UploadStreamOptions`],
//! [`StartCopyOptions`], [`ListBlobsHierarchyOptions`] and [`SasPermissions`]. Listed entries
//! expose a [`ListItem`], attributes a [`BlobProperties`], readers a [`DownloadResponse`] and
//! errors a [`ServiceError`].

use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::driver::Driver;
use crate::error::{self, Error, ErrorKind};
use crate::types::{
    run_hook, Attributes, CopyOptions, ListOptions, ListPage, ReaderOptions, SignedUrlOptions,
    WriterOptions,
};
use crate::Config;

mod client;
mod copy;
mod keys;
mod list;
mod native;
mod reader;
mod service_error;
mod sign;
mod writer;

/// In-process emulation of the blob service
pub mod memory;

pub use self::client::{ContainerClient, ServiceClient};
pub use self::native::{
    BlobHttpHeaders, BlobItem, BlobItemProperties, BlobPrefix, BlobProperties, CopyStatus,
    Download, DownloadOptions, DownloadResponse, ListBlobsHierarchyOptions,
    ListBlobsHierarchyPage, ListItem, SasPermissions, StartCopyOptions, StartCopyResponse,
    UploadResponse, UploadStreamOptions,
};
pub use self::reader::Reader;
pub use self::service_error::{
    classify, ResponseError, ServiceError, StorageError, StorageErrorCode,
};
pub use self::writer::Writer;

use self::copy::{wait_for_copy, CopyPolling};
use self::keys::{escape_key, escape_metadata, unescape_metadata};
use self::service_error::service_error;

/// A container exposed through the [`Driver`] contract.
#[derive(Debug)]
pub struct Bucket<C> {
    client: Arc<C>,
    config: Config,
}

impl<C: ContainerClient> Bucket<C> {
    /// Open the container `container_name` of `service`.
    pub fn open<S>(service: &S, container_name: &str, config: Config) -> Result<Self, Error>
    where
        S: ServiceClient<Container = C>,
    {
        if container_name.is_empty() {
            return Err(error::invalid_argument("container name is required"));
        }
        tracing::debug!(service = %service.url(), container = container_name, "opening bucket");
        Ok(Self::new(service.container_client(container_name), config))
    }

    /// Wrap an existing container client.
    pub fn new(client: C, config: Config) -> Self {
        Self {
            client: Arc::new(client),
            config,
        }
    }

    /// The driver configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn polling(&self) -> CopyPolling {
        CopyPolling {
            interval: self.config.copy_poll_interval(),
            retries: self.config.copy_poll_retries(),
        }
    }
}

/// Drive a backend call unless `cancel` fires first.
async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(error::canceled()),
        res = call => res.map_err(service_error),
    }
}

#[async_trait]
impl<C: ContainerClient> Driver for Bucket<C> {
    type Native = C;
    type CopyRequest = StartCopyOptions;
    type ReadRequest = DownloadOptions;
    type WriteRequest = UploadStreamOptions;
    type ListRequest = ListBlobsHierarchyOptions;
    type SignRequest = SasPermissions;
    type ListItem = ListItem;
    type AttributesResponse = BlobProperties;
    type NativeError = ServiceError;
    type Reader = Reader;
    type Writer = Writer<C>;

    fn native(&self) -> &C {
        &self.client
    }

    fn error_kind(&self, err: &(dyn std::error::Error + 'static)) -> ErrorKind {
        error::chain(err)
            .filter_map(|e| e.downcast_ref::<Error>())
            .map(Error::kind)
            .find(|kind| *kind != ErrorKind::Unknown)
            .unwrap_or_else(|| classify(err))
    }

    fn native_error<'a>(&self, err: &'a Error) -> Option<&'a ServiceError> {
        error::chain(err).find_map(|e| e.downcast_ref::<ServiceError>())
    }

    async fn close(&self) -> Result<(), Error> {
        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", name = "copy-blob")]
    async fn copy(
        &self,
        cancel: &CancellationToken,
        dst_key: &str,
        src_key: &str,
        opts: CopyOptions<StartCopyOptions>,
    ) -> Result<(), Error> {
        let dst = escape_key(dst_key, false);
        let src_url = self.client.blob_url(&escape_key(src_key, false));
        let mut copy_opts = StartCopyOptions::default();
        run_hook(opts.before_copy, &mut copy_opts)?;

        let started = cancellable(
            cancel,
            self.client.start_copy_from_url(&dst, &src_url, &copy_opts),
        )
        .await?;
        tracing::debug!(copy_id = %started.copy_id, status = %started.copy_status, "copy started");
        wait_for_copy(
            self.client.as_ref(),
            cancel,
            &dst,
            started.copy_status,
            self.polling(),
        )
        .await
    }

    #[tracing::instrument(skip_all, level = "debug", name = "delete-blob")]
    async fn delete(&self, cancel: &CancellationToken, key: &str) -> Result<(), Error> {
        let name = escape_key(key, false);
        cancellable(cancel, self.client.delete(&name)).await
    }

    #[tracing::instrument(skip_all, level = "debug", name = "new-range-reader")]
    async fn new_range_reader(
        &self,
        cancel: &CancellationToken,
        key: &str,
        offset: u64,
        length: Option<u64>,
        opts: ReaderOptions<DownloadOptions>,
    ) -> Result<Reader, Error> {
        let name = escape_key(key, false);
        let mut download_opts = DownloadOptions {
            offset,
            count: length,
        };
        run_hook(opts.before_read, &mut download_opts)?;

        let download = cancellable(cancel, self.client.download(&name, &download_opts)).await?;
        // a zero length read only needs the headers
        Ok(Reader::new(download, length == Some(0)))
    }

    #[tracing::instrument(skip_all, level = "debug", name = "new-typed-writer")]
    async fn new_typed_writer(
        &self,
        cancel: &CancellationToken,
        key: &str,
        content_type: &str,
        opts: WriterOptions<UploadStreamOptions>,
    ) -> Result<Writer<C>, Error> {
        let name = escape_key(key, false).into_owned();
        let metadata = escape_metadata(&opts.metadata)?;
        let block_size = match opts.buffer_size {
            0 => self.config.upload_block_size(),
            n => n,
        };
        let concurrency = match opts.max_concurrency {
            0 => self.config.upload_buffers(),
            n => n,
        };

        let mut upload_opts = UploadStreamOptions {
            block_size,
            concurrency,
            http_headers: BlobHttpHeaders {
                cache_control: opts.cache_control,
                content_disposition: opts.content_disposition,
                content_encoding: opts.content_encoding,
                content_language: opts.content_language,
                content_type: Some(content_type.to_owned()).filter(|ct| !ct.is_empty()),
                content_md5: opts.content_md5,
            },
            metadata,
        };
        run_hook(opts.before_write, &mut upload_opts)?;

        if cancel.is_cancelled() {
            return Err(error::canceled());
        }
        Ok(Writer::new(self.client.clone(), name, upload_opts, cancel))
    }

    #[tracing::instrument(skip_all, level = "debug", name = "blob-attributes")]
    async fn attributes(
        &self,
        cancel: &CancellationToken,
        key: &str,
    ) -> Result<Attributes<BlobProperties>, Error> {
        let name = escape_key(key, false);
        let props = cancellable(cancel, self.client.get_properties(&name)).await?;

        let headers = props.http_headers.clone();
        let metadata = unescape_metadata(&props.metadata);
        let (create_time, mod_time, size, etag) = (
            props.creation_time,
            props.last_modified,
            props.content_length,
            props.etag.clone(),
        );

        let mut attrs = Attributes::new(props);
        attrs.cache_control = headers.cache_control;
        attrs.content_disposition = headers.content_disposition;
        attrs.content_encoding = headers.content_encoding;
        attrs.content_language = headers.content_language;
        attrs.content_type = headers.content_type;
        attrs.md5 = headers.content_md5;
        attrs.metadata = metadata;
        attrs.create_time = create_time;
        attrs.mod_time = mod_time;
        attrs.size = size;
        attrs.etag = etag;
        Ok(attrs)
    }

    #[tracing::instrument(skip_all, level = "debug", name = "list-blobs")]
    async fn list_paged(
        &self,
        cancel: &CancellationToken,
        opts: ListOptions<ListBlobsHierarchyOptions>,
    ) -> Result<ListPage<ListItem>, Error> {
        let prefix = escape_key(&opts.prefix, true).into_owned();
        let mut list_opts = list::list_options(prefix, opts.page_token.as_ref(), opts.page_size)?;
        run_hook(opts.before_list, &mut list_opts)?;

        let delimiter = escape_key(&opts.delimiter, true);
        let page = cancellable(
            cancel,
            self.client.list_blobs_hierarchy(&delimiter, &list_opts),
        )
        .await?;
        Ok(list::into_page(page))
    }

    #[tracing::instrument(skip_all, level = "debug", name = "signed-url")]
    async fn signed_url(
        &self,
        cancel: &CancellationToken,
        key: &str,
        opts: SignedUrlOptions<SasPermissions>,
    ) -> Result<String, Error> {
        let enforces_content_type = opts
            .content_type
            .as_deref()
            .is_some_and(|ct| !ct.is_empty());
        if enforces_content_type || opts.enforce_absent_content_type {
            return Err(error::unimplemented(
                "signed URLs cannot enforce a Content-Type on PUT",
            ));
        }
        let mut perms = sign::permissions_for(&opts.method)?;
        run_hook(opts.before_sign, &mut perms)?;

        if cancel.is_cancelled() {
            return Err(error::canceled());
        }
        let name = escape_key(key, false);
        let start = SystemTime::now();
        self.client
            .sas_url(&name, &perms, start, start + opts.expiry)
            .map_err(service_error)
    }
}
