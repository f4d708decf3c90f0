/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! In-memory implementation of the blob service client traits.
//!
//! [`MemoryService`] behaves like a storage account closely enough to run the driver against:
//! ranged downloads answer with `Content-Range`, listings return prefixes and blobs as separate
//! groups behind a marker, copies can stay pending for a configurable number of status polls,
//! and SAS URLs are signed with the account's shared key. Faults can be injected per operation.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures_util::{future, stream, TryStreamExt};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use sha2::Sha256;
use tokio::sync::RwLock;

use crate::config::loader::Environment;
use crate::config::{Credential, ServiceUrl};
use crate::error::Error;
use crate::io::ByteBody;

use super::client::{ContainerClient, ServiceClient};
use super::native::{
    BlobHttpHeaders, BlobItem, BlobItemProperties, BlobPrefix, BlobProperties, CopyStatus,
    Download, DownloadOptions, DownloadResponse, ListBlobsHierarchyOptions,
    ListBlobsHierarchyPage, SasPermissions, StartCopyOptions, StartCopyResponse, UploadResponse,
    UploadStreamOptions,
};
use super::service_error::{ServiceError, StorageErrorCode};

type HmacSha256 = Hmac<Sha256>;

const SAS_VERSION: &str = "2020-12-06";
const SAS_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const DEFAULT_MAX_RESULTS: u32 = 5000;

/// Characters escaped in blob URL paths.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'\\')
    .add(b'^')
    .add(b'|')
    .add(b'[')
    .add(b']');

/// Characters escaped in query string values.
const QUERY_VALUE: &AsciiSet = &percent_encoding::NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Service operations faults can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Operation {
    /// [`ContainerClient::download`]
    Download,
    /// [`ContainerClient::get_properties`]
    GetProperties,
    /// [`ContainerClient::upload_stream`]
    Upload,
    /// [`ContainerClient::delete`]
    Delete,
    /// [`ContainerClient::start_copy_from_url`]
    StartCopy,
    /// [`ContainerClient::list_blobs_hierarchy`]
    List,
    /// [`ContainerClient::sas_url`]
    Sign,
}

/// How server side copies into a container progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyBehavior {
    /// Number of property requests on the destination that still report the copy as pending.
    pub pending_polls: u32,
    /// State the copy settles in afterwards.
    pub outcome: CopyStatus,
}

impl Default for CopyBehavior {
    fn default() -> Self {
        Self {
            pending_polls: 0,
            outcome: CopyStatus::Success,
        }
    }
}

/// Request counters of a [`MemoryContainer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Download requests answered
    pub downloads: usize,
    /// Download bodies that were actually read
    pub bodies_read: usize,
    /// Property requests answered
    pub property_requests: usize,
    /// Uploads committed
    pub uploads: usize,
}

/// An in-memory storage account.
#[derive(Debug, Clone)]
pub struct MemoryService {
    inner: Arc<ServiceInner>,
}

#[derive(Debug)]
struct ServiceInner {
    url: ServiceUrl,
    credential: Credential,
    containers: Mutex<HashMap<String, Arc<ContainerState>>>,
    sequence: AtomicU64,
}

impl MemoryService {
    /// Create an account reachable at `url`, signing with `credential`.
    pub fn new(url: ServiceUrl, credential: Credential) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                url,
                credential,
                containers: Mutex::new(HashMap::new()),
                sequence: AtomicU64::new(1),
            }),
        }
    }

    /// Create an account from environment derived settings.
    pub fn from_environment(env: &Environment) -> Result<Self, Error> {
        let url = env.service_url(std::iter::empty::<(&str, &str)>())?;
        Ok(Self::new(url, env.credential().clone()))
    }

    /// Create the container `name`.
    pub fn create_container(&self, name: &str) -> Result<MemoryContainer, ServiceError> {
        let container = self.container_client(name);
        if container.state.exists.swap(true, Ordering::SeqCst) {
            return Err(ServiceError::storage(
                409,
                "ContainerAlreadyExists".into(),
                "The specified container already exists.",
            ));
        }
        Ok(container)
    }

    /// Delete the container `name` and every blob in it.
    pub async fn delete_container(&self, name: &str) -> Result<(), ServiceError> {
        let container = self.container_client(name);
        if !container.state.exists.swap(false, Ordering::SeqCst) {
            return Err(container_not_found());
        }
        container.state.blobs.write().await.clear();
        Ok(())
    }

    fn state(&self, name: &str) -> Arc<ContainerState> {
        lock(&self.inner.containers)
            .entry(name.to_owned())
            .or_default()
            .clone()
    }
}

impl ServiceClient for MemoryService {
    type Container = MemoryContainer;

    fn url(&self) -> &ServiceUrl {
        &self.inner.url
    }

    fn container_client(&self, name: &str) -> MemoryContainer {
        MemoryContainer {
            service: self.clone(),
            name: name.to_owned(),
            state: self.state(name),
        }
    }
}

/// A container of a [`MemoryService`].
#[derive(Debug)]
pub struct MemoryContainer {
    service: MemoryService,
    name: String,
    state: Arc<ContainerState>,
}

#[derive(Debug, Default)]
struct ContainerState {
    exists: AtomicBool,
    blobs: RwLock<BTreeMap<String, StoredBlob>>,
    faults: Mutex<HashMap<Operation, VecDeque<ServiceError>>>,
    copy_behavior: Mutex<CopyBehavior>,
    downloads: AtomicUsize,
    bodies_read: Arc<AtomicUsize>,
    property_requests: AtomicUsize,
    uploads: AtomicUsize,
}

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    http_headers: BlobHttpHeaders,
    metadata: HashMap<String, String>,
    created: SystemTime,
    modified: SystemTime,
    etag: String,
    copy: Option<CopyState>,
}

#[derive(Debug, Clone)]
struct CopyState {
    status: CopyStatus,
    polls_left: u32,
    outcome: CopyStatus,
}

impl CopyState {
    fn new(behavior: CopyBehavior) -> Self {
        let status = if behavior.pending_polls == 0 {
            behavior.outcome
        } else {
            CopyStatus::Pending
        };
        Self {
            status,
            polls_left: behavior.pending_polls,
            outcome: behavior.outcome,
        }
    }

    fn poll(&mut self) -> CopyStatus {
        if self.status == CopyStatus::Pending {
            if self.polls_left > 0 {
                self.polls_left -= 1;
            } else {
                self.status = self.outcome;
            }
        }
        self.status
    }
}

impl MemoryContainer {
    /// Name of the container.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fail the next call of `op` with `err`. Faults queue up in order.
    pub fn inject_fault(&self, op: Operation, err: ServiceError) {
        lock(&self.state.faults).entry(op).or_default().push_back(err);
    }

    /// Change how copies into this container progress.
    pub fn set_copy_behavior(&self, behavior: CopyBehavior) {
        *lock(&self.state.copy_behavior) = behavior;
    }

    /// Request counters so far.
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            downloads: self.state.downloads.load(Ordering::SeqCst),
            bodies_read: self.state.bodies_read.load(Ordering::SeqCst),
            property_requests: self.state.property_requests.load(Ordering::SeqCst),
            uploads: self.state.uploads.load(Ordering::SeqCst),
        }
    }

    /// Stored (escaped) blob names, in order.
    pub async fn blob_names(&self) -> Vec<String> {
        self.state.blobs.read().await.keys().cloned().collect()
    }

    /// Check a signed URL the way the service would before serving `method` on it.
    ///
    /// Returns the blob name the URL grants access to.
    pub fn verify_signed_url(
        &self,
        url: &str,
        method: &http::Method,
    ) -> Result<String, ServiceError> {
        let (path, query) = url
            .split_once('?')
            .ok_or_else(|| auth_failed("signed URL has no query string"))?;
        let prefix = format!("{}/", self.container_base());
        let name = path
            .strip_prefix(&prefix)
            .map(|name| percent_decode_str(name).decode_utf8_lossy().into_owned())
            .ok_or_else(|| auth_failed("signed URL does not address this container"))?;

        let params: HashMap<String, String> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        let param = |key: &str| {
            params
                .get(key)
                .map(String::as_str)
                .ok_or_else(|| auth_failed(&format!("signed URL is missing {key}")))
        };

        let string_to_sign = self.string_to_sign(&name, param("sp")?, param("st")?, param("se")?);
        let expected = self.sign(&string_to_sign)?;
        if expected != param("sig")? {
            return Err(auth_failed("signature mismatch"));
        }

        let expiry = NaiveDateTime::parse_from_str(param("se")?, SAS_TIME_FORMAT)
            .map_err(|_| auth_failed("malformed expiry"))?
            .and_utc();
        if expiry < Utc::now() {
            return Err(auth_failed("signed URL has expired"));
        }

        let perms = param("sp")?;
        let allowed = match method.as_str() {
            "GET" | "HEAD" => perms.contains('r'),
            "PUT" => perms.contains('c') || perms.contains('w'),
            "DELETE" => perms.contains('d'),
            _ => false,
        };
        if !allowed {
            return Err(ServiceError::storage(
                403,
                StorageErrorCode::AuthorizationFailure,
                format!("permissions {perms:?} do not allow {method}"),
            ));
        }
        Ok(name)
    }

    fn check(&self, op: Operation) -> Result<(), ServiceError> {
        let fault = lock(&self.state.faults)
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        if let Some(err) = fault {
            return Err(err);
        }
        if !self.state.exists.load(Ordering::SeqCst) {
            return Err(container_not_found());
        }
        Ok(())
    }

    fn next_etag(&self) -> String {
        let seq = self.service.inner.sequence.fetch_add(1, Ordering::SeqCst);
        format!("\"0x8D{seq:012X}\"")
    }

    fn container_base(&self) -> String {
        format!(
            "{}/{}",
            self.service.inner.url.base(),
            utf8_percent_encode(&self.name, PATH)
        )
    }

    fn string_to_sign(&self, name: &str, permissions: &str, start: &str, expiry: &str) -> String {
        let account = match &self.service.inner.credential {
            Credential::SharedKey { account_name, .. } => account_name.as_str(),
            _ => "",
        };
        let resource = format!("/blob/{account}/{}/{name}", self.name);
        [
            permissions,
            start,
            expiry,
            resource.as_str(),
            "", // signed identifier
            "", // signed IP
            "", // signed protocol
            SAS_VERSION,
            "b",
            "", // snapshot time
            "", // encryption scope
            "", // rscc
            "", // rscd
            "", // rsce
            "", // rscl
            "", // rsct
        ]
        .join("\n")
    }

    fn sign(&self, string_to_sign: &str) -> Result<String, ServiceError> {
        let Credential::SharedKey { account_key, .. } = &self.service.inner.credential else {
            return Err(ServiceError::storage(
                403,
                StorageErrorCode::AuthorizationFailure,
                "signing requires a shared key credential",
            ));
        };
        let key = STANDARD
            .decode(account_key)
            .map_err(|_| auth_failed("account key is not valid base64"))?;
        let mut mac =
            HmacSha256::new_from_slice(&key).map_err(|_| auth_failed("unusable account key"))?;
        mac.update(string_to_sign.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    // Blob name addressed by `url` within this service, as (container, blob).
    fn parse_blob_url(&self, url: &str) -> Option<(String, String)> {
        let path = url.split('?').next()?;
        let rest = path.strip_prefix(self.service.inner.url.base())?;
        let (container, name) = rest.strip_prefix('/')?.split_once('/')?;
        let decode = |s: &str| percent_decode_str(s).decode_utf8().ok().map(|s| s.into_owned());
        Some((decode(container)?, decode(name)?))
    }
}

#[async_trait]
impl ContainerClient for MemoryContainer {
    fn url(&self) -> String {
        self.service.inner.url.join(&self.name)
    }

    fn blob_url(&self, name: &str) -> String {
        let path = format!("{}/{}", self.name, utf8_percent_encode(name, PATH));
        self.service.inner.url.join(&path)
    }

    async fn download(
        &self,
        name: &str,
        opts: &DownloadOptions,
    ) -> Result<Download, ServiceError> {
        self.check(Operation::Download)?;
        self.state.downloads.fetch_add(1, Ordering::SeqCst);
        let blobs = self.state.blobs.read().await;
        let blob = blobs.get(name).ok_or_else(blob_not_found)?;

        let size = blob.data.len() as u64;
        let (data, content_range) = if opts.is_ranged() {
            if opts.offset >= size {
                return Err(ServiceError::storage(
                    416,
                    StorageErrorCode::InvalidRange,
                    "The range specified is invalid for the current size of the resource.",
                ));
            }
            let end = match opts.count {
                Some(count) if count > 0 => opts.offset.saturating_add(count).min(size),
                _ => size,
            };
            (
                blob.data.slice(opts.offset as usize..end as usize),
                Some(format!("bytes {}-{}/{}", opts.offset, end - 1, size)),
            )
        } else {
            (blob.data.clone(), None)
        };

        let response = DownloadResponse {
            content_type: blob.http_headers.content_type.clone(),
            content_length: data.len() as u64,
            content_range,
            last_modified: blob.modified,
            etag: Some(blob.etag.clone()),
            metadata: blob.metadata.clone(),
        };
        let bodies_read = self.state.bodies_read.clone();
        let body = stream::once(async move {
            bodies_read.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::io::Error>(data)
        })
        .try_filter(|chunk: &Bytes| future::ready(!chunk.is_empty()));

        Ok(Download {
            response,
            body: ByteBody::from_stream(body),
        })
    }

    async fn get_properties(&self, name: &str) -> Result<BlobProperties, ServiceError> {
        self.check(Operation::GetProperties)?;
        self.state.property_requests.fetch_add(1, Ordering::SeqCst);
        let mut blobs = self.state.blobs.write().await;
        let blob = blobs.get_mut(name).ok_or_else(blob_not_found)?;

        let copy_status = blob.copy.as_mut().map(|copy| {
            let was_pending = copy.status == CopyStatus::Pending;
            let status = copy.poll();
            (was_pending, status)
        });
        if let Some((true, CopyStatus::Aborted | CopyStatus::Failed)) = copy_status {
            blob.data = Bytes::new();
        }

        Ok(BlobProperties {
            http_headers: blob.http_headers.clone(),
            content_length: blob.data.len() as u64,
            creation_time: blob.created,
            last_modified: blob.modified,
            etag: Some(blob.etag.clone()),
            metadata: blob.metadata.clone(),
            copy_status: copy_status.map(|(_, status)| status),
            copy_status_description: copy_status.and_then(|(_, status)| match status {
                CopyStatus::Failed => Some("copy source became unavailable".to_owned()),
                CopyStatus::Aborted => Some("copy was aborted".to_owned()),
                _ => None,
            }),
        })
    }

    async fn upload_stream(
        &self,
        name: &str,
        body: ByteBody,
        opts: &UploadStreamOptions,
    ) -> Result<UploadResponse, ServiceError> {
        self.check(Operation::Upload)?;
        let data = body.collect().await?;

        let mut http_headers = opts.http_headers.clone();
        if http_headers.content_md5.is_none() {
            http_headers.content_md5 = Some(Md5::digest(&data).to_vec());
        }
        let now = SystemTime::now();
        let blob = StoredBlob {
            data,
            http_headers,
            metadata: opts.metadata.clone(),
            created: now,
            modified: now,
            etag: self.next_etag(),
            copy: None,
        };
        let response = UploadResponse {
            etag: blob.etag.clone(),
            last_modified: now,
        };
        self.state
            .blobs
            .write()
            .await
            .insert(name.to_owned(), blob);
        self.state.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(response)
    }

    async fn delete(&self, name: &str) -> Result<(), ServiceError> {
        self.check(Operation::Delete)?;
        match self.state.blobs.write().await.remove(name) {
            Some(_) => Ok(()),
            None => Err(blob_not_found()),
        }
    }

    async fn start_copy_from_url(
        &self,
        name: &str,
        source_url: &str,
        opts: &StartCopyOptions,
    ) -> Result<StartCopyResponse, ServiceError> {
        self.check(Operation::StartCopy)?;
        let cannot_verify = || {
            ServiceError::storage(
                404,
                StorageErrorCode::CannotVerifyCopySource,
                "The specified blob does not exist.",
            )
        };
        let (container, source_name) = self
            .parse_blob_url(source_url)
            .ok_or_else(|| {
                ServiceError::storage(
                    400,
                    StorageErrorCode::CannotVerifyCopySource,
                    format!("copy source {source_url:?} is not in this account"),
                )
            })?;

        let source_state = if container == self.name {
            self.state.clone()
        } else {
            self.service.state(&container)
        };
        let source = source_state
            .blobs
            .read()
            .await
            .get(&source_name)
            .cloned()
            .ok_or_else(cannot_verify)?;

        let behavior = *lock(&self.state.copy_behavior);
        let copy = CopyState::new(behavior);
        let status = copy.status;
        let now = SystemTime::now();
        let data = match status {
            CopyStatus::Aborted | CopyStatus::Failed => Bytes::new(),
            _ => source.data,
        };
        let blob = StoredBlob {
            data,
            http_headers: source.http_headers,
            metadata: opts.metadata.clone().unwrap_or(source.metadata),
            created: now,
            modified: now,
            etag: self.next_etag(),
            copy: Some(copy),
        };
        self.state
            .blobs
            .write()
            .await
            .insert(name.to_owned(), blob);

        let copy_id = format!("copy-{}", self.service.inner.sequence.fetch_add(1, Ordering::SeqCst));
        tracing::trace!(%copy_id, %status, "copy accepted");
        Ok(StartCopyResponse {
            copy_id,
            copy_status: status,
        })
    }

    async fn list_blobs_hierarchy(
        &self,
        delimiter: &str,
        opts: &ListBlobsHierarchyOptions,
    ) -> Result<ListBlobsHierarchyPage, ServiceError> {
        self.check(Operation::List)?;
        let max_results = opts.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
        if max_results == 0 {
            return Err(ServiceError::storage(
                400,
                "OutOfRangeQueryParameterValue".into(),
                "maxresults must be greater than zero",
            ));
        }
        let prefix = opts.prefix.as_deref().unwrap_or("");
        let marker = opts.marker.as_deref().unwrap_or("");

        enum Entry<'a> {
            Prefix(&'a str),
            Blob(&'a str, &'a StoredBlob),
        }
        impl Entry<'_> {
            fn name(&self) -> &str {
                match self {
                    Entry::Prefix(name) | Entry::Blob(name, _) => name,
                }
            }
        }

        let blobs = self.state.blobs.read().await;
        let mut entries: Vec<Entry<'_>> = Vec::new();
        for (name, blob) in blobs.range(prefix.to_owned()..) {
            if !name.starts_with(prefix) {
                break;
            }
            let grouped = (!delimiter.is_empty())
                .then(|| name[prefix.len()..].find(delimiter))
                .flatten()
                .map(|idx| &name[..prefix.len() + idx + delimiter.len()]);
            match grouped {
                Some(group) => {
                    let seen = matches!(entries.last(), Some(Entry::Prefix(last)) if *last == group);
                    if !seen {
                        entries.push(Entry::Prefix(group));
                    }
                }
                None => entries.push(Entry::Blob(name, blob)),
            }
        }

        let mut remaining = entries
            .into_iter()
            .skip_while(|entry| entry.name() < marker)
            .peekable();
        let mut page = ListBlobsHierarchyPage::default();
        for _ in 0..max_results {
            match remaining.next() {
                Some(Entry::Prefix(name)) => page.blob_prefixes.push(BlobPrefix {
                    name: name.to_owned(),
                }),
                Some(Entry::Blob(name, blob)) => page.blob_items.push(BlobItem {
                    name: name.to_owned(),
                    properties: BlobItemProperties {
                        content_length: blob.data.len() as u64,
                        last_modified: blob.modified,
                        content_md5: blob.http_headers.content_md5.clone(),
                        etag: Some(blob.etag.clone()),
                        content_type: blob.http_headers.content_type.clone(),
                    },
                }),
                None => break,
            }
        }
        page.next_marker = remaining.peek().map(|entry| entry.name().to_owned());
        Ok(page)
    }

    fn sas_url(
        &self,
        name: &str,
        permissions: &SasPermissions,
        start: SystemTime,
        expiry: SystemTime,
    ) -> Result<String, ServiceError> {
        self.check(Operation::Sign)?;
        let format_time =
            |t: SystemTime| DateTime::<Utc>::from(t).format(SAS_TIME_FORMAT).to_string();
        let (start, expiry) = (format_time(start), format_time(expiry));
        let sp = permissions.to_permission_string();

        let signature = self.sign(&self.string_to_sign(name, &sp, &start, &expiry))?;
        let query = [
            ("sv", SAS_VERSION),
            ("st", start.as_str()),
            ("se", expiry.as_str()),
            ("sr", "b"),
            ("sp", sp.as_str()),
            ("sig", signature.as_str()),
        ]
        .iter()
        .map(|(k, v)| format!("{k}={}", utf8_percent_encode(v, QUERY_VALUE)))
        .collect::<Vec<_>>()
        .join("&");

        Ok(format!(
            "{}/{}?{query}",
            self.container_base(),
            utf8_percent_encode(name, PATH)
        ))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn blob_not_found() -> ServiceError {
    ServiceError::storage(
        404,
        StorageErrorCode::BlobNotFound,
        "The specified blob does not exist.",
    )
}

fn container_not_found() -> ServiceError {
    ServiceError::storage(
        404,
        StorageErrorCode::ContainerNotFound,
        "The specified container does not exist.",
    )
}

fn auth_failed(message: &str) -> ServiceError {
    ServiceError::storage(403, StorageErrorCode::AuthenticationFailed, message)
}
