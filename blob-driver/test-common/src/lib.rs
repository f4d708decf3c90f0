/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Once;

use blob_driver::azblob::memory::{MemoryContainer, MemoryService};
use blob_driver::azblob::Bucket;
use blob_driver::config::{Credential, ServiceUrl, ServiceUrlOptions};
use blob_driver::error::Error;
use blob_driver::types::WriterOptions;
use blob_driver::{Config, Driver, Reader, Writer};
use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::sync::CancellationToken;

/// Account key used by [`memory_service`]
pub const ACCOUNT_KEY: &str = "dGVzdC1hY2NvdW50LWtleQ==";

/// Install a test writer subscriber honoring `RUST_LOG`. Safe to call from every test.
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// An in-memory account `testaccount` with a shared key credential.
pub fn memory_service() -> MemoryService {
    let url = ServiceUrl::new(&ServiceUrlOptions {
        account_name: "testaccount".into(),
        ..Default::default()
    })
    .unwrap();
    MemoryService::new(
        url,
        Credential::SharedKey {
            account_name: "testaccount".into(),
            account_key: ACCOUNT_KEY.into(),
        },
    )
}

/// A bucket on a freshly created container of a new [`memory_service`].
pub fn memory_bucket(config: Config) -> Bucket<MemoryContainer> {
    init_logging();
    let service = memory_service();
    service.create_container("test-container").unwrap();
    Bucket::open(&service, "test-container", config).unwrap()
}

/// Write `data` to `key` in a single write.
pub async fn write_object<D: Driver>(bucket: &D, key: &str, data: &[u8]) -> Result<(), Error> {
    write_object_with(bucket, key, data, WriterOptions::default()).await
}

/// Write `data` to `key` in a single write with the given options.
pub async fn write_object_with<D: Driver>(
    bucket: &D,
    key: &str,
    data: &[u8],
    opts: WriterOptions<D::WriteRequest>,
) -> Result<(), Error> {
    let cancel = CancellationToken::new();
    let mut writer = bucket
        .new_typed_writer(&cancel, key, "application/octet-stream", opts)
        .await?;
    writer.write(data).await?;
    writer.close().await
}

/// drain/consume the reader
pub async fn drain<R: Reader>(reader: &mut R) -> Result<Bytes, Error> {
    let mut data = BytesMut::new();
    while let Some(chunk) = reader.next().await {
        data.put(chunk?);
    }
    Ok(data.freeze())
}
