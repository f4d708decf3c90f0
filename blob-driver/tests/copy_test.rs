/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::HashMap;
use std::time::Duration;

use blob_driver::azblob::memory::{CopyBehavior, Operation};
use blob_driver::azblob::{CopyStatus, ServiceError, StartCopyOptions};
use blob_driver::error::ErrorKind;
use blob_driver::types::{BeforeHook, CopyOptions, ReaderOptions, WriterOptions};
use blob_driver::{Config, Driver};
use test_common::{drain, memory_bucket, write_object, write_object_with};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn test_copy_waits_for_pending_copy() {
    let bucket = memory_bucket(Config::default());
    let cancel = CancellationToken::new();
    write_object(&bucket, "src", b"payload").await.unwrap();
    bucket.native().set_copy_behavior(CopyBehavior {
        pending_polls: 2,
        outcome: CopyStatus::Success,
    });

    let start = Instant::now();
    bucket
        .copy(&cancel, "dst", "src", CopyOptions::default())
        .await
        .unwrap();
    assert_eq!(Duration::from_millis(1500), start.elapsed());
    assert_eq!(3, bucket.native().stats().property_requests);

    let mut reader = bucket
        .new_range_reader(&cancel, "dst", 0, None, ReaderOptions::default())
        .await
        .unwrap();
    assert_eq!("payload", drain(&mut reader).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_copy_completed_on_start_does_not_poll() {
    let bucket = memory_bucket(Config::default());
    let cancel = CancellationToken::new();
    write_object(&bucket, "src", b"payload").await.unwrap();

    let start = Instant::now();
    bucket
        .copy(&cancel, "dst", "src", CopyOptions::default())
        .await
        .unwrap();
    assert_eq!(Duration::ZERO, start.elapsed());
    assert_eq!(0, bucket.native().stats().property_requests);
}

#[tokio::test(start_paused = true)]
async fn test_failed_copy_names_status() {
    let bucket = memory_bucket(Config::default());
    let cancel = CancellationToken::new();
    write_object(&bucket, "src", b"payload").await.unwrap();
    bucket.native().set_copy_behavior(CopyBehavior {
        pending_polls: 1,
        outcome: CopyStatus::Failed,
    });

    let err = bucket
        .copy(&cancel, "dst", "src", CopyOptions::default())
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::Unknown, err.kind());
    let source = std::error::Error::source(&err).unwrap().to_string();
    assert!(source.contains("failed"), "{source}");
}

#[tokio::test(start_paused = true)]
async fn test_poll_failures_within_budget() {
    let bucket = memory_bucket(Config::default());
    let cancel = CancellationToken::new();
    write_object(&bucket, "src", b"payload").await.unwrap();
    bucket.native().set_copy_behavior(CopyBehavior {
        pending_polls: 3,
        outcome: CopyStatus::Success,
    });
    for _ in 0..2 {
        bucket
            .native()
            .inject_fault(Operation::GetProperties, ServiceError::response(503, None));
    }

    bucket
        .copy(&cancel, "dst", "src", CopyOptions::default())
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_poll_failures_exhaust_budget() {
    let bucket = memory_bucket(Config::builder().copy_poll_retries(2).build());
    let cancel = CancellationToken::new();
    write_object(&bucket, "src", b"payload").await.unwrap();
    bucket.native().set_copy_behavior(CopyBehavior {
        pending_polls: 3,
        outcome: CopyStatus::Success,
    });
    for _ in 0..2 {
        bucket
            .native()
            .inject_fault(Operation::GetProperties, ServiceError::response(503, None));
    }

    let err = bucket
        .copy(&cancel, "dst", "src", CopyOptions::default())
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::Unknown, err.kind());
    assert_eq!(
        Some(503),
        bucket.native_error(&err).and_then(ServiceError::status)
    );
}

#[tokio::test]
async fn test_copy_missing_source() {
    let bucket = memory_bucket(Config::default());
    let cancel = CancellationToken::new();

    let err = bucket
        .copy(&cancel, "dst", "missing", CopyOptions::default())
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::NotFound, err.kind());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_pending() {
    let bucket = memory_bucket(Config::default());
    let cancel = CancellationToken::new();
    write_object(&bucket, "src", b"payload").await.unwrap();
    bucket.native().set_copy_behavior(CopyBehavior {
        pending_polls: 100,
        outcome: CopyStatus::Success,
    });

    let token = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1200)).await;
        token.cancel();
    });
    let start = Instant::now();
    let err = bucket
        .copy(&cancel, "dst", "src", CopyOptions::default())
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::Canceled, err.kind());
    assert_eq!(Duration::from_millis(1200), start.elapsed());
}

#[tokio::test]
async fn test_copy_keys_metadata_and_hook() {
    let bucket = memory_bucket(Config::default());
    let cancel = CancellationToken::new();
    let opts = WriterOptions {
        metadata: HashMap::from([("origin".to_owned(), "source".to_owned())]),
        ..Default::default()
    };
    write_object_with(&bucket, "dir/", b"trailing", opts)
        .await
        .unwrap();

    bucket
        .copy(&cancel, "a\\b", "dir/", CopyOptions::default())
        .await
        .unwrap();
    let attrs = bucket.attributes(&cancel, "a\\b").await.unwrap();
    assert_eq!(Some("source"), attrs.metadata.get("origin").map(String::as_str));
    assert_eq!(8, attrs.size);

    let opts = CopyOptions {
        before_copy: Some(BeforeHook::new(|opts: &mut StartCopyOptions| {
            opts.metadata = Some(HashMap::from([("origin".to_owned(), "hook".to_owned())]));
            Ok(())
        })),
    };
    bucket.copy(&cancel, "other", "dir/", opts).await.unwrap();
    let attrs = bucket.attributes(&cancel, "other").await.unwrap();
    assert_eq!(Some("hook"), attrs.metadata.get("origin").map(String::as_str));
    assert_eq!(Some(&CopyStatus::Success), attrs.native().copy_status.as_ref());
}
