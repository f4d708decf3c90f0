/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/* Automatically managed default lints */
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
/* End of automatically managed default lints */
#![warn(
    missing_debug_implementations,
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

//! A provider-agnostic bucket driver contract and a blob storage backend for it.
//!
//! The [`Driver`] trait is what a portable storage front end programs against: ranged reads,
//! streaming writes, attributes, paginated listings, server side copies, deletes and signed
//! URLs, each with an escape hatch to the backend's native request types. [`azblob::Bucket`]
//! implements it for Azure Blob Storage style services.
//!
//! # Examples
//!
//! Open a bucket on an in-memory account and write an object:
//!
//! ```no_run
//! # async fn example() -> Result<(), blob_driver::error::Error> {
//! use blob_driver::azblob::memory::MemoryService;
//! use blob_driver::azblob::Bucket;
//! use blob_driver::{Driver, Writer};
//! use tokio_util::sync::CancellationToken;
//!
//! let (config, env) = blob_driver::from_env().load();
//! let service = MemoryService::from_environment(env)?;
//! let bucket = Bucket::open(&service, "my-container", config)?;
//!
//! let cancel = CancellationToken::new();
//! let mut writer = bucket
//!     .new_typed_writer(&cancel, "hello.txt", "text/plain", Default::default())
//!     .await?;
//! writer.write(b"hello world").await?;
//! writer.close().await?;
//! # Ok(())
//! # }
//! ```

/// 1 MiB
pub(crate) const MEBIBYTE: usize = 1024 * 1024;

/// Error types emitted by `blob-driver`
pub mod error;

/// Option, listing and attribute types shared by all drivers
pub mod types;

/// Types and helpers for I/O
pub mod io;

/// Driver configuration
pub mod config;

pub mod driver;

pub mod escape;

pub mod azblob;

use self::config::loader::ConfigLoader;
pub use self::config::Config;
pub use self::driver::{Driver, Reader, Writer};

/// Create a config loader
pub fn from_env() -> ConfigLoader {
    ConfigLoader::default()
}
