/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::time::Duration;

use crate::MEBIBYTE;

/// Process-wide settings read once from the environment
pub mod loader;

/// Account credential selection
pub mod credential;

/// Service endpoint construction
pub mod service_url;

pub use self::credential::Credential;
pub use self::service_url::{ServiceUrl, ServiceUrlOptions};

/// Default size of each block a writer uploads.
pub(crate) const DEFAULT_UPLOAD_BLOCK_SIZE: usize = 8 * MEBIBYTE;

/// Default number of blocks a writer keeps in flight.
pub(crate) const DEFAULT_UPLOAD_BUFFERS: usize = 5;

/// Default delay between copy status polls.
pub(crate) const DEFAULT_COPY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default number of consecutive failed copy status polls tolerated.
pub(crate) const DEFAULT_COPY_POLL_RETRIES: u32 = 3;

/// Configuration for a [`Bucket`](crate::azblob::Bucket)
#[derive(Debug, Clone)]
pub struct Config {
    upload_block_size: usize,
    upload_buffers: usize,
    copy_poll_interval: Duration,
    copy_poll_retries: u32,
}

impl Config {
    /// Create a new `Config` builder
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Size of each block uploaded when a writer does not ask for one.
    pub fn upload_block_size(&self) -> usize {
        self.upload_block_size
    }

    /// Number of blocks uploaded in parallel when a writer does not ask for a number.
    pub fn upload_buffers(&self) -> usize {
        self.upload_buffers
    }

    /// Delay between copy status polls.
    pub fn copy_poll_interval(&self) -> Duration {
        self.copy_poll_interval
    }

    /// Number of consecutive failed status polls after which a copy gives up.
    pub fn copy_poll_retries(&self) -> u32 {
        self.copy_poll_retries
    }
}

impl Default for Config {
    fn default() -> Self {
        Builder::default().build()
    }
}

/// Fluent style builder for [Config]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    upload_block_size: Option<usize>,
    upload_buffers: Option<usize>,
    copy_poll_interval: Option<Duration>,
    copy_poll_retries: Option<u32>,
}

impl Builder {
    /// Size of each block a writer uploads.
    ///
    /// Default is 8 MiB. Zero restores the default.
    pub fn upload_block_size(mut self, size: usize) -> Self {
        self.upload_block_size = Some(size).filter(|size| *size > 0);
        self
    }

    /// Number of blocks a writer may keep in flight.
    ///
    /// Default is 5. Zero restores the default.
    pub fn upload_buffers(mut self, buffers: usize) -> Self {
        self.upload_buffers = Some(buffers).filter(|buffers| *buffers > 0);
        self
    }

    /// Delay between copy status polls. Default is 500 milliseconds.
    pub fn copy_poll_interval(mut self, interval: Duration) -> Self {
        self.copy_poll_interval = Some(interval);
        self
    }

    /// Number of consecutive failed copy status polls tolerated before the copy fails.
    ///
    /// Default is 3, values below 1 are raised to 1. A successful poll resets the count.
    pub fn copy_poll_retries(mut self, retries: u32) -> Self {
        self.copy_poll_retries = Some(retries.max(1));
        self
    }

    /// Consumes the builder and constructs a [`Config`](crate::config::Config)
    pub fn build(self) -> Config {
        Config {
            upload_block_size: self.upload_block_size.unwrap_or(DEFAULT_UPLOAD_BLOCK_SIZE),
            upload_buffers: self.upload_buffers.unwrap_or(DEFAULT_UPLOAD_BUFFERS),
            copy_poll_interval: self
                .copy_poll_interval
                .unwrap_or(DEFAULT_COPY_POLL_INTERVAL),
            copy_poll_retries: self.copy_poll_retries.unwrap_or(DEFAULT_COPY_POLL_RETRIES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(8 * 1024 * 1024, config.upload_block_size());
        assert_eq!(5, config.upload_buffers());
        assert_eq!(Duration::from_millis(500), config.copy_poll_interval());
        assert_eq!(3, config.copy_poll_retries());
    }

    #[test]
    fn test_zero_restores_default() {
        let config = Config::builder()
            .upload_block_size(0)
            .upload_buffers(2)
            .copy_poll_retries(0)
            .build();
        assert_eq!(DEFAULT_UPLOAD_BLOCK_SIZE, config.upload_block_size());
        assert_eq!(2, config.upload_buffers());
        assert_eq!(1, config.copy_poll_retries());
    }
}
