/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::OnceLock;
use std::time::Duration;

use crate::config::{Builder, Credential, ServiceUrl, ServiceUrlOptions};
use crate::error::Error;
use crate::Config;

/// Connection settings derived from the process environment.
#[derive(Debug, Clone)]
pub struct Environment {
    service_url_options: ServiceUrlOptions,
    credential: Credential,
}

static GLOBAL: OnceLock<Environment> = OnceLock::new();

impl Environment {
    /// Read the environment now.
    pub fn from_env() -> Self {
        Self::new(ServiceUrlOptions::from_env(), Credential::from_env())
    }

    /// Settings assembled by hand.
    pub fn new(service_url_options: ServiceUrlOptions, credential: Credential) -> Self {
        Self {
            service_url_options,
            credential,
        }
    }

    /// The process-wide settings, read from the environment on first use and never again.
    pub fn global() -> &'static Environment {
        GLOBAL.get_or_init(|| {
            tracing::debug!("reading storage settings from the environment");
            Self::from_env()
        })
    }

    /// Options for building the service URL.
    pub fn service_url_options(&self) -> &ServiceUrlOptions {
        &self.service_url_options
    }

    /// The selected credential.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Build the service URL, applying per-bucket `overrides` first.
    ///
    /// See [`ServiceUrlOptions::with_overrides`] for the accepted keys.
    pub fn service_url<I, K, V>(&self, overrides: I) -> Result<ServiceUrl, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let opts = self.service_url_options.with_overrides(overrides)?;
        ServiceUrl::new(&opts)
    }
}

/// Load driver [`Config`] from the environment.
#[derive(Default, Debug)]
pub struct ConfigLoader {
    builder: Builder,
}

impl ConfigLoader {
    /// Size of each block a writer uploads.
    ///
    /// Default is 8 MiB.
    pub fn upload_block_size(mut self, size: usize) -> Self {
        self.builder = self.builder.upload_block_size(size);
        self
    }

    /// Number of blocks a writer may keep in flight.
    ///
    /// Default is 5.
    pub fn upload_buffers(mut self, buffers: usize) -> Self {
        self.builder = self.builder.upload_buffers(buffers);
        self
    }

    /// Delay between copy status polls.
    pub fn copy_poll_interval(mut self, interval: Duration) -> Self {
        self.builder = self.builder.copy_poll_interval(interval);
        self
    }

    /// Load the default configuration
    ///
    /// Returns the configuration together with the process-wide [`Environment`] used to
    /// construct service clients. If fields have been overridden during builder construction,
    /// the override values will be used.
    pub fn load(self) -> (Config, &'static Environment) {
        (self.builder.build(), Environment::global())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_is_initialized_once() {
        let first = Environment::global() as *const Environment;
        let second = Environment::global() as *const Environment;
        assert_eq!(first, second);
    }

    #[test]
    fn test_service_url_with_overrides() {
        let env = Environment::new(
            ServiceUrlOptions {
                account_name: "acct".into(),
                ..Default::default()
            },
            Credential::Identity,
        );
        let url = env.service_url([("domain", "example.org")]).unwrap();
        assert_eq!("https://acct.example.org", url.as_str());
        let url = env.service_url(std::iter::empty::<(&str, &str)>()).unwrap();
        assert_eq!("https://acct.blob.core.windows.net", url.as_str());
    }

    #[test]
    fn test_loader_applies_overrides() {
        let (config, _) = ConfigLoader::default()
            .upload_buffers(2)
            .copy_poll_interval(Duration::from_millis(10))
            .load();
        assert_eq!(2, config.upload_buffers());
        assert_eq!(Duration::from_millis(10), config.copy_poll_interval());
    }
}
