/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::HashSet;
use std::fmt;

use crate::error::{self, Error};

const DEFAULT_STORAGE_DOMAIN: &str = "blob.core.windows.net";

/// Inputs for building a [`ServiceUrl`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceUrlOptions {
    /// Storage account name. Required.
    pub account_name: String,
    /// Shared access signature appended to the URL as its query string.
    pub sas_token: Option<String>,
    /// Storage domain, `blob.core.windows.net` when empty.
    pub storage_domain: Option<String>,
    /// `https` (the default) or `http`.
    pub protocol: Option<String>,
    /// The domain is a CDN endpoint that already identifies the account.
    pub is_cdn: bool,
    /// The domain is a local emulator that expects the account as the first path segment.
    pub is_local_emulator: bool,
}

impl ServiceUrlOptions {
    /// Read options from the `AZURE_STORAGE_*` environment variables.
    ///
    /// Unset or empty variables leave the field at its default; unparseable booleans read as
    /// `false`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());
        Self {
            account_name: var("AZURE_STORAGE_ACCOUNT").unwrap_or_default(),
            sas_token: var("AZURE_STORAGE_SAS_TOKEN"),
            storage_domain: var("AZURE_STORAGE_DOMAIN"),
            protocol: var("AZURE_STORAGE_PROTOCOL"),
            is_cdn: var("AZURE_STORAGE_IS_CDN")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(false),
            is_local_emulator: var("AZURE_STORAGE_IS_LOCAL_EMULATOR")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(false),
        }
    }

    /// Return a copy with per-bucket overrides applied.
    ///
    /// Recognized keys are `domain`, `protocol`, `cdn`, `localemu` and `storage_account`. Unknown
    /// keys, repeated keys and unparseable booleans are rejected.
    pub fn with_overrides<I, K, V>(&self, overrides: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut out = self.clone();
        let mut seen = HashSet::new();
        for (key, value) in overrides {
            let (key, value) = (key.as_ref(), value.as_ref());
            if !seen.insert(key.to_owned()) {
                return Err(error::invalid_argument(format!(
                    "multiple values of {key} not allowed"
                )));
            }
            match key {
                "domain" => out.storage_domain = Some(value.to_owned()),
                "protocol" => out.protocol = Some(value.to_owned()),
                "cdn" => out.is_cdn = parse_bool_override(key, value)?,
                "localemu" => out.is_local_emulator = parse_bool_override(key, value)?,
                "storage_account" => out.account_name = value.to_owned(),
                _ => {
                    return Err(error::invalid_argument(format!(
                        "unknown query parameter {key:?}"
                    )))
                }
            }
        }
        Ok(out)
    }
}

/// Address of a blob service account, possibly carrying a SAS query string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceUrl(String);

impl ServiceUrl {
    /// Build the service URL described by `opts`.
    ///
    /// The URL is `<protocol>://<account>.<domain>`, except that CDN domains drop the account
    /// and local emulator domains (or domains starting with `localhost` or `127.0.0.1`) move it
    /// into the path: `http://127.0.0.1:10000/myaccount`.
    pub fn new(opts: &ServiceUrlOptions) -> Result<Self, Error> {
        let account = opts.account_name.as_str();
        if account.is_empty() {
            return Err(error::invalid_argument("account name is required"));
        }
        let domain = match opts.storage_domain.as_deref() {
            Some(domain) if !domain.is_empty() => domain,
            _ => DEFAULT_STORAGE_DOMAIN,
        };
        let protocol = match opts.protocol.as_deref() {
            None | Some("") => "https",
            Some(protocol @ ("http" | "https")) => protocol,
            Some(other) => {
                return Err(error::invalid_argument(format!("invalid protocol {other:?}")))
            }
        };

        let mut url = if domain.starts_with("127.0.0.1")
            || domain.starts_with("localhost")
            || opts.is_local_emulator
        {
            format!("{protocol}://{domain}/{account}")
        } else if opts.is_cdn {
            format!("{protocol}://{domain}")
        } else {
            format!("{protocol}://{account}.{domain}")
        };
        if let Some(sas) = opts.sas_token.as_deref().filter(|sas| !sas.is_empty()) {
            url.push('?');
            url.push_str(sas);
        }
        tracing::debug!(service_url = %url, "constructed service URL");
        Ok(Self(url))
    }

    /// The full URL, including any SAS query string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The URL without its query string.
    pub fn base(&self) -> &str {
        self.split().0
    }

    /// The SAS query string, if any.
    pub fn sas(&self) -> Option<&str> {
        self.split().1
    }

    /// URL of a resource below the service, keeping the SAS query string at the end.
    pub fn join(&self, path: &str) -> String {
        let (base, sas) = self.split();
        let path = path.trim_start_matches('/');
        match sas {
            Some(sas) => format!("{base}/{path}?{sas}"),
            None => format!("{base}/{path}"),
        }
    }

    fn split(&self) -> (&str, Option<&str>) {
        match self.0.split_once('?') {
            Some((base, sas)) => (base, Some(sas)),
            None => (&self.0, None),
        }
    }
}

impl fmt::Display for ServiceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ServiceUrl> for String {
    fn from(value: ServiceUrl) -> Self {
        value.0
    }
}

/// Boolean spellings accepted in environment variables and overrides.
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn parse_bool_override(key: &str, value: &str) -> Result<bool, Error> {
    parse_bool(value).ok_or_else(|| {
        error::invalid_argument(format!("invalid boolean {value:?} for {key}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn opts(account: &str) -> ServiceUrlOptions {
        ServiceUrlOptions {
            account_name: account.to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn test_service_url_forms() {
        let tests = [
            (opts("myaccount"), "https://myaccount.blob.core.windows.net"),
            (
                ServiceUrlOptions {
                    protocol: Some("http".into()),
                    storage_domain: Some("example.com".into()),
                    ..opts("myaccount")
                },
                "http://myaccount.example.com",
            ),
            (
                ServiceUrlOptions {
                    storage_domain: Some("127.0.0.1:10000".into()),
                    protocol: Some("http".into()),
                    ..opts("devstoreaccount1")
                },
                "http://127.0.0.1:10000/devstoreaccount1",
            ),
            (
                ServiceUrlOptions {
                    storage_domain: Some("azurite:10000".into()),
                    is_local_emulator: true,
                    ..opts("acct")
                },
                "https://azurite:10000/acct",
            ),
            (
                ServiceUrlOptions {
                    storage_domain: Some("cdn.example.net".into()),
                    is_cdn: true,
                    ..opts("acct")
                },
                "https://cdn.example.net",
            ),
            (
                ServiceUrlOptions {
                    sas_token: Some("sv=2020&sig=abc".into()),
                    ..opts("acct")
                },
                "https://acct.blob.core.windows.net?sv=2020&sig=abc",
            ),
        ];

        for (input, expected) in tests {
            assert_eq!(expected, ServiceUrl::new(&input).unwrap().as_str());
        }
    }

    #[test]
    fn test_service_url_rejects_bad_input() {
        let err = ServiceUrl::new(&opts("")).unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());

        let bad_protocol = ServiceUrlOptions {
            protocol: Some("ftp".into()),
            ..opts("acct")
        };
        let err = ServiceUrl::new(&bad_protocol).unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
    }

    #[test]
    fn test_join_keeps_sas_last() {
        let url = ServiceUrl::new(&ServiceUrlOptions {
            sas_token: Some("sig=x".into()),
            ..opts("acct")
        })
        .unwrap();
        assert_eq!(
            "https://acct.blob.core.windows.net/c/k?sig=x",
            url.join("/c/k")
        );
        assert_eq!("https://acct.blob.core.windows.net", url.base());
        assert_eq!(Some("sig=x"), url.sas());
    }

    #[test]
    fn test_from_lookup() {
        let env = |name: &str| match name {
            "AZURE_STORAGE_ACCOUNT" => Some("acct".to_owned()),
            "AZURE_STORAGE_IS_CDN" => Some("True".to_owned()),
            "AZURE_STORAGE_IS_LOCAL_EMULATOR" => Some("maybe".to_owned()),
            "AZURE_STORAGE_PROTOCOL" => Some(String::new()),
            _ => None,
        };
        let opts = ServiceUrlOptions::from_lookup(env);
        assert_eq!("acct", opts.account_name);
        assert!(opts.is_cdn);
        assert!(!opts.is_local_emulator);
        assert_eq!(None, opts.protocol);
    }

    #[test]
    fn test_with_overrides() {
        let base = opts("acct");
        let out = base
            .with_overrides([
                ("domain", "localhost:10000"),
                ("protocol", "http"),
                ("localemu", "1"),
                ("storage_account", "other"),
            ])
            .unwrap();
        assert_eq!(Some("localhost:10000".to_owned()), out.storage_domain);
        assert!(out.is_local_emulator);
        assert_eq!("other", out.account_name);
        assert_eq!(
            "http://localhost:10000/other",
            ServiceUrl::new(&out).unwrap().as_str()
        );

        let err = base.with_overrides([("region", "x")]).unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
        let err = base.with_overrides([("cdn", "yes")]).unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
        let err = base
            .with_overrides([("domain", "a"), ("domain", "b")])
            .unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
    }
}
