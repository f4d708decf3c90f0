/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

/// How a service client authenticates with the storage account.
///
/// Selected from the environment in order of precedence: a shared key when both
/// `AZURE_STORAGE_ACCOUNT` and `AZURE_STORAGE_KEY` are set, then a SAS token
/// (`AZURE_STORAGE_SAS_TOKEN`, carried by the service URL), then a connection string
/// (`AZURE_STORAGE_CONNECTION_STRING`), and finally the ambient identity of the process.
#[derive(Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Credential {
    /// Account name and base64 account key.
    SharedKey {
        /// Storage account name
        account_name: String,
        /// Base64 encoded account key
        account_key: String,
    },
    /// No credential beyond the SAS token embedded in the service URL.
    SasToken,
    /// A full connection string.
    ConnectionString(String),
    /// Whatever identity the runtime environment provides.
    Identity,
}

impl Credential {
    /// Select a credential from the `AZURE_STORAGE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let credential = match (
            var("AZURE_STORAGE_ACCOUNT"),
            var("AZURE_STORAGE_KEY"),
            var("AZURE_STORAGE_SAS_TOKEN"),
            var("AZURE_STORAGE_CONNECTION_STRING"),
        ) {
            (Some(account_name), Some(account_key), _, _) => Credential::SharedKey {
                account_name,
                account_key,
            },
            (_, _, Some(_), _) => Credential::SasToken,
            (_, _, _, Some(conn)) => Credential::ConnectionString(conn),
            _ => Credential::Identity,
        };
        tracing::debug!(credential = credential.kind(), "selected storage credential");
        credential
    }

    /// Short name of the credential type, safe to log.
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::SharedKey { .. } => "shared-key",
            Credential::SasToken => "sas-token",
            Credential::ConnectionString(_) => "connection-string",
            Credential::Identity => "identity",
        }
    }
}

// Secrets stay out of debug output.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::SharedKey { account_name, .. } => f
                .debug_struct("SharedKey")
                .field("account_name", account_name)
                .field("account_key", &"** redacted **")
                .finish(),
            Credential::ConnectionString(_) => f
                .debug_tuple("ConnectionString")
                .field(&"** redacted **")
                .finish(),
            other => f.write_str(other.kind()),
        }
    }
}
