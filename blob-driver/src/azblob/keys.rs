/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Mapping of portable keys and metadata onto names the blob service accepts.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use crate::error::{self, Error};
use crate::escape;

/// Escape a key (or, with `is_prefix`, a listing prefix or delimiter) for use as a blob name.
///
/// Escaped: backslashes, control characters, a trailing `/` of a full key, and the `/` of
/// every `../`.
pub(crate) fn escape_key(key: &str, is_prefix: bool) -> Cow<'_, str> {
    escape::hex_escape(key, |r, i| {
        let c = r[i];
        match c {
            '\\' => true,
            c if u32::from(c) < 32 || u32::from(c) == 127 => true,
            '/' if !is_prefix && i == r.len() - 1 => true,
            '/' if i > 1 && r[i - 1] == '.' && r[i - 2] == '.' => true,
            _ => false,
        }
    })
}

/// Reverse [`escape_key`].
pub(crate) fn unescape_key(name: &str) -> Cow<'_, str> {
    escape::hex_unescape(name)
}

/// Escape metadata for storage.
///
/// Keys become identifiers: anything other than ASCII letters, digits and `_`, as well as a
/// leading digit, is hex escaped. Values are percent escaped. Metadata names are case
/// insensitive on the service, so two keys that escape to the same name ignoring case are
/// rejected.
pub(crate) fn escape_metadata(
    metadata: &HashMap<String, String>,
) -> Result<HashMap<String, String>, Error> {
    let mut escaped = HashMap::with_capacity(metadata.len());
    let mut seen = HashSet::with_capacity(metadata.len());
    for (key, value) in metadata {
        let name = escape_metadata_key(key);
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(error::invalid_argument(format!(
                "duplicate keys after escaping: {key:?} => {name:?}"
            )));
        }
        escaped.insert(name.into_owned(), escape::url_escape(value).into_owned());
    }
    Ok(escaped)
}

/// Reverse [`escape_metadata`].
pub(crate) fn unescape_metadata(metadata: &HashMap<String, String>) -> HashMap<String, String> {
    metadata
        .iter()
        .map(|(k, v)| {
            (
                escape::hex_unescape(k).into_owned(),
                escape::url_unescape(v).into_owned(),
            )
        })
        .collect()
}

fn escape_metadata_key(key: &str) -> Cow<'_, str> {
    escape::hex_escape(key, |r, i| {
        let c = r[i];
        if i == 0 && c.is_ascii_digit() {
            return true;
        }
        !(c.is_ascii_alphanumeric() || c == '_')
    })
}
