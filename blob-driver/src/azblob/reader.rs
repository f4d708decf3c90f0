/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use async_trait::async_trait;
use bytes::Bytes;

use crate::driver;
use crate::error::Error;
use crate::io::ByteBody;
use crate::types::ReaderAttributes;

use super::service_error::classify;
use super::native::{Download, DownloadResponse};

/// Streaming reader over a blob range.
#[derive(Debug)]
pub struct Reader {
    body: ByteBody,
    attributes: ReaderAttributes,
    response: DownloadResponse,
}

impl Reader {
    /// Wrap a download. With `empty` set the body is dropped unread and the reader yields no
    /// data.
    pub(crate) fn new(download: Download, empty: bool) -> Self {
        let Download { response, body } = download;
        let attributes = ReaderAttributes {
            content_type: response.content_type.clone(),
            mod_time: response.last_modified,
            size: blob_size(response.content_length, response.content_range.as_deref()),
        };
        let body = if empty { ByteBody::empty() } else { body };
        Self {
            body,
            attributes,
            response,
        }
    }
}

#[async_trait]
impl driver::Reader for Reader {
    type Native = DownloadResponse;

    async fn next(&mut self) -> Option<Result<Bytes, Error>> {
        let chunk = self.body.next().await?;
        Some(chunk.map_err(|err| {
            let kind = classify(&err);
            Error::new(kind, err)
        }))
    }

    fn attributes(&self) -> &ReaderAttributes {
        &self.attributes
    }

    fn native(&self) -> &DownloadResponse {
        &self.response
    }

    async fn close(self) -> Result<(), Error> {
        Ok(())
    }
}

/// Size of the whole blob behind a (possibly ranged) download response.
///
/// A `Content-Range` of the form `bytes <start>-<end>/<total>` gives the total size. When it is
/// absent, or its total is not a number (`*`), the response length is used.
pub(crate) fn blob_size(content_length: u64, content_range: Option<&str>) -> u64 {
    content_range
        .and_then(|range| {
            let mut parts = range.split('/');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(_), Some(total), None) => total.trim().parse().ok(),
                _ => None,
            }
        })
        .unwrap_or(content_length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_size() {
        let tests = [
            (10, None, 10),
            (10, Some("bytes 0-9/1234"), 1234),
            (0, Some("bytes 5-4/5"), 5),
            (10, Some("bytes 0-9/*"), 10),
            (10, Some("bytes 0-9"), 10),
            (10, Some("bytes 0-9/12/13"), 10),
            (10, Some(""), 10),
        ];

        for (content_length, content_range, expected) in tests {
            assert_eq!(
                expected,
                blob_size(content_length, content_range),
                "range {content_range:?}"
            );
        }
    }
}
