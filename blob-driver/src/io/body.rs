/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::{BoxStream, Stream, StreamExt};

/// A stream of bytes flowing to or from a backend.
///
/// Nothing is pulled from the underlying source until the body is polled, so a body that is
/// dropped unread never touches the network.
pub struct ByteBody {
    inner: RawBody,
}

enum RawBody {
    /// Nothing left to yield
    Empty,
    /// In-memory buffer, yielded as a single chunk
    Buf(Bytes),
    /// Any other stream of chunks
    Dyn(BoxStream<'static, std::io::Result<Bytes>>),
}

impl ByteBody {
    /// Create a body that yields no data.
    pub fn empty() -> Self {
        Self {
            inner: RawBody::Empty,
        }
    }

    /// Create a body from a stream of chunks.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: RawBody::Dyn(stream.boxed()),
        }
    }

    /// Pull the next chunk of data, `None` once the body is exhausted.
    pub async fn next(&mut self) -> Option<std::io::Result<Bytes>> {
        StreamExt::next(self).await
    }

    /// Read the remainder of the body into a single buffer.
    pub async fn collect(mut self) -> std::io::Result<Bytes> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.next().await {
            chunks.push(chunk?);
        }
        Ok(match chunks.len() {
            0 => Bytes::new(),
            1 => chunks.swap_remove(0),
            _ => Bytes::from(chunks.concat()),
        })
    }
}

impl Stream for ByteBody {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut self.inner;
        match this {
            RawBody::Empty => Poll::Ready(None),
            RawBody::Buf(_) => match std::mem::replace(this, RawBody::Empty) {
                RawBody::Buf(bytes) if !bytes.is_empty() => Poll::Ready(Some(Ok(bytes))),
                _ => Poll::Ready(None),
            },
            RawBody::Dyn(stream) => stream.as_mut().poll_next(cx),
        }
    }
}

impl Default for ByteBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for ByteBody {
    fn from(value: Bytes) -> Self {
        Self {
            inner: RawBody::Buf(value),
        }
    }
}

impl From<Vec<u8>> for ByteBody {
    fn from(value: Vec<u8>) -> Self {
        Self::from(Bytes::from(value))
    }
}

impl From<&'static str> for ByteBody {
    fn from(slice: &'static str) -> Self {
        Self::from(Bytes::from_static(slice.as_bytes()))
    }
}

impl fmt::Debug for ByteBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.inner {
            RawBody::Empty => "Empty",
            RawBody::Buf(_) => "Buf",
            RawBody::Dyn(_) => "Dyn(dyn Stream)",
        };
        f.debug_struct("ByteBody").field("inner", &kind).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buf_body_yields_once() {
        let mut body = ByteBody::from("hello");
        assert_eq!("hello", body.next().await.unwrap().unwrap());
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_buf_yields_nothing() {
        let mut body = ByteBody::from(Bytes::new());
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn test_collect_stream() {
        let chunks = vec![Ok(Bytes::from("ab")), Ok(Bytes::from("cd"))];
        let body = ByteBody::from_stream(futures_util::stream::iter(chunks));
        assert_eq!("abcd", body.collect().await.unwrap());
    }
}
