/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! In-process byte pipe connecting a caller's writes to a consuming upload.
//!
//! The pipe holds at most one chunk in flight, so a write completes only once the consumer has
//! made room for it. Either end may close it: closing the write end ends the stream after any
//! buffered chunk is drained, closing the read end with an error fails every pending and future
//! write with that error.

use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use async_channel::{Receiver, Sender};
use bytes::Bytes;
use futures_util::Stream;
use pin_project_lite::pin_project;

use crate::error::{self, Error, ErrorKind};

/// Create a connected pipe.
pub(crate) fn pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = async_channel::bounded(1);
    let shared = Arc::new(Shared::default());
    (
        PipeWriter {
            tx,
            shared: shared.clone(),
        },
        PipeReader { rx, shared },
    )
}

#[derive(Debug, Default)]
struct Shared {
    error: OnceLock<Arc<Error>>,
}

/// Failure of the consuming upload, reported to writes on the pipe.
///
/// The upload's error stays reachable as the [`source`](std::error::Error::source) so the
/// backend error can still be recovered from a failed write.
#[derive(Debug, Clone, thiserror::Error)]
#[error("upload aborted: {0}")]
pub(crate) struct UploadAborted(#[source] Arc<Error>);

impl From<UploadAborted> for Error {
    fn from(value: UploadAborted) -> Self {
        Error::new(value.0.kind(), value)
    }
}

/// Write end of a [`pipe`].
#[derive(Debug)]
pub(crate) struct PipeWriter {
    tx: Sender<Bytes>,
    shared: Arc<Shared>,
}

impl PipeWriter {
    /// Hand `data` to the read end, waiting while a previous chunk is still unread.
    pub(crate) async fn write(&self, data: Bytes) -> Result<usize, Error> {
        let len = data.len();
        self.tx
            .send(data)
            .await
            .map_err(|_| self.shared.closed_error())?;
        Ok(len)
    }

    /// Signal end of stream to the read end.
    pub(crate) fn close(&self) {
        self.tx.close();
    }
}

pin_project! {
    /// Read end of a [`pipe`], consumed as a stream of chunks.
    #[derive(Debug)]
    pub(crate) struct PipeReader {
        #[pin]
        rx: Receiver<Bytes>,
        shared: Arc<Shared>,
    }
}

impl PipeReader {
    /// Get a handle that can abort the pipe after the reader has been moved elsewhere.
    pub(crate) fn closer(&self) -> PipeCloser {
        PipeCloser {
            rx: self.rx.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl Stream for PipeReader {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().rx.poll_next(cx).map(|chunk| chunk.map(Ok))
    }
}

/// Aborts a [`pipe`] from the read side.
#[derive(Debug)]
pub(crate) struct PipeCloser {
    rx: Receiver<Bytes>,
    shared: Arc<Shared>,
}

impl PipeCloser {
    /// Close the pipe, failing pending and future writes with `err`.
    ///
    /// Only the first error recorded is reported to the writer. Returns the error writes will
    /// see.
    pub(crate) fn close_with_error(&self, err: Error) -> Error {
        let recorded = self.shared.error.get_or_init(|| Arc::new(err)).clone();
        self.rx.close();
        UploadAborted(recorded).into()
    }
}

impl Shared {
    fn closed_error(&self) -> Error {
        match self.error.get() {
            Some(err) => UploadAborted(err.clone()).into(),
            None => error::from_kind(ErrorKind::Unknown)("write on closed pipe"),
        }
    }
}
