/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::driver;
use crate::error::{self, Error, ErrorKind};
use crate::io::pipe::{self, PipeReader, PipeWriter};
use crate::io::ByteBody;

use super::client::ContainerClient;
use super::service_error::service_error;
use super::native::UploadStreamOptions;

/// Streaming writer for a single blob.
///
/// The upload runs in a background task fed through a pipe. The task is started by the first
/// non-empty write, or by [`close`](driver::Writer::close) for a blob with no content.
/// Dropping the writer without closing it cancels the upload.
#[derive(Debug)]
pub struct Writer<C> {
    client: Arc<C>,
    name: String,
    opts: Option<UploadStreamOptions>,
    cancel: CancellationToken,
    pipe: Option<PipeWriter>,
    done: Option<oneshot::Receiver<Result<(), Error>>>,
    closed: bool,
}

impl<C: ContainerClient> Writer<C> {
    pub(crate) fn new(
        client: Arc<C>,
        name: String,
        opts: UploadStreamOptions,
        cancel: &CancellationToken,
    ) -> Self {
        Self {
            client,
            name,
            opts: Some(opts),
            cancel: cancel.child_token(),
            pipe: None,
            done: None,
            closed: false,
        }
    }

    /// Start the background upload of `body`, an empty blob when `None`.
    fn open(&mut self, body: Option<PipeReader>) {
        let (done_tx, done_rx) = oneshot::channel();
        let client = self.client.clone();
        let name = self.name.clone();
        let opts = self.opts.take().unwrap_or_default();
        let cancel = self.cancel.clone();
        let closer = body.as_ref().map(PipeReader::closer);
        let body = body.map_or_else(ByteBody::empty, ByteBody::from_stream);

        let span = tracing::debug_span!("upload-stream", blob = %name);
        tokio::spawn(
            async move {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(error::canceled()),
                    res = client.upload_stream(&name, body, &opts) => res.map(|_| ()).map_err(service_error),
                };
                let result = match result {
                    Ok(()) => {
                        tracing::debug!("upload committed");
                        Ok(())
                    }
                    Err(err) => {
                        tracing::debug!("upload failed: {err:?}");
                        match closer {
                            Some(closer) => Err(closer.close_with_error(err)),
                            None => Err(err),
                        }
                    }
                };
                // the writer may have been dropped already
                let _ = done_tx.send(result);
            }
            .instrument(span),
        );
        self.done = Some(done_rx);
    }
}

#[async_trait]
impl<C: ContainerClient> driver::Writer for Writer<C> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pipe.is_none() {
            let (writer, reader) = pipe::pipe();
            self.open(Some(reader));
            self.pipe = Some(writer);
        }
        match &self.pipe {
            Some(pipe) => pipe.write(Bytes::copy_from_slice(buf)).await,
            None => Err(error::from_kind(ErrorKind::Unknown)("upload pipe missing")),
        }
    }

    async fn close(mut self) -> Result<(), Error> {
        match self.pipe.take() {
            Some(pipe) => pipe.close(),
            None => self.open(None),
        }
        let result = match self.done.take() {
            Some(done) => done.await.unwrap_or_else(|_| {
                Err(Error::new(
                    ErrorKind::Unknown,
                    "upload task ended without reporting a result",
                ))
            }),
            None => Err(Error::new(ErrorKind::Unknown, "upload was never started")),
        };
        self.closed = true;
        result
    }
}

impl<C> Drop for Writer<C> {
    fn drop(&mut self) {
        if !self.closed {
            self.cancel.cancel();
        }
    }
}
