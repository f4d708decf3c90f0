/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{self, Error, ErrorKind};

use super::client::ContainerClient;
use super::service_error::service_error;
use super::native::CopyStatus;

/// How a pending copy is watched.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CopyPolling {
    /// Delay before each status poll
    pub(crate) interval: Duration,
    /// Consecutive failed polls that end the wait
    pub(crate) retries: u32,
}

/// Wait for the copy into `name` to leave [`CopyStatus::Pending`].
///
/// The destination's properties are polled once per interval. A failed poll is retried until
/// `retries` polls in a row have failed, at which point the last error is returned. A copy
/// that ends in any state other than [`CopyStatus::Success`] is an error naming that state.
pub(crate) async fn wait_for_copy<C: ContainerClient>(
    client: &C,
    cancel: &CancellationToken,
    name: &str,
    initial: CopyStatus,
    polling: CopyPolling,
) -> Result<(), Error> {
    let mut status = initial;
    let mut failures = 0;
    while status == CopyStatus::Pending {
        tokio::select! {
            _ = cancel.cancelled() => return Err(error::canceled()),
            _ = tokio::time::sleep(polling.interval) => {}
        }

        let props = tokio::select! {
            _ = cancel.cancelled() => return Err(error::canceled()),
            props = client.get_properties(name) => props,
        };
        match props {
            Ok(props) => {
                failures = 0;
                status = props.copy_status.ok_or_else(|| {
                    Error::new(
                        ErrorKind::Unknown,
                        "copy destination reports no copy status",
                    )
                })?;
                tracing::trace!(blob = name, %status, "polled copy status");
            }
            Err(err) => {
                failures += 1;
                tracing::debug!(blob = name, failures, "copy status poll failed: {err}");
                if failures >= polling.retries {
                    return Err(service_error(err));
                }
            }
        }
    }

    match status {
        CopyStatus::Success => Ok(()),
        other => Err(Error::new(
            ErrorKind::Unknown,
            format!("copy failed with status: {other}"),
        )),
    }
}
