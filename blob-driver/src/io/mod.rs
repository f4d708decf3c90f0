/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/// Streaming body type
mod body;
pub(crate) mod pipe;

// re-exports
pub use self::body::ByteBody;
