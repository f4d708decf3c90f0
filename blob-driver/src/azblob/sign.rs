/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use http::Method;

use crate::error::{self, Error};

use super::native::SasPermissions;

/// Permissions a signed URL needs for `method`.
///
/// GET may read, PUT may create and write, DELETE may delete. Other methods cannot be signed.
pub(crate) fn permissions_for(method: &Method) -> Result<SasPermissions, Error> {
    let perms = match method.as_str() {
        "GET" => SasPermissions {
            read: true,
            ..Default::default()
        },
        "PUT" => SasPermissions {
            create: true,
            write: true,
            ..Default::default()
        },
        "DELETE" => SasPermissions {
            delete: true,
            ..Default::default()
        },
        _ => {
            return Err(error::invalid_argument(format!(
                "unsupported method {method} for signed URL"
            )))
        }
    };
    Ok(perms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_permissions_for() {
        assert_eq!("r", permissions_for(&Method::GET).unwrap().to_permission_string());
        assert_eq!("cw", permissions_for(&Method::PUT).unwrap().to_permission_string());
        assert_eq!("d", permissions_for(&Method::DELETE).unwrap().to_permission_string());
        for method in [Method::PATCH, Method::POST, Method::HEAD] {
            let err = permissions_for(&method).unwrap_err();
            assert_eq!(ErrorKind::InvalidArgument, err.kind());
        }
    }
}
