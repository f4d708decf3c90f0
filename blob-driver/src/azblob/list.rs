/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use bytes::Bytes;

use crate::error::{self, Error};
use crate::types::{ListObject, ListPage};

use super::keys::unescape_key;
use super::native::{ListBlobsHierarchyOptions, ListBlobsHierarchyPage, ListItem};

/// Page size used when the caller does not ask for one.
pub(crate) const DEFAULT_PAGE_SIZE: usize = 1000;

/// Native list options for one page.
pub(crate) fn list_options(
    prefix: String,
    page_token: Option<&Bytes>,
    page_size: usize,
) -> Result<ListBlobsHierarchyOptions, Error> {
    let page_size = if page_size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    };
    let max_results = u32::try_from(page_size)
        .map_err(|_| error::invalid_argument(format!("page size {page_size} is too large")))?;
    let marker = page_token
        .filter(|token| !token.is_empty())
        .map(|token| {
            std::str::from_utf8(token)
                .map(str::to_owned)
                .map_err(|_| error::invalid_argument("page token is not a marker of this driver"))
        })
        .transpose()?;
    Ok(ListBlobsHierarchyOptions {
        prefix: Some(prefix),
        marker,
        max_results: Some(max_results),
    })
}

/// Assemble a portable page from a native one.
///
/// Directory entries come first as returned by the service, then blobs. The result is sorted
/// by key when both groups are present since each group is only ordered on its own.
pub(crate) fn into_page(page: ListBlobsHierarchyPage) -> ListPage<ListItem> {
    let ListBlobsHierarchyPage {
        blob_prefixes,
        blob_items,
        next_marker,
    } = page;
    let mixed = !blob_prefixes.is_empty() && !blob_items.is_empty();

    let mut objects = Vec::with_capacity(blob_prefixes.len() + blob_items.len());
    for prefix in blob_prefixes {
        let key = unescape_key(&prefix.name).into_owned();
        objects.push(ListObject::new(
            key,
            None,
            0,
            None,
            true,
            ListItem::Prefix(prefix),
        ));
    }
    for item in blob_items {
        let key = unescape_key(&item.name).into_owned();
        let props = &item.properties;
        let (mod_time, size, md5) = (
            Some(props.last_modified),
            props.content_length,
            props.content_md5.clone(),
        );
        objects.push(ListObject::new(
            key,
            mod_time,
            size,
            md5,
            false,
            ListItem::Blob(item),
        ));
    }
    if mixed {
        objects.sort_by(|a, b| a.key.cmp(&b.key));
    }

    ListPage {
        objects,
        next_page_token: next_marker
            .filter(|marker| !marker.is_empty())
            .map(Bytes::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azblob::native::{BlobItem, BlobItemProperties, BlobPrefix};
    use std::time::SystemTime;

    fn item(name: &str, size: u64) -> BlobItem {
        BlobItem {
            name: name.to_owned(),
            properties: BlobItemProperties {
                content_length: size,
                last_modified: SystemTime::UNIX_EPOCH,
                content_md5: Some(vec![1, 2, 3]),
                etag: None,
                content_type: None,
            },
        }
    }

    fn prefix(name: &str) -> BlobPrefix {
        BlobPrefix {
            name: name.to_owned(),
        }
    }

    #[test]
    fn test_list_options_defaults() {
        let opts = list_options("a/".into(), None, 0).unwrap();
        assert_eq!(Some(1000), opts.max_results);
        assert_eq!(Some("a/".to_owned()), opts.prefix);
        assert_eq!(None, opts.marker);

        let token = Bytes::from_static(b"marker-1");
        let opts = list_options(String::new(), Some(&token), 7).unwrap();
        assert_eq!(Some(7), opts.max_results);
        assert_eq!(Some("marker-1".to_owned()), opts.marker);

        let empty = Bytes::new();
        let opts = list_options(String::new(), Some(&empty), 7).unwrap();
        assert_eq!(None, opts.marker);
    }

    #[test]
    fn test_list_options_rejects_foreign_token() {
        let token = Bytes::from_static(&[0xff, 0xfe, b'm']);
        let err = list_options(String::new(), Some(&token), 0).unwrap_err();
        assert_eq!(crate::error::ErrorKind::InvalidArgument, err.kind());
    }

    #[test]
    fn test_mixed_page_is_sorted() {
        let page = into_page(ListBlobsHierarchyPage {
            blob_prefixes: vec![prefix("b/"), prefix("d/")],
            blob_items: vec![item("a", 1), item("c", 2), item("e", 3)],
            next_marker: Some(String::new()),
        });

        let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(vec!["a", "b/", "c", "d/", "e"], keys);
        assert!(page.next_page_token.is_none());

        let dir = &page.objects[1];
        assert!(dir.is_dir);
        assert_eq!(0, dir.size);
        assert!(dir.mod_time.is_none());
        assert_eq!(&ListItem::Prefix(prefix("b/")), dir.native());

        let blob = &page.objects[2];
        assert!(!blob.is_dir);
        assert_eq!(2, blob.size);
        assert_eq!(Some(vec![1, 2, 3]), blob.md5);
    }

    #[test]
    fn test_single_group_keeps_order_and_unescapes() {
        let page = into_page(ListBlobsHierarchyPage {
            blob_prefixes: vec![],
            blob_items: vec![item("z", 1), item("dir__0x2f__", 2)],
            next_marker: Some("next".into()),
        });
        let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(vec!["z", "dir/"], keys);
        assert_eq!(Some(Bytes::from("next")), page.next_page_token);
    }
}
