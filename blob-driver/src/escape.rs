/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Reversible escaping of keys and metadata for backends with restricted character sets.
//!
//! Characters a backend cannot store are replaced with a marker of the form
//! `__0x<lowercase hex code point>__`, e.g. `\` becomes `__0x5c__`. Any `_` that would itself
//! start a marker (`__0x`) is escaped as well, so that [`hex_unescape`] is an exact inverse of
//! [`hex_escape`] for every input and every escape predicate.

use std::borrow::Cow;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

const MARKER_PREFIX: [char; 4] = ['_', '_', '0', 'x'];
const MARKER_SUFFIX: [char; 2] = ['_', '_'];

/// Characters left alone by [`url_escape`], matching a URL path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// Replace every character for which `should_escape(chars, index)` returns `true` with its hex
/// marker.
///
/// The predicate sees the whole string as a slice of `char`s so it can make positional
/// decisions (leading digit, trailing `/`, ...).
pub fn hex_escape<F>(s: &str, should_escape: F) -> Cow<'_, str>
where
    F: Fn(&[char], usize) -> bool,
{
    let chars: Vec<char> = s.chars().collect();
    let escape_at = |i: usize| should_escape(&chars, i) || starts_marker(&chars, i);

    if !(0..chars.len()).any(|i| escape_at(i)) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 8);
    for (i, c) in chars.iter().enumerate() {
        if escape_at(i) {
            out.push_str(&format!("__{:#x}__", u32::from(*c)));
        } else {
            out.push(*c);
        }
    }
    Cow::Owned(out)
}

/// Reverse [`hex_escape`].
///
/// Sequences that look like a marker but do not hold a valid code point are left untouched.
pub fn hex_unescape(s: &str) -> Cow<'_, str> {
    if !s.contains("__0x") {
        return Cow::Borrowed(s);
    }

    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        match decode_marker(&chars[i..]) {
            Some((c, consumed)) => {
                out.push(c);
                i += consumed;
            }
            None => {
                out.push(chars[i]);
                i += 1;
            }
        }
    }
    Cow::Owned(out)
}

/// Percent-escape `s` as a URL path segment.
pub fn url_escape(s: &str) -> Cow<'_, str> {
    utf8_percent_encode(s, PATH_SEGMENT).into()
}

/// Reverse [`url_escape`]. Input that does not decode to UTF-8 is returned unchanged.
pub fn url_unescape(s: &str) -> Cow<'_, str> {
    percent_decode_str(s).decode_utf8().unwrap_or(Cow::Borrowed(s))
}

fn starts_marker(chars: &[char], i: usize) -> bool {
    chars[i..].starts_with(&MARKER_PREFIX)
}

// Returns the decoded char and how many input chars the marker spans.
fn decode_marker(chars: &[char]) -> Option<(char, usize)> {
    let rest = chars.strip_prefix(&MARKER_PREFIX)?;
    let digits = rest.iter().take_while(|c| c.is_ascii_hexdigit()).count();
    if digits == 0 || !rest[digits..].starts_with(&MARKER_SUFFIX) {
        return None;
    }
    let hex: String = rest[..digits].iter().collect();
    let c = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)?;
    Some((c, MARKER_PREFIX.len() + digits + MARKER_SUFFIX.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escape_backslash(chars: &[char], i: usize) -> bool {
        chars[i] == '\\'
    }

    #[test]
    fn test_hex_escape() {
        let tests = [
            ("", ""),
            ("abc", "abc"),
            ("a\\b", "a__0x5c__b"),
            ("\\\\", "__0x5c____0x5c__"),
            ("__0x", "__0x5f___0x"),
            ("a__0xz", "a__0x5f___0xz"),
            ("___", "___"),
        ];

        for (input, expected) in tests {
            assert_eq!(expected, hex_escape(input, escape_backslash), "input {input:?}");
        }
    }

    #[test]
    fn test_hex_escape_borrows_when_unchanged() {
        assert!(matches!(hex_escape("plain/key", escape_backslash), Cow::Borrowed(_)));
        assert!(matches!(hex_unescape("plain/key"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_hex_unescape_ignores_malformed_markers() {
        let tests = [
            ("__0x__", "__0x__"),
            ("__0xzz__", "__0xzz__"),
            ("__0x5c_", "__0x5c_"),
            ("__0xd800__", "__0xd800__"),
            ("__0x+5c__", "__0x+5c__"),
            ("x__0x41__y", "xAy"),
            ("__0x1f600__", "\u{1f600}"),
        ];

        for (input, expected) in tests {
            assert_eq!(expected, hex_unescape(input), "input {input:?}");
        }
    }

    #[test]
    fn test_round_trip_random_strings() {
        let alphabet = ['a', '_', '_', '0', 'x', '\\', '/', '.', '5', 'c', '\u{7f}', 'é'];
        for _ in 0..2000 {
            let len = fastrand::usize(0..16);
            let s: String = (0..len)
                .map(|_| alphabet[fastrand::usize(..alphabet.len())])
                .collect();
            let escaped = hex_escape(&s, |chars, i| chars[i] == '\\' || chars[i] == '5');
            assert_eq!(s, hex_unescape(&escaped), "escaped {escaped:?}");
        }
    }

    #[test]
    fn test_url_escape() {
        assert_eq!("hello%20world%2F%25", url_escape("hello world/%"));
        assert_eq!("a-b_c.d~e", url_escape("a-b_c.d~e"));
        assert_eq!("hello world/%", url_unescape("hello%20world%2F%25"));
        assert_eq!("%ff", url_unescape("%ff"));
    }
}
