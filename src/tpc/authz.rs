//! Credential token handed to the local open call.
//!
//! The client's `Authorization` header travels to storage as the opaque
//! `authz=<value>` token with URL-sensitive characters escaped.

use percent_encoding::{utf8_percent_encode, AsciiSet};

/// Space, brackets, colon and slash. Every other ASCII byte passes through.
const AUTHZ: &AsciiSet = &AsciiSet::EMPTY.add(b' ').add(b'[').add(b']').add(b':').add(b'/');

/// Escape `value` for use inside the credential token.
pub fn quote(value: &str) -> String {
    utf8_percent_encode(value, AUTHZ).to_string()
}

/// `authz=<quoted>` for the given `Authorization` header value.
pub fn credential(authorization: &str) -> String {
    format!("authz={}", quote(authorization))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_only_reserved_characters() {
        assert_eq!(quote("Bearer abc"), "Bearer%20abc");
        assert_eq!(quote("a[b]c"), "a%5Bb%5Dc");
        assert_eq!(quote("host:1094/path"), "host%3A1094%2Fpath");
    }

    #[test]
    fn leaves_token_characters_alone() {
        assert_eq!(quote("abc.DEF-123_~+=?&%"), "abc.DEF-123_~+=?&%");
    }

    #[test]
    fn control_bytes_pass_through() {
        assert_eq!(quote("a\tb\x7f"), "a\tb\x7f");
        assert_eq!(quote("\t "), "\t%20");
    }

    #[test]
    fn credential_prefix() {
        assert_eq!(credential("Bearer x/y"), "authz=Bearer%20x%2Fy");
    }
}
