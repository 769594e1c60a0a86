//! RFC 3986 percent-encoding as required by OAuth 1.0a.
//!
//! Only the unreserved set (`A-Z a-z 0-9 - . _ ~`) passes through; every
//! other byte becomes `%XX` with uppercase hex. Generic URL encoders leave
//! `! * ' ( )` alone, which breaks provider-side signature verification.

use std::string::FromUtf8Error;

/// Percent-encode a UTF-8 string byte by byte.
pub fn percent_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}

/// Percent-encode arbitrary bytes.
pub fn percent_encode_bytes(input: &[u8]) -> String {
    urlencoding::encode_binary(input).into_owned()
}

/// Inverse of [`percent_encode`]. Fails if the decoded bytes are not UTF-8.
pub fn percent_decode(input: &str) -> Result<String, FromUtf8Error> {
    urlencoding::decode(input).map(|decoded| decoded.into_owned())
}
