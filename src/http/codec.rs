//! Protocol text encoding and decoding.
//!
//! Protocol text (request lines, headers, error documents) uses the fixed
//! single-byte ISO-8859-1 character set. Because every byte decodes on its
//! own, a request split at arbitrary byte boundaries still accumulates to
//! the same text. Request URIs are percent-decoded separately as UTF-8.

use std::time::SystemTime;

use percent_encoding::percent_decode_str;

use crate::http::error::ServerError;

/// Decodes ISO-8859-1 bytes into text.
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encodes text as ISO-8859-1. Code points outside the Latin-1 range are
/// replaced with `?`.
pub fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) <= 0xff { c as u8 } else { b'?' })
        .collect()
}

/// Decodes a form-urlencoded request URI: `+` means space, `%XX` escapes
/// are resolved, and the resulting bytes must be valid UTF-8.
pub fn url_decode(s: &str) -> Result<String, ServerError> {
    let unplussed = s.replace('+', " ");
    percent_decode_str(&unplussed)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ServerError::bad_request())
}

/// Formats a timestamp as an RFC 1123 HTTP date.
pub fn format_date(time: SystemTime) -> String {
    httpdate::fmt_http_date(time)
}
