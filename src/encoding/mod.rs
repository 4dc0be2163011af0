//! Byte-level input decoding.
//!
//! [`Document::parse_bytes`](crate::Document::parse_bytes) accepts raw bytes
//! in any encoding `encoding_rs` knows. The encoding is chosen in this order:
//!
//! 1. A byte order mark, if present, wins.
//! 2. Otherwise the `encoding="..."` pseudo-attribute of the XML declaration.
//! 3. Otherwise UTF-8.

use encoding_rs::{Encoding, UTF_8};

/// An error that occurs while decoding input bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("encoding error: {message}")]
pub struct EncodingError {
    /// A human-readable description of the failure.
    pub message: String,
}

impl EncodingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Sniffs a byte order mark.
///
/// Returns the encoding's canonical name and the number of BOM bytes to
/// skip. Input without a BOM is reported as UTF-8 with nothing to skip.
///
/// ```
/// use arenaxml::encoding::detect_encoding;
///
/// assert_eq!(detect_encoding(b"\xEF\xBB\xBF<a/>"), ("UTF-8", 3));
/// assert_eq!(detect_encoding(b"\xFF\xFE<\x00"), ("UTF-16LE", 2));
/// assert_eq!(detect_encoding(b"<a/>"), ("UTF-8", 0));
/// ```
#[must_use]
pub fn detect_encoding(bytes: &[u8]) -> (&'static str, usize) {
    match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => (encoding.name(), bom_len),
        None => (UTF_8.name(), 0),
    }
}

/// Decodes `bytes` from the encoding named by `label` into a `String`.
///
/// # Errors
///
/// Returns `EncodingError` if the label is unknown or the bytes are
/// malformed for that encoding.
pub fn transcode(bytes: &[u8], label: &str) -> Result<String, EncodingError> {
    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| EncodingError::new(format!("unsupported encoding: {label}")))?;
    decode_with(encoding, bytes)
}

/// Decodes raw XML bytes to UTF-8, detecting the encoding automatically.
///
/// # Errors
///
/// Returns `EncodingError` if the declared encoding is unknown or the input
/// contains byte sequences that are invalid in the detected encoding.
pub fn decode_to_utf8(bytes: &[u8]) -> Result<String, EncodingError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return decode_with(encoding, &bytes[bom_len..]);
    }

    match declared_encoding(bytes) {
        Some(label) => transcode(bytes, &label),
        None => std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| EncodingError::new(format!("input is not valid UTF-8: {e}"))),
    }
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> Result<String, EncodingError> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(EncodingError::new(format!(
            "malformed byte sequence for encoding {}",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

/// Reads the `encoding` pseudo-attribute from an ASCII-compatible XML
/// declaration at the very start of `bytes`.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(256)];
    if !head.starts_with(b"<?xml") {
        return None;
    }
    let decl = &head[..head.windows(2).position(|w| w == b"?>")?];

    let key = b"encoding";
    let at = decl.windows(key.len()).position(|w| w == key)?;
    let rest = trim_ascii_start(&decl[at + key.len()..]);
    let rest = trim_ascii_start(rest.strip_prefix(b"=")?);

    let (&quote, rest) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let label = &rest[..rest.iter().position(|&b| b == quote)?];
    label
        .is_ascii()
        .then(|| String::from_utf8_lossy(label).into_owned())
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .count();
    &bytes[skip..]
}
