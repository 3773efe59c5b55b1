//! Line codec: raw bytes in, trimmed text out; text in, terminated bytes out.
//!
//! Framing (finding the `\n`, bounding the length) belongs to the
//! transport. By the time bytes reach [`decode_line`] the terminator is
//! already gone.

use crate::ProtocolError;

/// Decodes one received line into text with surrounding whitespace removed.
///
/// # Errors
/// Returns [`ProtocolError::InvalidUtf8`] if the bytes are not UTF-8.
pub fn decode_line(raw: Vec<u8>) -> Result<String, ProtocolError> {
    let text = String::from_utf8(raw)?;
    let trimmed = text.trim();
    if trimmed.len() == text.len() {
        Ok(text)
    } else {
        Ok(trimmed.to_owned())
    }
}

/// Encodes `text` as one outbound line, appending the `\n` terminator.
pub fn encode_line(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + 1);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(b'\n');
    bytes
}
