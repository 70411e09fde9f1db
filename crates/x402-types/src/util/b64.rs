//! Base64 transport primitive.
//!
//! Encoded payment payloads travel in HTTP headers and JSON bodies as
//! standard-alphabet, padded base64. [`Base64Bytes`] holds such text and
//! converts it to and from the raw JSON bytes it carries.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use std::borrow::Cow;
use std::fmt::Display;

/// Base64 text, held as bytes.
///
/// ```rust
/// use x402_types::util::Base64Bytes;
///
/// let encoded = Base64Bytes::encode(br#"{"x402Version":1}"#);
/// assert_eq!(encoded.to_string(), "eyJ4NDAyVmVyc2lvbiI6MX0=");
/// assert_eq!(encoded.decode_utf8().unwrap(), r#"{"x402Version":1}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes<'a>(pub Cow<'a, [u8]>);

/// Failure to turn base64 text back into UTF-8 text.
#[derive(Debug, thiserror::Error)]
pub enum Base64TextError {
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("utf-8 decode error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Base64Bytes<'_> {
    /// Decodes the base64 text to raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }

    /// Decodes the base64 text and interprets the result as UTF-8.
    pub fn decode_utf8(&self) -> Result<String, Base64TextError> {
        let bytes = self.decode()?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Encodes raw bytes as base64 text.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Base64Bytes<'static> {
        let encoded = b64.encode(input.as_ref());
        Base64Bytes(Cow::Owned(encoded.into_bytes()))
    }

    /// Consumes the wrapper, returning the base64 text.
    pub fn into_string(self) -> String {
        String::from_utf8_lossy(self.0.as_ref()).into_owned()
    }
}

impl AsRef<[u8]> for Base64Bytes<'_> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl<'a> From<&'a [u8]> for Base64Bytes<'a> {
    fn from(slice: &'a [u8]) -> Self {
        Base64Bytes(Cow::Borrowed(slice))
    }
}

impl<'a> From<&'a str> for Base64Bytes<'a> {
    fn from(text: &'a str) -> Self {
        Base64Bytes(Cow::Borrowed(text.as_bytes()))
    }
}

impl Display for Base64Bytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.0.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_non_base64() {
        let text = Base64Bytes::from("not base64!");
        assert!(text.decode().is_err());
    }

    #[test]
    fn test_decode_utf8_rejects_binary() {
        let encoded = Base64Bytes::encode([0xff, 0xfe, 0xfd]);
        let err = encoded.decode_utf8().unwrap_err();
        assert!(matches!(err, Base64TextError::Utf8(_)));
    }

    #[test]
    fn test_into_string_matches_display() {
        let encoded = Base64Bytes::encode(b"hello world");
        assert_eq!(encoded.to_string(), "aGVsbG8gd29ybGQ=");
        assert_eq!(encoded.into_string(), "aGVsbG8gd29ybGQ=");
    }
}
