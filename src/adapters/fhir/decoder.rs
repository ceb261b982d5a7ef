//! Bundle decoding

use crate::domain::{Bundle, FilterError};
use serde_json::Value;

/// Decodes raw report content into a [`Bundle`]
pub trait BundleDecoder: Send + Sync {
    /// Decode one bundle
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Decode`] if the content is not a bundle
    fn decode(&self, bytes: &[u8]) -> Result<Bundle, FilterError>;
}

/// Decoder for JSON-encoded bundles
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBundleDecoder;

impl JsonBundleDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode newline-delimited bundles, skipping blank lines
    ///
    /// # Errors
    ///
    /// Returns the first decode failure, tagged with its line number
    pub fn decode_lines(&self, bytes: &[u8]) -> Result<Vec<Bundle>, FilterError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| FilterError::Decode(format!("content is not UTF-8: {e}")))?;

        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(number, line)| {
                self.decode(line.as_bytes())
                    .map_err(|e| FilterError::Decode(format!("line {}: {e}", number + 1)))
            })
            .collect()
    }
}

impl BundleDecoder for JsonBundleDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Bundle, FilterError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| FilterError::Decode(format!("invalid JSON: {e}")))?;

        match value.get("resourceType").and_then(Value::as_str) {
            Some("Bundle") => {}
            Some(other) => {
                return Err(FilterError::Decode(format!(
                    "expected resourceType 'Bundle', found '{other}'"
                )))
            }
            None => return Err(FilterError::Decode("missing resourceType".to_string())),
        }

        Bundle::new(value).map_err(|e| FilterError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_bundle() {
        let bundle = JsonBundleDecoder::new()
            .decode(br#"{"resourceType":"Bundle","identifier":{"value":"abc"}}"#)
            .unwrap();
        assert_eq!(bundle.identifier(), Some("abc"));
    }

    #[test]
    fn test_decode_rejects_other_resources() {
        let err = JsonBundleDecoder::new()
            .decode(br#"{"resourceType":"Patient"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Patient"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            JsonBundleDecoder::new().decode(b"MSH|^~\\&|"),
            Err(FilterError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_lines() {
        let input = b"{\"resourceType\":\"Bundle\"}\n\n{\"resourceType\":\"Bundle\"}\n";
        let bundles = JsonBundleDecoder::new().decode_lines(input).unwrap();
        assert_eq!(bundles.len(), 2);

        let err = JsonBundleDecoder::new()
            .decode_lines(b"{\"resourceType\":\"Bundle\"}\n[]\n")
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
