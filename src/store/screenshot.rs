//! Screenshot payloads arrive as `data:image/...;base64,` URLs from the
//! browser; the store keeps the decoded bytes as a companion PNG.

use base64::Engine;

use crate::errors::StoreError;

/// Decode a data-URL (or bare base64) screenshot into raw image bytes.
pub fn decode_data_url(payload: &str) -> Result<Vec<u8>, StoreError> {
    let trimmed = payload.trim();
    let encoded = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest.split_once(',').ok_or_else(|| {
                StoreError::InvalidScreenshot("data URL has no ',' separator".to_string())
            })?;
            if !header.starts_with("image/") || !header.ends_with(";base64") {
                return Err(StoreError::InvalidScreenshot(format!(
                    "unsupported data URL header '{}'",
                    header
                )));
            }
            data
        }
        None => trimmed,
    };

    let cleaned = encoded.replace(['\n', '\r', ' '], "");
    if cleaned.is_empty() {
        return Err(StoreError::InvalidScreenshot("empty image data".to_string()));
    }

    base64::engine::general_purpose::STANDARD
        .decode(&cleaned)
        .map_err(|e| StoreError::InvalidScreenshot(format!("base64 decode error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn encode(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn test_decode_png_data_url() {
        let url = format!("data:image/png;base64,{}", encode(&PNG_MAGIC));
        assert_eq!(decode_data_url(&url).unwrap(), PNG_MAGIC);
    }

    #[test]
    fn test_decode_bare_base64() {
        assert_eq!(decode_data_url(&encode(b"raw")).unwrap(), b"raw");
    }

    #[test]
    fn test_decode_tolerates_line_breaks() {
        let encoded = encode(&PNG_MAGIC);
        let wrapped = format!("data:image/png;base64,{}\n{}", &encoded[..4], &encoded[4..]);
        assert_eq!(decode_data_url(&wrapped).unwrap(), PNG_MAGIC);
    }

    #[test]
    fn test_rejects_non_image_data_url() {
        let err = decode_data_url("data:text/plain;base64,aGk=").unwrap_err();
        assert!(matches!(err, StoreError::InvalidScreenshot(_)));
    }

    #[test]
    fn test_rejects_invalid_base64() {
        let err = decode_data_url("data:image/png;base64,@@@").unwrap_err();
        assert!(err.to_string().contains("base64"));
    }

    #[test]
    fn test_rejects_empty_payload() {
        assert!(decode_data_url("data:image/png;base64,").is_err());
    }
}
