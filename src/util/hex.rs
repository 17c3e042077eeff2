//! # Hex Encoding/Decoding Utilities
//!
//! Hex helpers shared by the telegram output views, the diagnostics raw
//! preview and the CLI input parsing.
//!
//! ## Usage
//!
//! ```rust
//! use wmbus_rx::util::hex::{encode_hex, decode_hex, hex_preview};
//!
//! let data = [0x54, 0xCD, 0x2E];
//! assert_eq!(encode_hex(&data), "54cd2e");
//! assert_eq!(decode_hex("54 CD 2E").unwrap(), data);
//! assert_eq!(hex_preview(&data, 2), "54cd");
//! ```

use thiserror::Error;

/// Errors that can occur during hex operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Empty hex string")]
    EmptyString,

    #[error("Hex decoding error: {0}")]
    DecodeError(String),
}

/// Encode bytes to lowercase hex string
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Lowercase hex of at most `max_bytes` leading bytes; 0 means no limit
pub fn hex_preview(data: &[u8], max_bytes: usize) -> String {
    let n = if max_bytes == 0 {
        data.len()
    } else {
        data.len().min(max_bytes)
    };
    hex::encode(&data[..n])
}

/// Decode hex string to bytes
///
/// Accepts both uppercase and lowercase hex characters, an optional `0x`
/// prefix, and embedded whitespace.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    let trimmed = hex_str.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let cleaned: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(HexError::EmptyString);
    }
    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }

    hex::decode(&cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Parse hex string that may contain spaces or other separators
///
/// More lenient than decode_hex, strips all non-hex characters.
pub fn parse_hex_lenient(input: &str) -> Result<Vec<u8>, HexError> {
    let hex_chars: String = input.chars().filter(|c| c.is_ascii_hexdigit()).collect();

    if hex_chars.is_empty() {
        return Err(HexError::EmptyString);
    }
    if hex_chars.len() % 2 != 0 {
        return Err(HexError::OddLength(hex_chars.len()));
    }

    hex::decode(&hex_chars).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Format hex data for compact display (useful for logs)
///
/// Formats data as "54 cd 2e" with spaces between bytes.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_lowercase() {
        assert_eq!(encode_hex(&[0xAB, 0xCD, 0xEF]), "abcdef");
    }

    #[test]
    fn test_decode_with_prefix_and_whitespace() {
        assert_eq!(decode_hex("0x54CD").unwrap(), vec![0x54, 0xCD]);
        assert_eq!(decode_hex(" 54 cd 2e\n").unwrap(), vec![0x54, 0xCD, 0x2E]);
    }

    #[test]
    fn test_preview_bounds() {
        let data = [0x01, 0x02, 0x03];
        assert_eq!(hex_preview(&data, 0), "010203");
        assert_eq!(hex_preview(&data, 2), "0102");
        assert_eq!(hex_preview(&data, 10), "010203");
        assert_eq!(hex_preview(&[], 4), "");
    }

    #[test]
    fn test_parse_lenient() {
        assert_eq!(parse_hex_lenient("54-cd:2e").unwrap(), vec![0x54, 0xCD, 0x2E]);
    }

    #[test]
    fn test_format_compact() {
        assert_eq!(format_hex_compact(&[0x54, 0xCD]), "54 cd");
    }

    #[test]
    fn test_errors() {
        assert_eq!(decode_hex(""), Err(HexError::EmptyString));
        assert_eq!(decode_hex("1"), Err(HexError::OddLength(1)));
        assert!(matches!(decode_hex("GG"), Err(HexError::DecodeError(_))));
        assert_eq!(parse_hex_lenient("zz"), Err(HexError::EmptyString));
    }
}
