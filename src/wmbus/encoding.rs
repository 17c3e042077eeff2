//! # 3-out-of-6 Line Code
//!
//! Mode-1 (T1) radios transmit every payload nibble as a 6-bit codeword with
//! exactly three bits set (EN 13757-4, table 10). Two codewords carry one
//! payload byte, so three encoded bytes carry two decoded bytes.
//!
//! The bit stream is MSB-first: the high nibble's codeword occupies the first
//! six bits of a 12-bit group. Trailing bits that do not fill a whole group
//! are ignored by the decoder and zero-padded by the encoder.

use thiserror::Error;

/// Codeword for each nibble value 0x0..=0xF
const THREE_OUT_OF_SIX_TABLE: [u8; 16] = [
    0b010110, 0b001101, 0b001110, 0b001011, 0b011100, 0b011001, 0b011010, 0b010011,
    0b101100, 0b100101, 0b100110, 0b100011, 0b110100, 0b110001, 0b110010, 0b101001,
];

const INVALID_SYMBOL: u8 = 0xFF;

/// Reverse lookup, 64 entries indexed by codeword
const DECODE_TABLE: [u8; 64] = build_decode_table();

const fn build_decode_table() -> [u8; 64] {
    let mut table = [INVALID_SYMBOL; 64];
    let mut nibble = 0;
    while nibble < 16 {
        table[THREE_OUT_OF_SIX_TABLE[nibble] as usize] = nibble as u8;
        nibble += 1;
    }
    table
}

/// Line decoder failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid 3-of-6 symbol 0b{symbol:06b} at decoded byte {offset}")]
    InvalidSymbol { offset: usize, symbol: u8 },
}

/// Number of encoded bytes needed to carry `decoded_len` bytes
pub fn encoded_size(decoded_len: usize) -> usize {
    (3 * decoded_len + 1) / 2
}

/// Number of whole bytes recoverable from `encoded_len` encoded bytes
pub fn decoded_size(encoded_len: usize) -> usize {
    encoded_len * 2 / 3
}

#[inline]
fn decode_symbol(symbol: u8, offset: usize) -> Result<u8, DecodeError> {
    match DECODE_TABLE[(symbol & 0x3F) as usize] {
        INVALID_SYMBOL => Err(DecodeError::InvalidSymbol { offset, symbol }),
        nibble => Ok(nibble),
    }
}

/// Decode a 3-of-6 encoded byte stream.
///
/// Fails on the first codeword that is not in the table; no partial output
/// is returned in that case. Empty input decodes to empty output.
pub fn decode_3of6(encoded: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let out_len = decoded_size(encoded.len());
    let mut out = Vec::with_capacity(out_len);

    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut input = encoded.iter();

    while out.len() < out_len {
        while bits < 12 {
            let Some(&byte) = input.next() else {
                return Ok(out);
            };
            acc = (acc << 8) | u32::from(byte);
            bits += 8;
        }
        bits -= 12;
        let group = (acc >> bits) & 0x0FFF;
        acc &= (1 << bits) - 1;

        let offset = out.len();
        let high = decode_symbol((group >> 6) as u8, offset)?;
        let low = decode_symbol((group & 0x3F) as u8, offset)?;
        out.push((high << 4) | low);
    }

    Ok(out)
}

/// Encode bytes with the 3-of-6 line code.
///
/// The output is `encoded_size(data.len())` bytes; an odd input length leaves
/// four zero padding bits at the end.
pub fn encode_3of6(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_size(data.len()));
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in data {
        let high = THREE_OUT_OF_SIX_TABLE[(byte >> 4) as usize];
        let low = THREE_OUT_OF_SIX_TABLE[(byte & 0x0F) as usize];
        acc = (acc << 12) | (u32::from(high) << 6) | u32::from(low);
        bits += 12;
        while bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
        }
        acc &= (1 << bits) - 1;
    }

    if bits > 0 {
        out.push((acc << (8 - bits)) as u8);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_single_byte() {
        // 0x00 -> 010110 010110 -> 0101 1001 0110 (pad)
        assert_eq!(decode_3of6(&[0x59, 0x60]).unwrap(), vec![0x00]);
        // 0x44 -> 011100 011100
        assert_eq!(decode_3of6(&[0x71, 0xC0]).unwrap(), vec![0x44]);
    }

    #[test]
    fn test_encode_known_vector() {
        assert_eq!(encode_3of6(&[0x44]), vec![0x71, 0xC0]);
        assert_eq!(encode_3of6(&[0x00, 0x00]), vec![0x59, 0x65, 0x96]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(decode_3of6(&[]).unwrap(), Vec::<u8>::new());
        assert!(encode_3of6(&[]).is_empty());
    }

    #[test]
    fn test_output_length_is_two_thirds() {
        let data: Vec<u8> = (0..=255).collect();
        let encoded = encode_3of6(&data);
        assert_eq!(encoded.len(), 384);
        assert_eq!(decode_3of6(&encoded).unwrap(), data);

        // Incomplete trailing groups are not decoded
        assert_eq!(decode_3of6(&encoded[..4]).unwrap().len(), 2);
        assert_eq!(decode_3of6(&encoded[..1]).unwrap().len(), 0);
    }

    #[test]
    fn test_invalid_symbol() {
        // 0x00 0x00 is all-zero codewords
        let err = decode_3of6(&[0x00, 0x00, 0x00]).unwrap_err();
        assert_eq!(err, DecodeError::InvalidSymbol { offset: 0, symbol: 0 });
    }

    #[test]
    fn test_invalid_symbol_after_valid_prefix() {
        let mut encoded = encode_3of6(&[0x12, 0x34, 0x56, 0x78]);
        encoded[4] = 0xFF;
        match decode_3of6(&encoded) {
            Err(DecodeError::InvalidSymbol { offset, .. }) => assert_eq!(offset, 2),
            other => panic!("expected invalid symbol, got {other:?}"),
        }
    }

    #[test]
    fn test_encoded_size() {
        assert_eq!(encoded_size(0), 0);
        assert_eq!(encoded_size(1), 2);
        assert_eq!(encoded_size(2), 3);
        assert_eq!(encoded_size(3), 5);
        assert_eq!(encoded_size(47), 71);
    }

    #[test]
    fn test_table_is_three_of_six() {
        for code in THREE_OUT_OF_SIX_TABLE {
            assert_eq!(code.count_ones(), 3);
        }
    }
}
