//! # Data-Link Block CRC Handling
//!
//! wM-Bus telegrams interleave CRC fields with the data. The layout depends on
//! the frame format:
//!
//! - **Format A**: the first block holds 10 data bytes (L, C, M, A fields),
//!   every following block up to 16 data bytes; each block is followed by a
//!   2-byte CRC. The L-field counts data bytes only.
//! - **Format B**: the L-field counts the CRC bytes too. Frames up to 128
//!   bytes carry one CRC at the end; longer frames carry a second CRC at
//!   offset 126 covering the first 126 bytes.
//!
//! ## Usage
//!
//! ```rust
//! use wmbus_rx::wmbus::block::{strip_format_a, dll_size_format_a};
//! # let frame: Vec<u8> = Vec::new();
//! if let Ok(telegram) = strip_format_a(&frame, true) {
//!     assert_eq!(telegram.len(), telegram[0] as usize + 1);
//! }
//! assert_eq!(dll_size_format_a(20), 25);
//! ```

use crate::constants::{
    DLL_CRC_SIZE, FORMAT_A_BLOCK_DATA, FORMAT_A_FIRST_BLOCK_DATA, FORMAT_B_FIRST_CRC_POS,
    FORMAT_B_SINGLE_CRC_MAX,
};
use crate::wmbus::crc;
use crate::wmbus::link_mode::FrameFormat;
use log::debug;
use thiserror::Error;

/// Errors raised while checking or removing DLL CRC fields
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrcStripError {
    #[error("Frame is empty")]
    Empty,

    #[error("Frame too short for block layout: need {needed} bytes, got {available}")]
    Short { needed: usize, available: usize },

    #[error("Block {block} CRC mismatch: received {received:04X}, calculated {calculated:04X}")]
    CrcMismatch {
        block: usize,
        received: u16,
        calculated: u16,
    },

    #[error("No Format B CRC layout fits a {len} byte frame")]
    Layout { len: usize },
}

/// Number of Format A blocks needed for `data_len` bytes (L-field included)
pub fn format_a_block_count(data_len: usize) -> usize {
    if data_len <= FORMAT_A_FIRST_BLOCK_DATA {
        1
    } else {
        1 + (data_len - FORMAT_A_FIRST_BLOCK_DATA).div_ceil(FORMAT_A_BLOCK_DATA)
    }
}

/// On-air DLL size of a Format A telegram with the given L-field, CRCs included
pub fn dll_size_format_a(l_field: u8) -> usize {
    let data_len = usize::from(l_field) + 1;
    data_len + DLL_CRC_SIZE * format_a_block_count(data_len)
}

/// On-air DLL size of a Format B telegram with the given L-field
pub fn dll_size_format_b(l_field: u8) -> usize {
    usize::from(l_field) + 1
}

fn check_block(
    block: usize,
    data: &[u8],
    check: &[u8],
    verify: bool,
) -> Result<(), CrcStripError> {
    if !verify || crc::verify(data, check) {
        return Ok(());
    }
    let received = match check {
        [hi, lo] => u16::from_be_bytes([*hi, *lo]),
        _ => 0,
    };
    let calculated = crc::crc16(data);
    debug!("Block {block} CRC mismatch: received {received:04X}, calculated {calculated:04X}");
    Err(CrcStripError::CrcMismatch {
        block,
        received,
        calculated,
    })
}

/// Remove the DLL CRC fields of a Format A telegram.
///
/// `frame` must start with the L-field. The output is exactly `L + 1` bytes;
/// trailing bytes past the last CRC are ignored. With `verify` set, every
/// block CRC must match.
pub fn strip_format_a(frame: &[u8], verify: bool) -> Result<Vec<u8>, CrcStripError> {
    let Some(&l_field) = frame.first() else {
        return Err(CrcStripError::Empty);
    };
    let want = usize::from(l_field) + 1;
    let mut out = Vec::with_capacity(want);
    let mut pos = 0;
    let mut block = 0;

    while out.len() < want {
        let block_data = if block == 0 {
            FORMAT_A_FIRST_BLOCK_DATA
        } else {
            FORMAT_A_BLOCK_DATA
        };
        let take = block_data.min(want - out.len());
        let crc_pos = pos + take;
        let end = crc_pos + DLL_CRC_SIZE;
        if end > frame.len() {
            return Err(CrcStripError::Short {
                needed: end,
                available: frame.len(),
            });
        }

        check_block(block, &frame[pos..crc_pos], &frame[crc_pos..end], verify)?;
        out.extend_from_slice(&frame[pos..crc_pos]);
        pos = end;
        block += 1;
    }

    Ok(out)
}

/// CRC field positions of a Format B frame of `len` bytes
fn format_b_layout(len: usize) -> (usize, Option<usize>) {
    if len <= FORMAT_B_SINGLE_CRC_MAX {
        (len - DLL_CRC_SIZE, None)
    } else {
        (FORMAT_B_FIRST_CRC_POS, Some(len - DLL_CRC_SIZE))
    }
}

/// Check the CRC fields of a complete Format B telegram, leaving it intact
pub fn verify_format_b(frame: &[u8]) -> Result<(), CrcStripError> {
    strip_format_b_inner(frame, true).map(|_| ())
}

/// Remove the CRC fields of a complete Format B telegram and rewrite its
/// L-field to the stripped length.
pub fn strip_format_b(frame: &[u8], verify: bool) -> Result<Vec<u8>, CrcStripError> {
    let mut out = strip_format_b_inner(frame, verify)?;
    let len = out.len();
    if let Some(l_field) = out.first_mut() {
        *l_field = (len - 1) as u8;
    }
    Ok(out)
}

fn strip_format_b_inner(frame: &[u8], verify: bool) -> Result<Vec<u8>, CrcStripError> {
    if frame.is_empty() {
        return Err(CrcStripError::Empty);
    }
    if frame.len() <= DLL_CRC_SIZE {
        return Err(CrcStripError::Short {
            needed: DLL_CRC_SIZE + 1,
            available: frame.len(),
        });
    }

    // A 129 byte frame has no room for the second CRC field
    let two_crc_min = FORMAT_B_FIRST_CRC_POS + 2 * DLL_CRC_SIZE;
    if frame.len() > FORMAT_B_SINGLE_CRC_MAX && frame.len() < two_crc_min {
        return Err(CrcStripError::Layout { len: frame.len() });
    }

    let (crc1_pos, crc2_pos) = format_b_layout(frame.len());
    let mut out = Vec::with_capacity(frame.len());

    check_block(
        0,
        &frame[..crc1_pos],
        &frame[crc1_pos..crc1_pos + DLL_CRC_SIZE],
        verify,
    )?;
    out.extend_from_slice(&frame[..crc1_pos]);

    if let Some(crc2_pos) = crc2_pos {
        let start = crc1_pos + DLL_CRC_SIZE;
        check_block(
            1,
            &frame[start..crc2_pos],
            &frame[crc2_pos..crc2_pos + DLL_CRC_SIZE],
            verify,
        )?;
        out.extend_from_slice(&frame[start..crc2_pos]);
    }

    Ok(out)
}

/// Strip DLL CRCs trying Format A first, then Format B; CRCs are always
/// verified. Returns the stripped telegram and the layout that matched.
pub fn strip_any(frame: &[u8]) -> Result<(Vec<u8>, FrameFormat), CrcStripError> {
    match strip_format_a(frame, true) {
        Ok(out) => Ok((out, FrameFormat::A)),
        Err(err_a) => {
            debug!("Format A strip failed ({err_a}), trying Format B");
            strip_format_b(frame, true).map(|out| (out, FrameFormat::B))
        }
    }
}

/// Build a Format A DLL frame from a CRC-less telegram. Used by tests and
/// the `encode` tooling to synthesise captures.
pub fn build_format_a(telegram: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(telegram.len() + 2 * format_a_block_count(telegram.len()));
    let (first, rest) = telegram.split_at(FORMAT_A_FIRST_BLOCK_DATA.min(telegram.len()));
    crc::append_crc(first, &mut out);
    for chunk in rest.chunks(FORMAT_A_BLOCK_DATA) {
        crc::append_crc(chunk, &mut out);
    }
    out
}

/// Build a Format B DLL frame from a CRC-less telegram. The L-field is
/// rewritten to include the CRC bytes.
pub fn build_format_b(telegram: &[u8]) -> Vec<u8> {
    let total = if telegram.len() + DLL_CRC_SIZE <= FORMAT_B_SINGLE_CRC_MAX {
        telegram.len() + DLL_CRC_SIZE
    } else {
        telegram.len() + 2 * DLL_CRC_SIZE
    };
    let mut data = telegram.to_vec();
    if let Some(l_field) = data.first_mut() {
        *l_field = (total - 1) as u8;
    }

    let mut out = Vec::with_capacity(total);
    if total <= FORMAT_B_SINGLE_CRC_MAX {
        crc::append_crc(&data, &mut out);
    } else {
        let (first, rest) = data.split_at(FORMAT_B_FIRST_CRC_POS);
        crc::append_crc(first, &mut out);
        crc::append_crc(rest, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telegram(l_field: u8) -> Vec<u8> {
        let mut t = vec![l_field];
        t.extend((1..=l_field).map(|i| i.wrapping_mul(7)));
        t
    }

    #[test]
    fn test_block_count() {
        assert_eq!(format_a_block_count(10), 1);
        assert_eq!(format_a_block_count(11), 2);
        assert_eq!(format_a_block_count(26), 2);
        assert_eq!(format_a_block_count(27), 3);
    }

    #[test]
    fn test_dll_size() {
        assert_eq!(dll_size_format_a(20), 25);
        assert_eq!(dll_size_format_a(40), 47);
        assert_eq!(dll_size_format_b(40), 41);
    }

    #[test]
    fn test_strip_format_a_multi_block() {
        let t = telegram(44);
        let frame = build_format_a(&t);
        assert_eq!(frame.len(), dll_size_format_a(44));
        assert_eq!(strip_format_a(&frame, true).unwrap(), t);
    }

    #[test]
    fn test_strip_format_a_ignores_trailing_bytes() {
        let t = telegram(20);
        let mut frame = build_format_a(&t);
        frame.extend_from_slice(&[0xAA; 9]);
        assert_eq!(strip_format_a(&frame, true).unwrap(), t);
    }

    #[test]
    fn test_strip_format_a_crc_mismatch() {
        let t = telegram(30);
        let mut frame = build_format_a(&t);
        frame[14] ^= 0x10; // second block data
        match strip_format_a(&frame, true) {
            Err(CrcStripError::CrcMismatch { block, .. }) => assert_eq!(block, 1),
            other => panic!("expected CRC mismatch, got {other:?}"),
        }
        // Lenient strip still recovers the layout
        assert_eq!(strip_format_a(&frame, false).unwrap().len(), 31);
    }

    #[test]
    fn test_strip_format_a_short() {
        let frame = build_format_a(&telegram(30));
        let short = &frame[..frame.len() - 1];
        assert!(matches!(
            strip_format_a(short, true),
            Err(CrcStripError::Short { .. })
        ));
        assert_eq!(strip_format_a(&[], true), Err(CrcStripError::Empty));
    }

    #[test]
    fn test_format_b_single_crc() {
        let t = telegram(40);
        let frame = build_format_b(&t);
        assert_eq!(frame.len(), 43);
        assert_eq!(frame[0] as usize, frame.len() - 1);
        assert!(verify_format_b(&frame).is_ok());

        let stripped = strip_format_b(&frame, true).unwrap();
        assert_eq!(stripped.len(), 41);
        assert_eq!(stripped[0], 40);
        assert_eq!(&stripped[1..], &t[1..]);
    }

    #[test]
    fn test_format_b_two_crcs() {
        let t = telegram(200);
        let frame = build_format_b(&t);
        assert_eq!(frame.len(), 205);
        assert!(verify_format_b(&frame).is_ok());

        let mut corrupted = frame.clone();
        corrupted[150] ^= 0x01;
        match verify_format_b(&corrupted) {
            Err(CrcStripError::CrcMismatch { block, .. }) => assert_eq!(block, 1),
            other => panic!("expected second CRC mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_format_b_129_bytes_has_no_layout() {
        let mut frame = vec![128u8];
        frame.extend((1..129).map(|i| i as u8));
        assert_eq!(frame.len(), 129);
        assert_eq!(verify_format_b(&frame), Err(CrcStripError::Layout { len: 129 }));
        assert_eq!(
            strip_format_b(&frame, false),
            Err(CrcStripError::Layout { len: 129 })
        );
    }

    #[test]
    fn test_strip_format_b_rewrites_l_field_on_long_frame() {
        let t = telegram(250);
        let frame = build_format_b(&t);
        assert_eq!(frame.len(), 255);
        assert_eq!(frame[0], 254);

        let stripped = strip_format_b(&frame, true).unwrap();
        assert_eq!(stripped.len(), 251);
        assert_eq!(stripped[0], 250);
        assert_eq!(&stripped[1..], &t[1..]);
    }

    #[test]
    fn test_strip_any() {
        let t = telegram(33);
        let (out, format) = strip_any(&build_format_a(&t)).unwrap();
        assert_eq!(format, FrameFormat::A);
        assert_eq!(out, t);

        let (out, format) = strip_any(&build_format_b(&t)).unwrap();
        assert_eq!(format, FrameFormat::B);
        assert_eq!(out.len(), t.len());

        assert!(strip_any(&[0x0C; 20]).is_err());
    }
}
