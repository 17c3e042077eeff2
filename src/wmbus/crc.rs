//! # EN 13757 CRC-16
//!
//! The wM-Bus data-link layer protects every block with a 16-bit CRC using
//! generator polynomial 0x3D65, initial value 0, MSB-first bit processing and
//! a complemented result. The check bytes follow the block big-endian.

use crc::{Crc, CRC_16_EN_13757};

/// CRC-16/EN-13757 (poly 0x3D65, init 0x0000, xorout 0xFFFF)
pub const WMBUS_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_EN_13757);

/// Compute the DLL CRC over `data`
pub fn crc16(data: &[u8]) -> u16 {
    WMBUS_CRC.checksum(data)
}

/// Check `data` against two big-endian CRC bytes.
///
/// Returns `false` when `check` does not hold exactly two bytes.
pub fn verify(data: &[u8], check: &[u8]) -> bool {
    match check {
        [hi, lo] => crc16(data) == u16::from_be_bytes([*hi, *lo]),
        _ => false,
    }
}

/// Append the big-endian CRC of `data` to `out`
pub fn append_crc(data: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(data);
    out.extend_from_slice(&crc16(data).to_be_bytes());
}
