//! wM-Bus Physical and Data-Link Layer Constants
//!
//! This module defines the constants used by the frame acquisition pipeline,
//! based on the EN 13757-4 framing rules and on values tuned against meters
//! observed in the field.

/// Number of bytes read from the radio before the length can be estimated
pub const WMBUS_PREAMBLE_SIZE: usize = 3;

/// First byte of every Mode-2 (C1, NRZ) capture
pub const WMBUS_MODE_C_PREAMBLE: u8 = 0x54;

/// Second byte of a Mode-2 capture carrying Frame Format A
pub const WMBUS_BLOCK_A_PREAMBLE: u8 = 0xCD;

/// Second byte of a Mode-2 capture carrying Frame Format B
pub const WMBUS_BLOCK_B_PREAMBLE: u8 = 0x3D;

/// Bytes preceding the L-field in a Mode-2 capture (preamble tail + format marker)
pub const WMBUS_MODE_C_SUFFIX_LEN: usize = 2;

/// Size of a DLL CRC field
pub const DLL_CRC_SIZE: usize = 2;

/// Format A: data bytes in the first block (L, C, M, A fields)
pub const FORMAT_A_FIRST_BLOCK_DATA: usize = 10;

/// Format A: data bytes in every following block
pub const FORMAT_A_BLOCK_DATA: usize = 16;

/// Format B: frames longer than this carry a second CRC
pub const FORMAT_B_SINGLE_CRC_MAX: usize = 128;

/// Format B: position of the first CRC in a two-CRC frame
pub const FORMAT_B_FIRST_CRC_POS: usize = 126;

// ----------------------------------------------------------------------------
// Length estimator block arithmetic
// ----------------------------------------------------------------------------

/// L-field values below this fit in the first two blocks
pub const LENGTH_TWO_BLOCK_LIMIT: usize = 26;

/// Payload bytes per block past the first two
pub const LENGTH_BLOCK_PAYLOAD: usize = 16;

// ----------------------------------------------------------------------------
// Empirical acceptance policy defaults
// ----------------------------------------------------------------------------

/// Mode-1 captures shorter than this are noise
pub const MODE1_MIN_CAPTURE: usize = 60;

/// Mode-2 captures shorter than this are noise
pub const MODE2_MIN_CAPTURE: usize = 16;

/// Smallest accepted L-field
pub const L_FIELD_MIN: usize = 12;

/// Largest accepted L-field
pub const L_FIELD_MAX: usize = 260;

/// Mode-1 decoded bytes kept past the wanted length
pub const MODE1_TRIM_MARGIN: usize = 64;

/// Raw bytes kept in the diagnostics hex preview
pub const RAW_PREVIEW_BYTES: usize = 256;
