//! # Utility Modules
//!
//! Hex encoding/decoding and rate-limited logging helpers used throughout
//! the wmbus-rx crate.

pub mod hex;
pub mod logging;

pub use hex::{decode_hex, encode_hex, format_hex_compact, hex_preview, parse_hex_lenient, HexError};
pub use logging::{log_frame_hex, LogThrottle};
