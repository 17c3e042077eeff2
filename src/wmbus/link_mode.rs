//! # Link Mode and Frame Format Classification
//!
//! Captures start either with the Mode-2 (C1) preamble byte or with 3-of-6
//! coded data (T1). For C1 the second byte selects Frame Format A or B.

use crate::constants::{WMBUS_BLOCK_A_PREAMBLE, WMBUS_BLOCK_B_PREAMBLE, WMBUS_MODE_C_PREAMBLE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical-layer link mode of a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LinkMode {
    /// No bytes seen yet
    #[default]
    Unknown,
    /// Mode-1: 3-of-6 line coded
    T1,
    /// Mode-2: NRZ, preceded by the C-mode preamble
    C1,
}

impl LinkMode {
    /// Short name used in text records and diagnostics
    pub fn name(self) -> &'static str {
        match self {
            LinkMode::T1 => "T1",
            LinkMode::C1 => "C1",
            LinkMode::Unknown => "??",
        }
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Data-link frame format (CRC layout)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameFormat {
    A,
    B,
}

impl FrameFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameFormat::A => "A",
            FrameFormat::B => "B",
        }
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify the link mode from the first captured byte
pub fn classify_link_mode(first: u8) -> LinkMode {
    if first == WMBUS_MODE_C_PREAMBLE {
        LinkMode::C1
    } else {
        LinkMode::T1
    }
}

/// Classify a C1 capture's frame format from its second byte
pub fn classify_c1_format(marker: u8) -> Option<FrameFormat> {
    match marker {
        WMBUS_BLOCK_A_PREAMBLE => Some(FrameFormat::A),
        WMBUS_BLOCK_B_PREAMBLE => Some(FrameFormat::B),
        _ => None,
    }
}
