//! # Packet Accumulator and Frame Finalisation
//!
//! A [`Packet`] owns the raw bytes of one radio capture while it is being
//! read. It classifies the link mode from the first byte, estimates the total
//! capture size from the L-field as soon as the header is in, and is finally
//! consumed by [`Packet::finalize`], which either yields a validated,
//! CRC-stripped [`Frame`] or a [`Rejected`] record explaining the drop.
//!
//! ## Capture layouts
//!
//! ```text
//! T1: [3-of-6 coded DLL frame .................................]
//! C1: [0x54][0xCD|0x3D][L][DLL frame ..........................]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use wmbus_rx::config::DecodePolicy;
//! use wmbus_rx::wmbus::packet::{Packet, RejectReason};
//!
//! let packet = Packet::from_capture(vec![0x54, 0x99, 0x20, 0x44]);
//! let rejected = packet.finalize(&DecodePolicy::default()).unwrap_err();
//! assert_eq!(rejected.reason, RejectReason::TooShort);
//! ```

use crate::config::DecodePolicy;
use crate::constants::{
    LENGTH_BLOCK_PAYLOAD, LENGTH_TWO_BLOCK_LIMIT, WMBUS_MODE_C_SUFFIX_LEN, WMBUS_PREAMBLE_SIZE,
};
use crate::util::hex::hex_preview;
use crate::wmbus::block::{
    dll_size_format_a, dll_size_format_b, strip_format_a, verify_format_b, CrcStripError,
};
use crate::wmbus::encoding::{decode_3of6, encoded_size};
use crate::wmbus::frame::Frame;
use crate::wmbus::link_mode::{classify_c1_format, classify_link_mode, FrameFormat, LinkMode};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a capture was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    TooShort,
    DecodeFailed,
    DllCrcStripFailed,
    UnknownPreamble,
    LFieldInvalid,
    UnknownLinkMode,
    Truncated,
    Other,
}

impl RejectReason {
    /// Every reason, in diagnostics bucket order
    pub const ALL: [RejectReason; 8] = [
        RejectReason::TooShort,
        RejectReason::DecodeFailed,
        RejectReason::DllCrcStripFailed,
        RejectReason::UnknownPreamble,
        RejectReason::LFieldInvalid,
        RejectReason::UnknownLinkMode,
        RejectReason::Truncated,
        RejectReason::Other,
    ];

    /// Stable tag consumed by diagnostics
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::TooShort => "too_short",
            RejectReason::DecodeFailed => "decode_failed",
            RejectReason::DllCrcStripFailed => "dll_crc_strip_failed",
            RejectReason::UnknownPreamble => "unknown_preamble",
            RejectReason::LFieldInvalid => "l_field_invalid",
            RejectReason::UnknownLinkMode => "unknown_link_mode",
            RejectReason::Truncated => "truncated",
            RejectReason::Other => "other",
        }
    }

    /// Map a tag back to its reason; unknown tags fall into `Other`
    pub fn from_tag(tag: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|reason| reason.as_str() == tag)
            .unwrap_or(RejectReason::Other)
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dropped capture with everything needed to explain the drop
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("capture rejected: {reason} (mode {link_mode}, want {want_len}, got {got_len})")]
pub struct Rejected {
    pub reason: RejectReason,
    pub link_mode: LinkMode,
    pub format: Option<FrameFormat>,
    pub rssi: i8,
    /// DLL bytes required by the L-field (CRC fields included)
    pub want_len: usize,
    /// DLL bytes available after line decoding / prefix removal
    pub got_len: usize,
    /// Raw capture length before any transformation
    pub raw_len: usize,
    /// Bounded hex preview of the raw capture
    pub raw_hex: String,
}

impl Rejected {
    pub fn is_truncated(&self) -> bool {
        self.reason == RejectReason::Truncated
    }
}

/// Map a strip error to a reject reason; `Short` counts as truncation only
/// when fewer bytes arrived than the L-field asks for
fn strip_failure(err: CrcStripError, got_len: usize, want_len: usize) -> RejectReason {
    debug!("DLL CRC strip failed: {err}");
    match err {
        CrcStripError::Short { .. } if got_len < want_len => RejectReason::Truncated,
        CrcStripError::Short { .. }
        | CrcStripError::Empty
        | CrcStripError::CrcMismatch { .. }
        | CrcStripError::Layout { .. } => RejectReason::DllCrcStripFailed,
    }
}

/// Raw capture accumulator
#[derive(Debug, Default)]
pub struct Packet {
    data: Vec<u8>,
    link_mode: LinkMode,
    expected_size: usize,
    rssi: i8,
}

impl Packet {
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(WMBUS_PREAMBLE_SIZE),
            ..Self::default()
        }
    }

    /// Wrap a complete capture
    pub fn from_capture(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Grow the buffer by `len` zeroed bytes and return the new region
    pub fn append_space(&mut self, len: usize) -> &mut [u8] {
        let old = self.data.len();
        self.data.resize(old + len, 0);
        &mut self.data[old..]
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn push(&mut self, byte: u8) {
        self.data.push(byte);
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn set_rssi(&mut self, rssi: i8) {
        self.rssi = rssi;
    }

    pub fn rssi(&self) -> i8 {
        self.rssi
    }

    /// Link mode, classified once from the first byte
    pub fn link_mode(&mut self) -> LinkMode {
        if self.link_mode == LinkMode::Unknown {
            if let Some(&first) = self.data.first() {
                self.link_mode = classify_link_mode(first);
            }
        }
        self.link_mode
    }

    /// L-field as far as it can be read from the current bytes
    pub fn l_field(&mut self) -> Option<u8> {
        match self.link_mode() {
            LinkMode::C1 => self.data.get(2).copied(),
            LinkMode::T1 => {
                // The first 12 coded bits carry the L-field
                let prefix = &self.data[..self.data.len().min(2)];
                decode_3of6(prefix).ok()?.first().copied()
            }
            LinkMode::Unknown => None,
        }
    }

    /// Total raw bytes to capture, or 0 while it cannot be determined.
    ///
    /// The value is memoised once non-zero and never recomputed.
    pub fn expected_size(&mut self) -> usize {
        if self.data.len() < WMBUS_PREAMBLE_SIZE {
            return 0;
        }
        if self.expected_size == 0 {
            self.expected_size = self.estimate_size().unwrap_or(0);
            trace!("expected_size: {}", self.expected_size);
        }
        self.expected_size
    }

    fn estimate_size(&mut self) -> Option<usize> {
        let l_field = usize::from(self.l_field().filter(|&l| l != 0)?);

        // First two blocks carry 25 bytes past the L-field, later ones 16
        let nr_blocks = if l_field < LENGTH_TWO_BLOCK_LIMIT {
            2
        } else {
            (l_field - LENGTH_TWO_BLOCK_LIMIT) / LENGTH_BLOCK_PAYLOAD + 3
        };
        let nr_bytes = l_field + 1 + 2 * nr_blocks;

        match self.link_mode() {
            LinkMode::T1 => Some(encoded_size(nr_bytes)),
            LinkMode::C1 => match classify_c1_format(*self.data.get(1)?)? {
                FrameFormat::A => Some(WMBUS_MODE_C_SUFFIX_LEN + nr_bytes),
                FrameFormat::B => Some(WMBUS_MODE_C_SUFFIX_LEN + 1 + l_field),
            },
            LinkMode::Unknown => None,
        }
    }

    /// Consume the capture, producing a telegram or a rejection record
    pub fn finalize(mut self, policy: &DecodePolicy) -> Result<Frame, Rejected> {
        let link_mode = self.link_mode();
        let mut rejected = Rejected {
            reason: RejectReason::Other,
            link_mode,
            format: None,
            rssi: self.rssi,
            want_len: 0,
            got_len: 0,
            raw_len: self.data.len(),
            raw_hex: hex_preview(&self.data, policy.raw_preview_bytes),
        };

        let data = std::mem::take(&mut self.data);
        let outcome = match link_mode {
            LinkMode::T1 => finalize_t1(data, policy, &mut rejected),
            LinkMode::C1 => finalize_c1(data, policy, &mut rejected),
            LinkMode::Unknown => Err(RejectReason::UnknownLinkMode),
        };

        match outcome {
            Ok((telegram, format)) => Ok(Frame::new(telegram, link_mode, format, self.rssi)),
            Err(reason) => {
                rejected.reason = reason;
                Err(rejected)
            }
        }
    }
}

fn finalize_t1(
    data: Vec<u8>,
    policy: &DecodePolicy,
    rejected: &mut Rejected,
) -> Result<(Vec<u8>, FrameFormat), RejectReason> {
    if data.len() < policy.mode1_min_len {
        return Err(RejectReason::TooShort);
    }

    // T1 is only seen with Format A
    rejected.format = Some(FrameFormat::A);

    let mut decoded = decode_3of6(&data).map_err(|err| {
        debug!("3-of-6 decode failed: {err}");
        RejectReason::DecodeFailed
    })?;
    if decoded.len() < 2 {
        return Err(RejectReason::DecodeFailed);
    }

    let l_field = decoded[0];
    let want = dll_size_format_a(l_field);
    rejected.want_len = want;
    rejected.got_len = decoded.len();

    if !policy.l_field_valid(l_field) {
        return Err(RejectReason::LFieldInvalid);
    }
    if decoded.len() < want {
        return Err(RejectReason::Truncated);
    }

    // Bound trailing noise, never below the DLL size
    let keep = want.max(usize::from(l_field) + 1 + policy.mode1_trim_margin);
    decoded.truncate(keep);

    let got = decoded.len();
    let telegram = strip_format_a(&decoded, policy.verify_format_a_crc)
        .map_err(|err| strip_failure(err, got, want))?;
    Ok((telegram, FrameFormat::A))
}

fn finalize_c1(
    mut data: Vec<u8>,
    policy: &DecodePolicy,
    rejected: &mut Rejected,
) -> Result<(Vec<u8>, FrameFormat), RejectReason> {
    if data.len() < policy.mode2_min_len {
        return Err(RejectReason::TooShort);
    }
    let marker = *data.get(1).ok_or(RejectReason::TooShort)?;
    let format = classify_c1_format(marker).ok_or(RejectReason::UnknownPreamble)?;
    rejected.format = Some(format);

    data.drain(..WMBUS_MODE_C_SUFFIX_LEN);
    let l_field = *data.first().ok_or(RejectReason::TooShort)?;
    let want = match format {
        FrameFormat::A => dll_size_format_a(l_field),
        FrameFormat::B => dll_size_format_b(l_field),
    };
    rejected.want_len = want;
    rejected.got_len = data.len();

    if !policy.l_field_valid(l_field) {
        return Err(RejectReason::LFieldInvalid);
    }
    if data.len() < want {
        return Err(RejectReason::Truncated);
    }
    data.truncate(want);
    let got = data.len();

    match format {
        FrameFormat::A => {
            let telegram = strip_format_a(&data, policy.verify_format_a_crc)
                .map_err(|err| strip_failure(err, got, want))?;
            Ok((telegram, format))
        }
        FrameFormat::B => {
            if policy.verify_format_b_crc {
                verify_format_b(&data).map_err(|err| strip_failure(err, got, want))?;
            }
            Ok((data, format))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wmbus::block::{build_format_a, build_format_b};
    use crate::wmbus::encoding::encode_3of6;

    fn telegram(l_field: u8) -> Vec<u8> {
        let mut t = vec![l_field, 0x44, 0x2D, 0x2C];
        t.extend((4..=l_field).map(|i| i ^ 0x5A));
        t
    }

    fn c1_capture(marker: u8, dll: &[u8]) -> Vec<u8> {
        let mut capture = vec![0x54, marker];
        capture.extend_from_slice(dll);
        capture
    }

    #[test]
    fn test_link_mode_memoised() {
        let mut packet = Packet::new();
        assert_eq!(packet.link_mode(), LinkMode::Unknown);
        packet.push(0x54);
        assert_eq!(packet.link_mode(), LinkMode::C1);
        packet.extend_from_slice(&[0x00, 0x00]);
        assert_eq!(packet.link_mode(), LinkMode::C1);
    }

    #[test]
    fn test_expected_size_c1() {
        let mut packet = Packet::from_capture(vec![0x54, 0xCD]);
        assert_eq!(packet.expected_size(), 0);
        packet.push(20);
        assert_eq!(packet.expected_size(), 27);

        let mut packet = Packet::from_capture(vec![0x54, 0x3D, 40]);
        assert_eq!(packet.expected_size(), 43);

        let mut packet = Packet::from_capture(vec![0x54, 0x99, 40]);
        assert_eq!(packet.expected_size(), 0);
    }

    #[test]
    fn test_expected_size_t1() {
        let capture = encode_3of6(&build_format_a(&telegram(40)));
        let mut packet = Packet::from_capture(capture[..3].to_vec());
        assert_eq!(packet.expected_size(), capture.len());
        assert_eq!(packet.expected_size(), 71);
    }

    #[test]
    fn test_expected_size_memoised() {
        let mut packet = Packet::new();
        packet.extend_from_slice(&[0x54, 0xCD, 30]);
        let first = packet.expected_size();
        packet.extend_from_slice(&[0xFF; 40]);
        assert_eq!(packet.expected_size(), first);
    }

    #[test]
    fn test_expected_size_unknown_l_field() {
        // Invalid coded prefix
        let mut packet = Packet::from_capture(vec![0x00, 0x00, 0x00]);
        assert_eq!(packet.expected_size(), 0);
        // L-field of zero
        let mut packet = Packet::from_capture(vec![0x54, 0xCD, 0x00]);
        assert_eq!(packet.expected_size(), 0);
    }

    #[test]
    fn test_append_space() {
        let mut packet = Packet::new();
        packet.append_space(3).copy_from_slice(&[0x54, 0xCD, 0x14]);
        assert_eq!(packet.data(), &[0x54, 0xCD, 0x14]);
        assert_eq!(packet.append_space(2).len(), 2);
        assert_eq!(packet.len(), 5);
    }

    #[test]
    fn test_finalize_t1() {
        let t = telegram(40);
        let mut packet = Packet::from_capture(encode_3of6(&build_format_a(&t)));
        packet.set_rssi(-71);
        let frame = packet.finalize(&DecodePolicy::default()).unwrap();
        assert_eq!(frame.data(), t.as_slice());
        assert_eq!(frame.link_mode(), LinkMode::T1);
        assert_eq!(frame.format(), FrameFormat::A);
        assert_eq!(frame.rssi(), -71);
    }

    #[test]
    fn test_finalize_c1_format_b() {
        let t = telegram(60);
        let dll = build_format_b(&t);
        let frame = Packet::from_capture(c1_capture(0x3D, &dll))
            .finalize(&DecodePolicy::default())
            .unwrap();
        assert_eq!(frame.format(), FrameFormat::B);
        assert_eq!(frame.data(), dll.as_slice());
        assert_eq!(frame.len(), usize::from(dll[0]) + 1);
    }

    #[test]
    fn test_finalize_c1_format_b_bad_crc() {
        let mut dll = build_format_b(&telegram(60));
        dll[20] ^= 0x80;
        let capture = c1_capture(0x3D, &dll);

        let rejected = Packet::from_capture(capture.clone())
            .finalize(&DecodePolicy::default())
            .unwrap_err();
        assert_eq!(rejected.reason, RejectReason::DllCrcStripFailed);

        let lenient = DecodePolicy {
            verify_format_b_crc: false,
            ..DecodePolicy::default()
        };
        assert!(Packet::from_capture(capture).finalize(&lenient).is_ok());
    }

    #[test]
    fn test_finalize_c1_trims_excess() {
        let t = telegram(30);
        let mut capture = c1_capture(0xCD, &build_format_a(&t));
        capture.extend_from_slice(&[0x00; 7]);
        let frame = Packet::from_capture(capture)
            .finalize(&DecodePolicy::default())
            .unwrap();
        assert_eq!(frame.data(), t.as_slice());
    }

    #[test]
    fn test_finalize_unknown_link_mode() {
        let rejected = Packet::new().finalize(&DecodePolicy::default()).unwrap_err();
        assert_eq!(rejected.reason, RejectReason::UnknownLinkMode);
        assert_eq!(rejected.raw_len, 0);
    }

    #[test]
    fn test_raw_preview_bounded() {
        let policy = DecodePolicy {
            raw_preview_bytes: 4,
            ..DecodePolicy::default()
        };
        let rejected = Packet::from_capture(vec![0x54, 0x99, 0x0A, 0x0B, 0x0C, 0x0D])
            .finalize(&policy)
            .unwrap_err();
        assert_eq!(rejected.raw_hex, "54990a0b");
        assert_eq!(rejected.raw_len, 6);
    }

    #[test]
    fn test_t1_crc_mismatch() {
        let mut dll = build_format_a(&telegram(40));
        dll[30] ^= 0x01;
        let rejected = Packet::from_capture(encode_3of6(&dll))
            .finalize(&DecodePolicy::default())
            .unwrap_err();
        assert_eq!(rejected.reason, RejectReason::DllCrcStripFailed);
        assert_eq!(rejected.format, Some(FrameFormat::A));
    }

    #[test]
    fn test_reason_tags() {
        for reason in RejectReason::ALL {
            assert_eq!(RejectReason::from_tag(reason.as_str()), reason);
        }
        assert_eq!(RejectReason::from_tag("bogus"), RejectReason::Other);
        assert_eq!(
            serde_json::to_string(&RejectReason::LFieldInvalid).unwrap(),
            "\"l_field_invalid\""
        );
    }
}
