//! # Decoded wM-Bus Telegram
//!
//! A [`Frame`] is the immutable result of a successful `Packet::finalize`: the
//! CRC-stripped data-link telegram (L-field first) plus the link mode, frame
//! format and RSSI of the capture it came from.
//!
//! ## Output views
//!
//! - `as_raw()` - owned copy of the telegram bytes
//! - `as_hex()` - lowercase hex string
//! - `as_rtlwmbus()` - one-line text record understood by rtl-wmbus consumers:
//!
//! ```text
//! T1;1;1;2024-05-01 12:00:00.00Z;-71;;;0x2e44...\n
//! ```

use crate::util::hex::encode_hex;
use crate::wmbus::link_mode::{FrameFormat, LinkMode};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU32, Ordering};

/// Timestamp layout of the text record
const RTLWMBUS_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S.00Z";

/// Represents a validated wireless M-Bus telegram.
#[derive(Debug)]
pub struct Frame {
    data: Vec<u8>,
    link_mode: LinkMode,
    format: FrameFormat,
    rssi: i8,
    handled: AtomicU32,
}

impl Frame {
    pub(crate) fn new(data: Vec<u8>, link_mode: LinkMode, format: FrameFormat, rssi: i8) -> Self {
        Self {
            data,
            link_mode,
            format,
            rssi,
            handled: AtomicU32::new(0),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take the telegram bytes without copying
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn l_field(&self) -> u8 {
        self.data.first().copied().unwrap_or(0)
    }

    pub fn link_mode(&self) -> LinkMode {
        self.link_mode
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn rssi(&self) -> i8 {
        self.rssi
    }

    pub fn as_raw(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn as_hex(&self) -> String {
        encode_hex(&self.data)
    }

    /// rtl-wmbus text record stamped with the current UTC time
    pub fn as_rtlwmbus(&self) -> String {
        self.as_rtlwmbus_at(Utc::now())
    }

    /// rtl-wmbus text record stamped with `timestamp`
    pub fn as_rtlwmbus_at(&self, timestamp: DateTime<Utc>) -> String {
        let mut output = String::with_capacity(2 + 5 + 24 + 1 + 4 + 5 + 2 * self.data.len() + 1);
        output.push_str(self.link_mode.name());
        output.push_str(";1;1;");
        output.push_str(&timestamp.format(RTLWMBUS_TIME_FORMAT).to_string());
        output.push(';');
        output.push_str(&self.rssi.to_string());
        output.push_str(";;;0x");
        output.push_str(&self.as_hex());
        output.push('\n');
        output
    }

    /// Record that a handler processed this telegram
    pub fn mark_handled(&self) {
        self.handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handled_count(&self) -> u32 {
        self.handled.load(Ordering::Relaxed)
    }
}
