//! # Receiver Configuration
//!
//! Acceptance thresholds and acquisition timing. The L-field bounds, the
//! minimum capture sizes and the Mode-1 trim margin are empirical values tuned
//! against meters seen in the field, so they live here as policy instead of
//! being fixed in the decoder.
//!
//! Configuration files are JSON; any missing field takes its default.
//!
//! ```json
//! { "listen_window_ms": 250, "policy": { "verify_format_b_crc": false } }
//! ```

use crate::constants::{
    L_FIELD_MAX, L_FIELD_MIN, MODE1_MIN_CAPTURE, MODE1_TRIM_MARGIN, MODE2_MIN_CAPTURE,
    RAW_PREVIEW_BYTES,
};
use crate::error::{Result, RxError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Decode acceptance policy applied by `Packet::finalize`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodePolicy {
    /// Minimum raw bytes for a T1 capture
    pub mode1_min_len: usize,
    /// Minimum raw bytes for a C1 capture
    pub mode2_min_len: usize,
    /// Smallest accepted L-field
    pub l_field_min: usize,
    /// Largest accepted L-field
    pub l_field_max: usize,
    /// Decoded T1 bytes kept past the wanted length
    pub mode1_trim_margin: usize,
    /// Raw bytes captured in the diagnostics hex preview
    pub raw_preview_bytes: usize,
    /// Require valid block CRCs when stripping Format A
    pub verify_format_a_crc: bool,
    /// Require valid CRCs before accepting Format B
    pub verify_format_b_crc: bool,
}

impl Default for DecodePolicy {
    fn default() -> Self {
        Self {
            mode1_min_len: MODE1_MIN_CAPTURE,
            mode2_min_len: MODE2_MIN_CAPTURE,
            l_field_min: L_FIELD_MIN,
            l_field_max: L_FIELD_MAX,
            mode1_trim_margin: MODE1_TRIM_MARGIN,
            raw_preview_bytes: RAW_PREVIEW_BYTES,
            verify_format_a_crc: true,
            verify_format_b_crc: true,
        }
    }
}

impl DecodePolicy {
    /// Whether an L-field value passes the sanity range
    pub fn l_field_valid(&self, l_field: u8) -> bool {
        (self.l_field_min..=self.l_field_max).contains(&usize::from(l_field))
    }
}

/// Acquisition and dispatch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Length of one listen window before RX is restarted
    pub listen_window_ms: u64,
    /// Total wait for a ready signal before a cycle gives up
    pub total_wait_ms: u64,
    /// Longest gap tolerated between bytes while reading a capture
    pub read_timeout_ms: u64,
    /// Capacity of the packet hand-off queue
    pub queue_capacity: usize,
    /// Interval between diagnostics summaries; 0 turns periodic summaries off
    pub diag_interval_secs: u64,
    /// Topic attached to diagnostics records
    pub diag_topic: String,
    /// Drop-warning throttle window
    pub log_throttle_window_ms: u64,
    /// Drop warnings allowed per window
    pub log_throttle_cap: u32,
    pub policy: DecodePolicy,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            listen_window_ms: 500,
            total_wait_ms: 60_000,
            read_timeout_ms: 50,
            queue_capacity: 3,
            diag_interval_secs: 60,
            diag_topic: "wmbus/diag".to_string(),
            log_throttle_window_ms: 1000,
            log_throttle_cap: 5,
            policy: DecodePolicy::default(),
        }
    }
}

impl ReceiverConfig {
    /// Parse a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ReceiverConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn listen_window(&self) -> Duration {
        Duration::from_millis(self.listen_window_ms)
    }

    pub fn total_wait(&self) -> Duration {
        Duration::from_millis(self.total_wait_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn diag_interval(&self) -> Duration {
        Duration::from_secs(self.diag_interval_secs)
    }

    /// Reject values the acquisition loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(RxError::Config("queue_capacity must be at least 1".into()));
        }
        if self.listen_window_ms == 0 {
            return Err(RxError::Config("listen_window_ms must be non-zero".into()));
        }
        if self.read_timeout_ms == 0 {
            return Err(RxError::Config("read_timeout_ms must be non-zero".into()));
        }
        if self.policy.l_field_min > self.policy.l_field_max {
            return Err(RxError::Config(format!(
                "l_field_min {} exceeds l_field_max {}",
                self.policy.l_field_min, self.policy.l_field_max
            )));
        }
        Ok(())
    }
}
