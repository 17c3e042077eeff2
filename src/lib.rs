//! # wmbus-rx - Wireless M-Bus Frame Acquisition and Link-Layer Decoding
//!
//! The wmbus-rx crate turns raw captures from a sub-GHz receiver into validated
//! wireless M-Bus telegrams. It covers the receive path below the application
//! layer: line decoding, data-link CRC handling and the acquisition pipeline
//! that feeds telegrams to consumers.
//!
//! ## Features
//!
//! - 3-of-6 line decoding and encoding for T1 captures
//! - EN 13757 CRC validation and Format A / Format B DLL block handling
//! - Link mode classification (T1, C1) and capture length estimation from the L-field
//! - Packet finalisation with a typed rejection taxonomy for dropped captures
//! - Telegram views: raw bytes, hex and the rtl-wmbus text record
//! - Async acquisition worker with a bounded drop-newest queue and a dispatcher
//!   fanning telegrams out to registered handlers
//! - JSON diagnostics records and periodic summaries
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! wmbus-rx = "0.1.0"
//! ```
//!
//! ```rust
//! use wmbus_rx::{decode_capture, RejectReason};
//!
//! let rejected = decode_capture(&[0x54, 0xCD, 0x20], -70).unwrap_err();
//! assert_eq!(rejected.reason, RejectReason::TooShort);
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod instrumentation;
pub mod logging;
pub mod util;
pub mod wmbus;

pub use crate::config::{DecodePolicy, ReceiverConfig};
pub use crate::error::RxError;
pub use crate::logging::{init_logger, log_info};

// Core receive-path types
pub use wmbus::{
    CrcStripError, DecodeError, Dispatched, Frame, FrameFormat, LinkMode, Packet, RadioHandle,
    RejectReason, Rejected,
};
pub use wmbus::radio::{Capture, ReadySignal, ReplayTransceiver, Transceiver, TransceiverError};

// Diagnostics
pub use instrumentation::{Diagnostics, DiagnosticsSink, LogSink, RxStats};

/// Finalize one complete raw capture with the default policy.
///
/// # Arguments
/// * `raw` - Raw capture bytes as read from the radio
/// * `rssi` - Signal strength of the capture in dBm
///
/// # Returns
/// * `Ok(Frame)` - Validated, CRC-stripped telegram
/// * `Err(Rejected)` - Why the capture was dropped
pub fn decode_capture(raw: &[u8], rssi: i8) -> Result<Frame, Rejected> {
    decode_capture_with(raw, rssi, &DecodePolicy::default())
}

/// Finalize one complete raw capture with an explicit policy.
pub fn decode_capture_with(
    raw: &[u8],
    rssi: i8,
    policy: &DecodePolicy,
) -> Result<Frame, Rejected> {
    let mut packet = Packet::from_capture(raw.to_vec());
    packet.set_rssi(rssi);
    packet.finalize(policy)
}

/// Start receiving from a transceiver.
///
/// Spawns the acquisition worker on the current tokio runtime.
///
/// # Arguments
/// * `radio` - Transceiver to receive from
/// * `config` - Acquisition timing, queue size and decode policy
///
/// # Returns
/// * `Ok(RadioHandle)` - Dispatcher for the received telegrams
/// * `Err(RxError::Config)` - The configuration cannot drive the receiver
pub fn start_receiver<T>(radio: T, config: ReceiverConfig) -> error::Result<RadioHandle>
where
    T: Transceiver + 'static,
{
    RadioHandle::start(radio, config)
}
