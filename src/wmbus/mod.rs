//! # Wireless M-Bus (wM-Bus) Module
//!
//! Link-layer receive path for wireless M-Bus: 3-of-6 line decoding, the
//! EN 13757 CRC, DLL block handling, the packet accumulator with its length
//! estimator, and the acquisition/dispatch pipeline around a transceiver.
//!
pub mod block;
pub mod crc;
pub mod encoding;
pub mod frame;
pub mod handle;
pub mod link_mode;
pub mod packet;
pub mod radio;
pub mod receiver;

// Re-export the necessary types and functions from the submodules
pub use block::CrcStripError;
pub use encoding::{decode_3of6, encode_3of6, DecodeError};
pub use frame::Frame;
pub use handle::{Dispatched, RadioHandle};
pub use link_mode::{FrameFormat, LinkMode};
pub use packet::{Packet, RejectReason, Rejected};
pub use receiver::{CycleOutcome, Receiver};
