//! Radio boundary: the transceiver operations the receiver depends on and
//! the data-ready signal raised from the radio's interrupt path.

pub mod irq;
pub mod transceiver;

pub use irq::ReadySignal;
pub use transceiver::{Capture, ReplayTransceiver, Transceiver, TransceiverError};
