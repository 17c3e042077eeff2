//! Receive-path instrumentation: dispatch diagnostics and acquisition
//! statistics.

pub mod stats;

pub use stats::{
    DiagEvent, DiagSummary, Diagnostics, DiagnosticsSink, DroppedByReason, LogSink, RxStats,
    SharedRxStats,
};
