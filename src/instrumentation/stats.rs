//! # Receive Diagnostics and Statistics
//!
//! Two sets of counters describe the health of the receive path:
//!
//! - [`Diagnostics`] lives on the dispatch side. It counts accepted telegrams,
//!   truncated captures and every other dropped capture broken down by
//!   [`RejectReason`], emits one JSON event per rejected capture and a JSON
//!   summary at a fixed interval.
//! - [`RxStats`] lives on the acquisition side and counts cycles, radio
//!   timeouts, read failures and queue overflows.
//!
//! ## Record formats
//!
//! ```json
//! {"event":"summary","truncated":2,"dropped":5,"dropped_by_reason":{"too_short":1,...}}
//! {"event":"dropped","reason":"decode_failed","mode":"T1","rssi":-81,"want":0,"got":0,"raw_got":64}
//! ```
//!
//! Records go to a [`DiagnosticsSink`]; [`LogSink`] writes them to the log.

use crate::wmbus::packet::{RejectReason, Rejected};
use log::{info, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Destination for diagnostics records
pub trait DiagnosticsSink: Send {
    fn publish(&mut self, topic: &str, payload: &str);
}

/// Sink writing every record to the log at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticsSink for LogSink {
    fn publish(&mut self, topic: &str, payload: &str) {
        info!("{topic}: {payload}");
    }
}

/// Dropped-capture counters keyed by reason. Truncated captures are counted
/// separately and never land here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DroppedByReason {
    pub too_short: u64,
    pub decode_failed: u64,
    pub dll_crc_strip_failed: u64,
    pub unknown_preamble: u64,
    pub l_field_invalid: u64,
    pub unknown_link_mode: u64,
    pub other: u64,
}

impl DroppedByReason {
    fn slot(&mut self, reason: RejectReason) -> Option<&mut u64> {
        match reason {
            RejectReason::TooShort => Some(&mut self.too_short),
            RejectReason::DecodeFailed => Some(&mut self.decode_failed),
            RejectReason::DllCrcStripFailed => Some(&mut self.dll_crc_strip_failed),
            RejectReason::UnknownPreamble => Some(&mut self.unknown_preamble),
            RejectReason::LFieldInvalid => Some(&mut self.l_field_invalid),
            RejectReason::UnknownLinkMode => Some(&mut self.unknown_link_mode),
            RejectReason::Other => Some(&mut self.other),
            RejectReason::Truncated => None,
        }
    }

    pub fn get(&self, reason: RejectReason) -> u64 {
        let mut copy = *self;
        copy.slot(reason).map_or(0, |count| *count)
    }

    pub fn total(&self) -> u64 {
        self.too_short
            + self.decode_failed
            + self.dll_crc_strip_failed
            + self.unknown_preamble
            + self.l_field_invalid
            + self.unknown_link_mode
            + self.other
    }
}

/// Periodic summary record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagSummary {
    pub event: &'static str,
    pub truncated: u64,
    pub dropped: u64,
    pub dropped_by_reason: DroppedByReason,
}

/// Per-capture rejection record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagEvent {
    pub event: &'static str,
    pub reason: RejectReason,
    pub mode: &'static str,
    pub rssi: i8,
    pub want: usize,
    pub got: usize,
    pub raw_got: usize,
}

impl From<&Rejected> for DiagEvent {
    fn from(rejected: &Rejected) -> Self {
        Self {
            event: if rejected.is_truncated() {
                "truncated"
            } else {
                "dropped"
            },
            reason: rejected.reason,
            mode: rejected.link_mode.name(),
            rssi: rejected.rssi,
            want: rejected.want_len,
            got: rejected.got_len,
            raw_got: rejected.raw_len,
        }
    }
}

/// Dispatch-side diagnostics context
pub struct Diagnostics {
    topic: String,
    interval: Duration,
    accepted: u64,
    truncated: u64,
    dropped: u64,
    by_reason: DroppedByReason,
    last_summary: Option<Instant>,
    sink: Box<dyn DiagnosticsSink>,
}

impl Diagnostics {
    pub fn new(topic: impl Into<String>, interval: Duration) -> Self {
        Self {
            topic: topic.into(),
            interval,
            accepted: 0,
            truncated: 0,
            dropped: 0,
            by_reason: DroppedByReason::default(),
            last_summary: None,
            sink: Box::new(LogSink),
        }
    }

    pub fn set_sink(&mut self, sink: Box<dyn DiagnosticsSink>) {
        self.sink = sink;
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn truncated(&self) -> u64 {
        self.truncated
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn dropped_by_reason(&self) -> DroppedByReason {
        self.by_reason
    }

    pub fn record_accepted(&mut self) {
        self.accepted += 1;
    }

    /// Count a rejected capture and publish its event record
    pub fn record_rejected(&mut self, rejected: &Rejected) {
        if rejected.is_truncated() {
            self.truncated += 1;
        } else {
            self.dropped += 1;
            if let Some(count) = self.by_reason.slot(rejected.reason) {
                *count += 1;
            }
        }
        self.publish(&DiagEvent::from(rejected));
    }

    pub fn summary(&self) -> DiagSummary {
        DiagSummary {
            event: "summary",
            truncated: self.truncated,
            dropped: self.dropped,
            dropped_by_reason: self.by_reason,
        }
    }

    /// Publish the summary when the interval has elapsed.
    ///
    /// The first call only starts the interval clock.
    pub fn maybe_publish_summary(&mut self, now: Instant) -> bool {
        match self.last_summary {
            None => {
                self.last_summary = Some(now);
                false
            }
            Some(last) if now.saturating_duration_since(last) >= self.interval => {
                self.last_summary = Some(now);
                self.publish_summary();
                true
            }
            Some(_) => false,
        }
    }

    pub fn publish_summary(&mut self) {
        let summary = self.summary();
        self.publish(&summary);
    }

    fn publish<T: Serialize>(&mut self, record: &T) {
        match serde_json::to_string(record) {
            Ok(payload) => self.sink.publish(&self.topic, &payload),
            Err(e) => warn!("Failed to serialise diagnostics record: {e}"),
        }
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("topic", &self.topic)
            .field("accepted", &self.accepted)
            .field("truncated", &self.truncated)
            .field("dropped", &self.dropped)
            .field("by_reason", &self.by_reason)
            .finish_non_exhaustive()
    }
}

/// Acquisition-side counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RxStats {
    pub cycles: u64,
    pub timeouts: u64,
    pub header_read_failures: u64,
    pub body_read_failures: u64,
    pub unknown_length: u64,
    pub queue_full: u64,
    pub enqueued: u64,
}

/// Counters shared between the acquisition worker and its handle
pub type SharedRxStats = Arc<Mutex<RxStats>>;

/// Apply `update` to shared counters; a poisoned lock skips the update
pub fn update_rx_stats(stats: &SharedRxStats, update: impl FnOnce(&mut RxStats)) {
    if let Ok(mut guard) = stats.lock() {
        update(&mut guard);
    }
}

/// Copy of the current counters
pub fn snapshot_rx_stats(stats: &SharedRxStats) -> RxStats {
    stats.lock().map(|guard| *guard).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wmbus::link_mode::LinkMode;

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<(String, String)>>>);

    impl DiagnosticsSink for Collect {
        fn publish(&mut self, topic: &str, payload: &str) {
            self.0
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_string()));
        }
    }

    fn rejected(reason: RejectReason) -> Rejected {
        Rejected {
            reason,
            link_mode: LinkMode::T1,
            format: None,
            rssi: -81,
            want_len: 47,
            got_len: 42,
            raw_len: 64,
            raw_hex: String::new(),
        }
    }

    #[test]
    fn test_truncated_counted_separately() {
        let mut diag = Diagnostics::new("wmbus/diag", Duration::from_secs(60));
        diag.record_rejected(&rejected(RejectReason::Truncated));
        diag.record_rejected(&rejected(RejectReason::DecodeFailed));
        diag.record_rejected(&rejected(RejectReason::DecodeFailed));

        assert_eq!(diag.truncated(), 1);
        assert_eq!(diag.dropped(), 2);
        assert_eq!(diag.dropped_by_reason().get(RejectReason::DecodeFailed), 2);
        assert_eq!(diag.dropped_by_reason().get(RejectReason::Truncated), 0);
        assert_eq!(diag.dropped_by_reason().total(), diag.dropped());
    }

    #[test]
    fn test_event_record_json() {
        let sink = Collect::default();
        let mut diag = Diagnostics::new("wmbus/diag", Duration::from_secs(60));
        diag.set_sink(Box::new(sink.clone()));
        diag.record_rejected(&rejected(RejectReason::Truncated));

        let records = sink.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, "wmbus/diag");
        let value: serde_json::Value = serde_json::from_str(&records[0].1).unwrap();
        assert_eq!(value["event"], "truncated");
        assert_eq!(value["reason"], "truncated");
        assert_eq!(value["mode"], "T1");
        assert_eq!(value["rssi"], -81);
        assert_eq!(value["want"], 47);
        assert_eq!(value["got"], 42);
        assert_eq!(value["raw_got"], 64);
    }

    #[test]
    fn test_summary_interval() {
        let sink = Collect::default();
        let mut diag = Diagnostics::new("diag", Duration::from_secs(60));
        diag.set_sink(Box::new(sink.clone()));
        diag.record_rejected(&rejected(RejectReason::TooShort));
        sink.0.lock().unwrap().clear();

        let t0 = Instant::now();
        assert!(!diag.maybe_publish_summary(t0));
        assert!(!diag.maybe_publish_summary(t0 + Duration::from_secs(59)));
        assert!(diag.maybe_publish_summary(t0 + Duration::from_secs(60)));
        assert!(!diag.maybe_publish_summary(t0 + Duration::from_secs(61)));

        let records = sink.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&records[0].1).unwrap();
        assert_eq!(value["event"], "summary");
        assert_eq!(value["dropped"], 1);
        assert_eq!(value["dropped_by_reason"]["too_short"], 1);
        assert_eq!(value["dropped_by_reason"]["other"], 0);
    }

    #[test]
    fn test_shared_rx_stats() {
        let stats = SharedRxStats::default();
        update_rx_stats(&stats, |s| s.cycles += 2);
        update_rx_stats(&stats, |s| s.queue_full += 1);
        let snapshot = snapshot_rx_stats(&stats);
        assert_eq!(snapshot.cycles, 2);
        assert_eq!(snapshot.queue_full, 1);
    }
}
