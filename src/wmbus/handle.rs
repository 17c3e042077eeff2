//! # Radio Handle
//!
//! [`RadioHandle`] is the consumer side of the receive pipeline. It owns the
//! receiving end of the bounded packet queue, finalizes each packet and fans
//! accepted telegrams out to the registered handlers in registration order.
//! Rejected captures are counted in [`Diagnostics`] and never reach a
//! handler.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wmbus_rx::config::ReceiverConfig;
//! use wmbus_rx::wmbus::handle::RadioHandle;
//! use wmbus_rx::wmbus::radio::transceiver::ReplayTransceiver;
//!
//! # async fn run() {
//! let radio = ReplayTransceiver::new(Vec::new());
//! let mut handle = RadioHandle::start(radio, ReceiverConfig::default()).unwrap();
//! handle.add_frame_handler(|frame| {
//!     print!("{}", frame.as_rtlwmbus());
//!     frame.mark_handled();
//! });
//! handle.run_until_closed().await;
//! # }
//! ```

use crate::config::{DecodePolicy, ReceiverConfig};
use crate::error::Result;
use crate::instrumentation::stats::{
    snapshot_rx_stats, Diagnostics, DiagnosticsSink, RxStats, SharedRxStats,
};
use crate::util::logging::{log_frame_hex, LogThrottle};
use crate::wmbus::frame::Frame;
use crate::wmbus::packet::{Packet, Rejected};
use crate::wmbus::radio::transceiver::Transceiver;
use crate::wmbus::receiver::Receiver;
use log::{debug, info, warn};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Interval, MissedTickBehavior};

/// Telegram consumer. Must not keep the reference past the call.
pub type FrameHandler = Box<dyn Fn(&Frame) + Send + Sync>;

/// What happened to one dequeued packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// A telegram of `len` bytes went to the handlers
    Accepted { len: usize, handled: u32 },
    Rejected(Rejected),
}

/// Dispatcher for received telegrams
pub struct RadioHandle {
    queue: mpsc::Receiver<Packet>,
    handlers: Vec<FrameHandler>,
    policy: DecodePolicy,
    diagnostics: Diagnostics,
    throttle: LogThrottle,
    rx_stats: SharedRxStats,
    diag_interval: Duration,
    summary_tick: Option<Interval>,
    worker: Option<JoinHandle<()>>,
}

impl RadioHandle {
    /// Spawn the acquisition worker for `radio` and return its dispatcher.
    ///
    /// Must be called from within a tokio runtime. Fails without spawning
    /// anything when `config` does not validate.
    pub fn start<T>(radio: T, config: ReceiverConfig) -> Result<Self>
    where
        T: Transceiver + 'static,
    {
        config.validate()?;
        let (sender, queue) = mpsc::channel(config.queue_capacity);
        let receiver = Receiver::new(radio, sender, config.clone());
        let rx_stats = receiver.stats();

        let mut handle = Self::from_queue(queue, &config);
        handle.rx_stats = rx_stats;
        handle.worker = Some(tokio::spawn(receiver.run()));
        Ok(handle)
    }

    /// Dispatcher over an existing queue, without a worker
    pub fn from_queue(queue: mpsc::Receiver<Packet>, config: &ReceiverConfig) -> Self {
        Self {
            queue,
            handlers: Vec::new(),
            policy: config.policy.clone(),
            diagnostics: Diagnostics::new(config.diag_topic.clone(), config.diag_interval()),
            throttle: LogThrottle::new(config.log_throttle_window_ms, config.log_throttle_cap),
            rx_stats: SharedRxStats::default(),
            diag_interval: config.diag_interval(),
            summary_tick: None,
            worker: None,
        }
    }

    pub fn add_frame_handler<F>(&mut self, handler: F)
    where
        F: Fn(&Frame) + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
        debug!("Frame handler registered ({} total)", self.handlers.len());
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn set_diagnostics_sink(&mut self, sink: Box<dyn DiagnosticsSink>) {
        self.diagnostics.set_sink(sink);
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Snapshot of the acquisition worker's counters
    pub fn rx_stats(&self) -> RxStats {
        snapshot_rx_stats(&self.rx_stats)
    }

    /// Process at most one queued packet without waiting
    pub fn poll(&mut self) -> Option<Dispatched> {
        self.diagnostics.maybe_publish_summary(Instant::now());
        let packet = self.queue.try_recv().ok()?;
        Some(self.process_packet(packet))
    }

    /// Wait for the next packet and process it; `None` once the worker is gone.
    ///
    /// Summaries keep going out at the diagnostics interval while waiting, so
    /// a quiet band still reports.
    pub async fn next(&mut self) -> Option<Dispatched> {
        if self.summary_tick.is_none() && !self.diag_interval.is_zero() {
            self.diagnostics.maybe_publish_summary(Instant::now());
            let mut tick = time::interval_at(
                time::Instant::now() + self.diag_interval,
                self.diag_interval,
            );
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.summary_tick = Some(tick);
        }

        loop {
            let packet = match self.summary_tick.as_mut() {
                Some(tick) => tokio::select! {
                    packet = self.queue.recv() => packet?,
                    _ = tick.tick() => {
                        self.diagnostics.maybe_publish_summary(Instant::now());
                        continue;
                    }
                },
                None => self.queue.recv().await?,
            };
            self.diagnostics.maybe_publish_summary(Instant::now());
            return Some(self.process_packet(packet));
        }
    }

    /// Dispatch until the worker stops, then publish a final summary
    pub async fn run_until_closed(&mut self) {
        if self.handler_count() == 0 {
            warn!("No frame handlers registered, telegrams will only be counted");
        }
        while self.next().await.is_some() {}
        self.diagnostics.publish_summary();
    }

    /// Finalize one packet and dispatch or record it
    pub fn process_packet(&mut self, packet: Packet) -> Dispatched {
        match packet.finalize(&self.policy) {
            Ok(frame) => self.dispatch(frame),
            Err(rejected) => {
                self.report(&rejected);
                self.diagnostics.record_rejected(&rejected);
                Dispatched::Rejected(rejected)
            }
        }
    }

    fn dispatch(&mut self, frame: Frame) -> Dispatched {
        info!(
            "Have data ({} bytes) [RSSI: {}dBm, mode: {} {}]",
            frame.len(),
            frame.rssi(),
            frame.link_mode(),
            frame.format()
        );
        log_frame_hex("Telegram", frame.data());
        self.diagnostics.record_accepted();

        for handler in &self.handlers {
            handler(&frame);
        }

        let handled = frame.handled_count();
        if handled > 0 {
            info!("Telegram handled by {handled} handlers");
        } else {
            debug!("Telegram not handled by any handler");
        }

        Dispatched::Accepted {
            len: frame.len(),
            handled,
        }
    }

    fn report(&mut self, rejected: &Rejected) {
        if !self.throttle.allow() {
            return;
        }
        let suppressed = self.throttle.take_suppressed();
        let label = if rejected.is_truncated() {
            "TRUNCATED frame"
        } else {
            "DROPPED packet"
        };
        warn!(
            "{label}: reason={} mode={} want={} got={} raw_got={} RSSI={}dBm raw={}{}",
            rejected.reason,
            rejected.link_mode,
            rejected.want_len,
            rejected.got_len,
            rejected.raw_len,
            rejected.rssi,
            rejected.raw_hex,
            if suppressed > 0 {
                format!(" ({suppressed} similar suppressed)")
            } else {
                String::new()
            }
        );
    }

    /// Whether the acquisition worker has exited
    pub fn worker_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |worker| worker.is_finished())
    }

    /// Stop the acquisition worker
    pub async fn shutdown(mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
            let _ = worker.await;
        }
    }
}

impl Drop for RadioHandle {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wmbus::block::build_format_b;
    use crate::wmbus::packet::RejectReason;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn c1_format_b_capture() -> Vec<u8> {
        let mut telegram = vec![0x00, 0x44, 0x93, 0x15, 0x78, 0x56, 0x34, 0x12, 0x33, 0x03];
        telegram.extend_from_slice(&[0x7A, 0x2A, 0x00, 0x20, 0x05]);
        telegram[0] = (telegram.len() - 1) as u8;
        let mut raw = vec![0x54, 0x3D];
        raw.extend(build_format_b(&telegram));
        raw
    }

    fn handle() -> (mpsc::Sender<Packet>, RadioHandle) {
        let config = ReceiverConfig::default();
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        (tx, RadioHandle::from_queue(rx, &config))
    }

    #[test]
    fn test_handlers_run_in_order() {
        let (tx, mut handle) = handle();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for id in 0..3 {
            let order = Arc::clone(&order);
            handle.add_frame_handler(move |frame| {
                order.lock().unwrap().push(id);
                if id != 1 {
                    frame.mark_handled();
                }
            });
        }

        tx.try_send(Packet::from_capture(c1_format_b_capture())).unwrap();
        match handle.poll() {
            Some(Dispatched::Accepted { handled, .. }) => assert_eq!(handled, 2),
            other => panic!("unexpected dispatch: {other:?}"),
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(handle.diagnostics().accepted(), 1);
    }

    #[test]
    fn test_rejected_never_reaches_handlers() {
        let (tx, mut handle) = handle();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        handle.add_frame_handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tx.try_send(Packet::from_capture(vec![0x54, 0x99, 0x20])).unwrap();
        match handle.poll() {
            Some(Dispatched::Rejected(rejected)) => {
                assert_eq!(rejected.reason, RejectReason::TooShort)
            }
            other => panic!("unexpected dispatch: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(handle.diagnostics().dropped(), 1);
    }

    #[tokio::test]
    async fn test_run_without_handlers_still_counts() {
        let (tx, mut handle) = handle();
        assert_eq!(handle.handler_count(), 0);

        tx.try_send(Packet::from_capture(c1_format_b_capture())).unwrap();
        drop(tx);
        handle.run_until_closed().await;
        assert_eq!(handle.diagnostics().accepted(), 1);

        handle.add_frame_handler(|frame| frame.mark_handled());
        assert_eq!(handle.handler_count(), 1);
    }

    #[test]
    fn test_poll_on_empty_queue() {
        let (_tx, mut handle) = handle();
        assert!(handle.poll().is_none());
    }
}
