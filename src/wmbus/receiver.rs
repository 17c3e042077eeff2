//! # Acquisition Worker
//!
//! The receiver runs one capture per cycle:
//!
//! 1. Listen in short windows, restarting RX before each one, until the radio
//!    raises its ready signal or the total wait runs out. Restarting
//!    re-aligns bit sync, which catches more telegrams than one long wait.
//! 2. Read the 3-byte header and ask the [`Packet`] how long the capture is.
//! 3. Read the remainder, attach the RSSI and hand the packet to the
//!    dispatcher over a bounded queue.
//!
//! The queue never blocks the worker: when it is full the newest packet is
//! dropped. Read failures abort the cycle without producing a packet.

use crate::config::ReceiverConfig;
use crate::constants::WMBUS_PREAMBLE_SIZE;
use crate::instrumentation::stats::{
    snapshot_rx_stats, update_rx_stats, RxStats, SharedRxStats,
};
use crate::log_warn_throttled;
use crate::util::logging::LogThrottle;
use crate::wmbus::packet::Packet;
use crate::wmbus::radio::irq::ReadySignal;
use crate::wmbus::radio::transceiver::{Transceiver, TransceiverError};
use log::{debug, info, trace};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Result of one acquisition cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A packet of `len` raw bytes was queued
    Enqueued { len: usize },
    /// No ready signal within the total wait
    Timeout,
    HeaderReadFailed,
    BodyReadFailed,
    /// The header did not yield a capture length
    UnknownLength,
    /// The queue was full; the packet was dropped
    QueueFull,
    /// The dispatcher is gone
    QueueClosed,
}

/// Acquisition worker owning the transceiver and the queue producer
pub struct Receiver<T: Transceiver> {
    radio: T,
    signal: Arc<ReadySignal>,
    queue: mpsc::Sender<Packet>,
    config: ReceiverConfig,
    stats: SharedRxStats,
    throttle: LogThrottle,
}

impl<T: Transceiver> Receiver<T> {
    pub fn new(radio: T, queue: mpsc::Sender<Packet>, config: ReceiverConfig) -> Self {
        let signal = radio.ready_signal();
        let throttle = LogThrottle::new(config.log_throttle_window_ms, config.log_throttle_cap);
        Self {
            radio,
            signal,
            queue,
            config,
            stats: SharedRxStats::default(),
            throttle,
        }
    }

    /// Counters shared with observers
    pub fn stats(&self) -> SharedRxStats {
        Arc::clone(&self.stats)
    }

    pub fn stats_snapshot(&self) -> RxStats {
        snapshot_rx_stats(&self.stats)
    }

    /// Ping-pong listen windows until data is signalled or the wait expires
    async fn wait_for_data(&mut self) -> Result<bool, TransceiverError> {
        let window = self.config.listen_window();
        let total = self.config.total_wait();
        let mut waited = Duration::ZERO;

        loop {
            self.radio.restart_rx().await?;
            if self.signal.wait(window).await {
                return Ok(true);
            }
            waited += window;
            if waited >= total {
                return Ok(false);
            }
        }
    }

    /// Run one acquisition cycle.
    ///
    /// Only a closed or failing transceiver is an error; everything else is
    /// reported as a [`CycleOutcome`].
    pub async fn receive_frame(&mut self) -> Result<CycleOutcome, TransceiverError> {
        update_rx_stats(&self.stats, |s| s.cycles += 1);

        if !self.wait_for_data().await? {
            debug!("Radio interrupt timeout");
            update_rx_stats(&self.stats, |s| s.timeouts += 1);
            return Ok(CycleOutcome::Timeout);
        }

        let gap = self.config.read_timeout();
        let mut packet = Packet::new();

        if let Err(err) = self
            .radio
            .read_exact(packet.append_space(WMBUS_PREAMBLE_SIZE), gap)
            .await
        {
            if err == TransceiverError::Closed {
                return Err(err);
            }
            trace!("Failed to read preamble: {err}");
            update_rx_stats(&self.stats, |s| s.header_read_failures += 1);
            return Ok(CycleOutcome::HeaderReadFailed);
        }

        let total = packet.expected_size();
        if total == 0 {
            debug!("Cannot calculate payload size");
            update_rx_stats(&self.stats, |s| s.unknown_length += 1);
            return Ok(CycleOutcome::UnknownLength);
        }

        let remaining = total.saturating_sub(WMBUS_PREAMBLE_SIZE);
        if remaining > 0 {
            if let Err(err) = self
                .radio
                .read_exact(packet.append_space(remaining), gap)
                .await
            {
                if err == TransceiverError::Closed {
                    return Err(err);
                }
                trace!("Failed to read data: {err}");
                update_rx_stats(&self.stats, |s| s.body_read_failures += 1);
                return Ok(CycleOutcome::BodyReadFailed);
            }
        }

        match self.radio.rssi().await {
            Ok(rssi) => packet.set_rssi(rssi),
            Err(err) => debug!("RSSI unavailable: {err}"),
        }

        let len = packet.len();
        match self.queue.try_send(packet) {
            Ok(()) => {
                update_rx_stats(&self.stats, |s| s.enqueued += 1);
                Ok(CycleOutcome::Enqueued { len })
            }
            Err(TrySendError::Full(dropped)) => {
                log_warn_throttled!(
                    self.throttle,
                    "Queue send failed, dropping {} byte packet",
                    dropped.len()
                );
                update_rx_stats(&self.stats, |s| s.queue_full += 1);
                Ok(CycleOutcome::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Ok(CycleOutcome::QueueClosed),
        }
    }

    /// Run cycles until the transceiver closes or the dispatcher goes away
    pub async fn run(mut self) {
        info!("Receiver started on {} transceiver", self.radio.name());

        loop {
            match self.receive_frame().await {
                Ok(CycleOutcome::QueueClosed) => {
                    debug!("Dispatch queue closed, stopping receiver");
                    break;
                }
                Ok(outcome) => trace!("Cycle finished: {outcome:?}"),
                Err(TransceiverError::Closed) => {
                    info!("Transceiver closed, stopping receiver");
                    break;
                }
                Err(err) => {
                    log_warn_throttled!(self.throttle, "Transceiver error: {err}");
                    tokio::time::sleep(self.config.listen_window()).await;
                }
            }
        }
    }
}
