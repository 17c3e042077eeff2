//! # Receive-Ready Signal
//!
//! The radio raises a data-ready edge from interrupt context; the acquisition
//! worker waits for it with a timeout. [`ReadySignal`] wraps a single
//! [`tokio::sync::Notify`] permit: raising it never blocks or allocates, and
//! several raises before a wait collapse into one wake-up.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use wmbus_rx::wmbus::radio::irq::ReadySignal;
//!
//! # tokio_test::block_on(async {
//! let signal = ReadySignal::new();
//! signal.raise();
//! assert!(signal.wait(Duration::from_millis(10)).await);
//! assert!(!signal.wait(Duration::from_millis(10)).await);
//! # });
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Edge-triggered data-ready notification between the radio and the worker
#[derive(Debug, Default)]
pub struct ReadySignal {
    notify: Notify,
    raised: AtomicU64,
}

impl ReadySignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Safe to call from any thread, never blocks.
    pub fn raise(&self) {
        self.raised.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
    }

    /// Wait up to `timeout` for a raise, consuming it.
    ///
    /// Returns `false` when the window elapsed without a signal.
    pub async fn wait(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.notify.notified())
            .await
            .is_ok()
    }

    /// Total raises since creation
    pub fn raised_count(&self) -> u64 {
        self.raised.load(Ordering::Relaxed)
    }
}
