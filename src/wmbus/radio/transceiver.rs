//! # Transceiver Abstraction
//!
//! The acquisition worker only needs four things from a radio: restart
//! reception, poll the FIFO one byte at a time, read the RSSI of the current
//! capture, and a [`ReadySignal`] the radio raises when data starts arriving.
//! [`Transceiver`] captures exactly that so the worker runs unchanged on real
//! hardware, in tests and in the CLI replay.
//!
//! [`ReplayTransceiver`] plays back recorded captures. Each restart of
//! reception loads the next capture and raises the ready signal; once the
//! recording is drained the transceiver either stays silent or reports
//! [`TransceiverError::Closed`].
//!
//! ## Capture files
//!
//! One capture per line, optionally prefixed with its RSSI in dBm:
//!
//! ```text
//! # comment
//! -71 2e44931578563412330333637a2a0020
//! 543d2e44...
//! ```

use crate::error::{self, RxError};
use crate::util::hex::decode_hex;
use crate::wmbus::radio::irq::ReadySignal;
use async_trait::async_trait;
use bytes::{Buf, Bytes};
use log::trace;
use nom::bytes::complete::tag;
use nom::character::complete::{hex_digit1, i8 as parse_i8, space0, space1};
use nom::combinator::{all_consuming, opt};
use nom::sequence::{preceded, terminated};
use nom::IResult;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Pause between FIFO polls while a read is waiting for bytes
const READ_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Errors reported by a transceiver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransceiverError {
    /// Hardware or bus failure
    #[error("HAL error: {0}")]
    Hal(String),
    /// No byte arrived within the read timeout
    #[error("Read timeout after {read} of {wanted} bytes")]
    Timeout { read: usize, wanted: usize },
    /// The radio is gone; no further captures will arrive
    #[error("Transceiver closed")]
    Closed,
}

/// Radio operations used by the acquisition worker
#[async_trait]
pub trait Transceiver: Send {
    /// Short name for log lines
    fn name(&self) -> &str;

    /// Signal raised by the radio when a capture starts arriving
    fn ready_signal(&self) -> Arc<ReadySignal>;

    /// Restart reception, discarding any partially received capture
    async fn restart_rx(&mut self) -> Result<(), TransceiverError>;

    /// Take one byte from the receive FIFO if available
    async fn read_byte(&mut self) -> Result<Option<u8>, TransceiverError>;

    /// RSSI of the current capture in dBm
    async fn rssi(&mut self) -> Result<i8, TransceiverError>;

    /// Fill `buf` from the FIFO.
    ///
    /// Fails with [`TransceiverError::Timeout`] when no byte arrives for
    /// `gap_timeout`.
    async fn read_exact(
        &mut self,
        buf: &mut [u8],
        gap_timeout: Duration,
    ) -> Result<(), TransceiverError> {
        let wanted = buf.len();
        let mut filled = 0;
        let mut deadline = tokio::time::Instant::now() + gap_timeout;

        while filled < wanted {
            match self.read_byte().await? {
                Some(byte) => {
                    buf[filled] = byte;
                    filled += 1;
                    deadline = tokio::time::Instant::now() + gap_timeout;
                }
                None => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(TransceiverError::Timeout {
                            read: filled,
                            wanted,
                        });
                    }
                    tokio::time::sleep(READ_POLL_INTERVAL).await;
                }
            }
        }
        Ok(())
    }
}

/// One recorded radio capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub data: Bytes,
    pub rssi: i8,
    /// Listen windows that pass in silence before this capture arrives
    pub idle_windows: u32,
}

impl Capture {
    pub fn new(data: impl Into<Bytes>, rssi: i8) -> Self {
        Self {
            data: data.into(),
            rssi,
            idle_windows: 0,
        }
    }

    /// Delay the capture by `windows` silent listen windows
    pub fn after_idle_windows(mut self, windows: u32) -> Self {
        self.idle_windows = windows;
        self
    }
}

/// In-memory transceiver playing back recorded captures
#[derive(Debug)]
pub struct ReplayTransceiver {
    pending: VecDeque<Capture>,
    current: Option<Capture>,
    signal: Arc<ReadySignal>,
    close_when_drained: bool,
    pacing: Duration,
}

impl ReplayTransceiver {
    /// Replay `captures`, reporting `Closed` once they are exhausted
    pub fn new(captures: impl IntoIterator<Item = Capture>) -> Self {
        Self {
            pending: captures.into_iter().collect(),
            current: None,
            signal: Arc::new(ReadySignal::new()),
            close_when_drained: true,
            pacing: Duration::ZERO,
        }
    }

    /// Leave `gap` of air time before each capture arrives
    pub fn with_pacing(mut self, gap: Duration) -> Self {
        self.pacing = gap;
        self
    }

    /// Keep listening in silence after the last capture instead of closing
    pub fn keep_open(mut self) -> Self {
        self.close_when_drained = false;
        self
    }

    pub fn push(&mut self, capture: Capture) {
        self.pending.push_back(capture);
    }

    /// Captures not yet delivered
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl Transceiver for ReplayTransceiver {
    fn name(&self) -> &str {
        "replay"
    }

    fn ready_signal(&self) -> Arc<ReadySignal> {
        Arc::clone(&self.signal)
    }

    async fn restart_rx(&mut self) -> Result<(), TransceiverError> {
        self.current = None;

        let Some(next) = self.pending.front_mut() else {
            return if self.close_when_drained {
                Err(TransceiverError::Closed)
            } else {
                Ok(())
            };
        };

        if next.idle_windows > 0 {
            next.idle_windows -= 1;
            return Ok(());
        }

        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }

        self.current = self.pending.pop_front();
        if let Some(capture) = &self.current {
            trace!("replay: capture of {} bytes arriving", capture.data.len());
        }
        self.signal.raise();
        Ok(())
    }

    async fn read_byte(&mut self) -> Result<Option<u8>, TransceiverError> {
        Ok(self
            .current
            .as_mut()
            .filter(|capture| capture.data.has_remaining())
            .map(|capture| capture.data.get_u8()))
    }

    async fn rssi(&mut self) -> Result<i8, TransceiverError> {
        Ok(self.current.as_ref().map_or(0, |capture| capture.rssi))
    }
}

fn capture_line(input: &str) -> IResult<&str, (Option<i8>, &str)> {
    let (input, _) = space0(input)?;
    let (input, rssi) = opt(terminated(parse_i8, space1))(input)?;
    let (input, hex) = preceded(opt(tag("0x")), hex_digit1)(input)?;
    let (input, _) = space0(input)?;
    Ok((input, (rssi, hex)))
}

/// Parse one `"[<rssi>] <hex>"` capture line
pub fn parse_capture_line(line: &str) -> error::Result<Capture> {
    parse_numbered_line(line, 1)
}

fn parse_numbered_line(line: &str, number: usize) -> error::Result<Capture> {
    let (_, (rssi, hex)) = all_consuming(capture_line)(line).map_err(|e| RxError::Parse {
        line: number,
        message: e.to_string(),
    })?;
    let data = decode_hex(hex).map_err(|e| RxError::Parse {
        line: number,
        message: e.to_string(),
    })?;
    Ok(Capture::new(data, rssi.unwrap_or(0)))
}

/// Parse a capture file; blank lines and `#` comments are skipped
pub fn parse_capture_file(text: &str) -> error::Result<Vec<Capture>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| parse_numbered_line(line, index + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replay_delivers_bytes_and_rssi() {
        let mut radio = ReplayTransceiver::new([Capture::new(vec![0x54, 0xCD], -70)]);
        let signal = radio.ready_signal();

        radio.restart_rx().await.unwrap();
        assert!(signal.wait(Duration::from_millis(5)).await);
        assert_eq!(radio.read_byte().await.unwrap(), Some(0x54));
        assert_eq!(radio.read_byte().await.unwrap(), Some(0xCD));
        assert_eq!(radio.read_byte().await.unwrap(), None);
        assert_eq!(radio.rssi().await.unwrap(), -70);

        assert_eq!(radio.restart_rx().await, Err(TransceiverError::Closed));
    }

    #[tokio::test]
    async fn test_idle_windows_delay_signal() {
        let mut radio =
            ReplayTransceiver::new([Capture::new(vec![0x01], -80).after_idle_windows(2)]);
        let signal = radio.ready_signal();

        radio.restart_rx().await.unwrap();
        radio.restart_rx().await.unwrap();
        assert_eq!(signal.raised_count(), 0);
        radio.restart_rx().await.unwrap();
        assert_eq!(signal.raised_count(), 1);
        assert_eq!(radio.remaining(), 0);
    }

    #[tokio::test]
    async fn test_keep_open_stays_silent() {
        let mut radio = ReplayTransceiver::new(Vec::new()).keep_open();
        assert!(radio.restart_rx().await.is_ok());
        assert_eq!(radio.read_byte().await.unwrap(), None);
        assert_eq!(radio.rssi().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_exact_times_out_on_short_capture() {
        let mut radio = ReplayTransceiver::new([Capture::new(vec![0xAA, 0xBB], -60)]);
        radio.restart_rx().await.unwrap();

        let mut buf = [0u8; 4];
        let err = radio
            .read_exact(&mut buf, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err, TransceiverError::Timeout { read: 2, wanted: 4 });
        assert_eq!(&buf[..2], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_parse_capture_lines() {
        let capture = parse_capture_line("-71 54cd0a").unwrap();
        assert_eq!(capture.rssi, -71);
        assert_eq!(capture.data.as_ref(), &[0x54, 0xCD, 0x0A]);

        let capture = parse_capture_line("  0x543D ").unwrap();
        assert_eq!(capture.rssi, 0);
        assert_eq!(capture.data.as_ref(), &[0x54, 0x3D]);
    }

    #[test]
    fn test_parse_capture_file_reports_line() {
        let text = "# recorded\n-60 5444\n\n-61 zz\n";
        match parse_capture_file(text) {
            Err(RxError::Parse { line, .. }) => assert_eq!(line, 4),
            other => panic!("unexpected result: {other:?}"),
        }

        let captures = parse_capture_file("# recorded\n-60 5444\n\n12 abcd\n").unwrap();
        assert_eq!(captures.len(), 2);
        assert_eq!(captures[1].rssi, 12);
    }
}
