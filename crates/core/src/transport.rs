//! HID transport abstraction for device communication.
//!
//! The mouse exposes two channels: 8-byte feature reports carry command
//! frames (and the one handshake confirmation read), 32-byte output reports
//! carry sector data. Real devices and the recording mock share the
//! [`DeviceTransport`] trait so the session and flash logic never see hidapi.

use crate::error::{Error, Result};
use crate::packet::{self, CHUNK_LEN, COMMAND_LEN};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tracing::trace;

/// Which HID channel a write went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Feature,
    Output,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feature => f.write_str("feature"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Abstraction over the device's two report channels.
pub trait DeviceTransport: Send {
    /// Send one 8-byte feature report.
    fn send_feature(&self, frame: &[u8; COMMAND_LEN]) -> Result<()>;

    /// Read one 8-byte feature report, bounded by `timeout`.
    fn read_feature(&self, timeout: Duration) -> Result<[u8; COMMAND_LEN]>;

    /// Write one 32-byte output report.
    fn write_output(&self, chunk: &[u8; CHUNK_LEN]) -> Result<()>;

    /// Block between writes. The device drops frames sent back to back.
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// One transport call, as seen by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Feature([u8; COMMAND_LEN]),
    FeatureRead,
    Output([u8; CHUNK_LEN]),
    Pause(Duration),
}

impl Event {
    /// One-line rendering used by `--dry-run`.
    pub fn describe(&self) -> String {
        match self {
            Self::Feature(frame) => format!("feature  {}", packet::to_hex(frame)),
            Self::FeatureRead => "read     feature report".to_string(),
            Self::Output(chunk) => format!("output   {}", packet::to_hex(chunk)),
            Self::Pause(d) => format!("wait     {} ms", d.as_millis()),
        }
    }
}

#[derive(Debug, Default)]
struct Recording {
    events: Vec<Event>,
    features_sent: usize,
    outputs_sent: usize,
}

/// A transport that records every call and never sleeps.
///
/// Used by the tests and by the CLI's dry-run mode. Failures can be injected
/// on the n-th feature or output write, and the confirmation read can be
/// made to time out.
#[derive(Debug)]
pub struct RecordingTransport {
    state: Mutex<Recording>,
    confirmation: Option<[u8; COMMAND_LEN]>,
    fail_feature_at: Option<usize>,
    fail_output_at: Option<usize>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    /// A device that accepts everything and answers the handshake read.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Recording::default()),
            confirmation: Some([0u8; COMMAND_LEN]),
            fail_feature_at: None,
            fail_output_at: None,
        }
    }

    /// Make the confirmation read time out.
    pub fn without_confirmation(mut self) -> Self {
        self.confirmation = None;
        self
    }

    /// Fail the `n`-th feature write (0-based).
    pub fn fail_feature_at(mut self, n: usize) -> Self {
        self.fail_feature_at = Some(n);
        self
    }

    /// Fail the `n`-th output write (0-based).
    pub fn fail_output_at(mut self, n: usize) -> Self {
        self.fail_output_at = Some(n);
        self
    }

    /// Everything recorded so far.
    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    /// Recorded feature frames, in order.
    pub fn feature_frames(&self) -> Vec<[u8; COMMAND_LEN]> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Feature(f) => Some(*f),
                _ => None,
            })
            .collect()
    }

    /// Recorded output chunks, in order.
    pub fn output_chunks(&self) -> Vec<[u8; CHUNK_LEN]> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Output(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recording> {
        // A poisoned lock only means another test thread panicked mid-record.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DeviceTransport for RecordingTransport {
    fn send_feature(&self, frame: &[u8; COMMAND_LEN]) -> Result<()> {
        let mut rec = self.lock();
        let index = rec.features_sent;
        rec.features_sent += 1;
        if self.fail_feature_at == Some(index) {
            return Err(Error::TransportWriteFailed {
                channel: Channel::Feature,
                detail: format!("injected failure on feature write {index}"),
            });
        }
        trace!(frame = %packet::to_hex(frame), "mock feature TX");
        rec.events.push(Event::Feature(*frame));
        Ok(())
    }

    fn read_feature(&self, timeout: Duration) -> Result<[u8; COMMAND_LEN]> {
        let mut rec = self.lock();
        rec.events.push(Event::FeatureRead);
        self.confirmation.ok_or_else(|| {
            Error::Timeout(format!(
                "no feature report within {} ms",
                timeout.as_millis()
            ))
        })
    }

    fn write_output(&self, chunk: &[u8; CHUNK_LEN]) -> Result<()> {
        let mut rec = self.lock();
        let index = rec.outputs_sent;
        rec.outputs_sent += 1;
        if self.fail_output_at == Some(index) {
            return Err(Error::TransportWriteFailed {
                channel: Channel::Output,
                detail: format!("injected failure on output write {index}"),
            });
        }
        rec.events.push(Event::Output(*chunk));
        Ok(())
    }

    fn pause(&self, duration: Duration) {
        self.lock().events.push(Event::Pause(duration));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order() {
        let mock = RecordingTransport::new();
        mock.send_feature(&[1; COMMAND_LEN]).unwrap();
        mock.pause(Duration::from_millis(10));
        mock.write_output(&[2; CHUNK_LEN]).unwrap();
        assert_eq!(
            mock.events(),
            vec![
                Event::Feature([1; COMMAND_LEN]),
                Event::Pause(Duration::from_millis(10)),
                Event::Output([2; CHUNK_LEN]),
            ]
        );
        assert_eq!(mock.feature_frames().len(), 1);
        assert_eq!(mock.output_chunks().len(), 1);
    }

    #[test]
    fn injected_failures_are_not_recorded() {
        let mock = RecordingTransport::new().fail_output_at(1);
        mock.write_output(&[0; CHUNK_LEN]).unwrap();
        let err = mock.write_output(&[0; CHUNK_LEN]).unwrap_err();
        assert!(matches!(
            err,
            Error::TransportWriteFailed {
                channel: Channel::Output,
                ..
            }
        ));
        assert_eq!(mock.output_chunks().len(), 1);
    }

    #[test]
    fn missing_confirmation_times_out() {
        let mock = RecordingTransport::new().without_confirmation();
        let err = mock.read_feature(Duration::from_millis(1000)).unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(mock.events(), vec![Event::FeatureRead]);
    }

    #[test]
    fn describe_renders_hex() {
        let mut frame = [0u8; COMMAND_LEN];
        frame[0] = 0x08;
        assert_eq!(Event::Feature(frame).describe(), "feature  0800000000000000");
        assert_eq!(Event::Pause(Duration::from_millis(1500)).describe(), "wait     1500 ms");
    }
}
