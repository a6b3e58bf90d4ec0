//! Error classification for device communication.
//!
//! hidapi reports failures as platform-specific text. This module maps that
//! text onto the library's error taxonomy and gives the CLI a short hint for
//! each class. Nothing here retries: every write is attempted exactly once.

use crate::error::Error;
use crate::transport::Channel;
use tracing::debug;

/// Classification of communication errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Device is not connected.
    Disconnected,
    /// Another process holds the device, or access is denied.
    Busy,
    /// A read did not complete in time.
    Timeout,
    /// A write was rejected by the device or the driver.
    WriteFailed,
    /// The unlock handshake did not complete.
    Handshake,
    /// The profile or payload was rejected before any I/O.
    InvalidInput,
    /// Anything else.
    Other,
}

impl ErrorClass {
    /// Classify an error.
    pub fn classify(err: &Error) -> Self {
        match err.root() {
            Error::DeviceNotFound(_) => Self::Disconnected,
            Error::SessionBusy(_) => Self::Busy,
            Error::Timeout(_) => Self::Timeout,
            Error::TransportWriteFailed { .. } => Self::WriteFailed,
            Error::HandshakeFailed { .. } => Self::Handshake,
            Error::OversizeInput { .. }
            | Error::MacroTooLong { .. }
            | Error::InvalidProfile { .. }
            | Error::ForbiddenCommand(_)
            | Error::Config(_) => Self::InvalidInput,
            Error::Hid(msg) => Self::from_message(msg),
            Error::Aborted { .. } => Self::Other,
        }
    }

    /// Classify raw hidapi error text.
    pub fn from_message(msg: &str) -> Self {
        let lower = msg.to_lowercase();
        if lower.contains("disconnect")
            || lower.contains("not found")
            || lower.contains("no such device")
            || lower.contains("unable to open")
        {
            Self::Disconnected
        } else if lower.contains("permission")
            || lower.contains("access denied")
            || lower.contains("access is denied")
            || lower.contains("busy")
            || lower.contains("sharing violation")
            || lower.contains("being used by another process")
        {
            Self::Busy
        } else if lower.contains("timeout") || lower.contains("timed out") {
            Self::Timeout
        } else {
            Self::Other
        }
    }

    /// One-line advice for the user.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Disconnected => "check that the mouse is plugged in and the VID/PID are correct",
            Self::Busy => "close the vendor control application (and any other HID tool) and retry",
            Self::Timeout => "replug the mouse and retry the whole run",
            Self::WriteFailed => "replug the mouse and apply the profile again",
            Self::Handshake => "close the vendor application, replug the mouse and retry",
            Self::InvalidInput => "fix the profile or configuration file",
            Self::Other => "rerun with --verbose for details",
        }
    }
}

/// Map a hidapi open failure.
pub fn open_error(msg: &str, vid: u16, pid: u16) -> Error {
    let class = ErrorClass::from_message(msg);
    debug!(?class, error = msg, "Open failed");
    let what = format!("{vid:04X}:{pid:04X}: {msg}");
    match class {
        ErrorClass::Busy => Error::SessionBusy(what),
        ErrorClass::Disconnected => Error::DeviceNotFound(what),
        _ => Error::Hid(what),
    }
}

/// Map a hidapi write failure on `channel`.
pub fn write_error(channel: Channel, msg: &str) -> Error {
    match ErrorClass::from_message(msg) {
        ErrorClass::Disconnected => Error::DeviceNotFound(msg.to_string()),
        ErrorClass::Busy => Error::SessionBusy(msg.to_string()),
        _ => Error::TransportWriteFailed {
            channel,
            detail: msg.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::{DeviceState, FlashStep};

    #[test]
    fn classify_timeout() {
        let err = Error::Timeout("1s elapsed".into());
        assert_eq!(ErrorClass::classify(&err), ErrorClass::Timeout);
    }

    #[test]
    fn classify_disconnect() {
        let err = Error::DeviceNotFound("04D9:A09F".into());
        assert_eq!(ErrorClass::classify(&err), ErrorClass::Disconnected);
    }

    #[test]
    fn classify_hid_messages() {
        assert_eq!(
            ErrorClass::from_message("device disconnect detected"),
            ErrorClass::Disconnected
        );
        assert_eq!(ErrorClass::from_message("Access is denied"), ErrorClass::Busy);
        assert_eq!(
            ErrorClass::from_message("timed out waiting for response"),
            ErrorClass::Timeout
        );
        assert_eq!(ErrorClass::from_message("pipe error"), ErrorClass::Other);
    }

    #[test]
    fn classify_looks_through_aborts() {
        let err = Error::Aborted {
            step: FlashStep::Dpi,
            device_state: DeviceState::MayBeInconsistent,
            source: Box::new(Error::TransportWriteFailed {
                channel: Channel::Output,
                detail: "stall".into(),
            }),
        };
        assert_eq!(ErrorClass::classify(&err), ErrorClass::WriteFailed);
    }

    #[test]
    fn open_errors_map_to_taxonomy() {
        assert!(matches!(
            open_error("Access denied (insufficient permissions)", 0x04D9, 0xA09F),
            Error::SessionBusy(_)
        ));
        assert!(matches!(
            open_error("hid_open_path: device not found", 0x04D9, 0xA09F),
            Error::DeviceNotFound(_)
        ));
        assert!(matches!(open_error("weird", 0x04D9, 0xA09F), Error::Hid(_)));
    }

    #[test]
    fn write_errors_keep_channel() {
        match write_error(Channel::Feature, "pipe error") {
            Error::TransportWriteFailed { channel, .. } => assert_eq!(channel, Channel::Feature),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn hints_are_not_empty() {
        for class in [
            ErrorClass::Disconnected,
            ErrorClass::Busy,
            ErrorClass::Timeout,
            ErrorClass::WriteFailed,
            ErrorClass::Handshake,
            ErrorClass::InvalidInput,
            ErrorClass::Other,
        ] {
            assert!(!class.hint().is_empty());
        }
    }
}
