//! Error types for armor-flash-core.

use crate::flash::{DeviceState, FlashStep};
use crate::session::SessionState;
use crate::transport::Channel;
use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// No HID device with the configured VID/PID.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The device handle is held by another process.
    #[error("device busy: {0} (close the vendor control application and retry)")]
    SessionBusy(String),

    /// A frame or payload send returned a failure status.
    #[error("{channel} report write failed: {detail}")]
    TransportWriteFailed { channel: Channel, detail: String },

    /// The unlock sequence did not reach `Unlocked`.
    #[error("handshake failed in state {state}: {reason}")]
    HandshakeFailed { state: SessionState, reason: String },

    /// A payload or command body exceeds its fixed size.
    #[error("input too large: {len} bytes (max {max})")]
    OversizeInput { len: usize, max: usize },

    /// The encoded macro does not fit the 128-byte blob.
    #[error("macro too long: {actions} actions (max {max})")]
    MacroTooLong { actions: usize, max: usize },

    /// Profile validation failed. No device I/O has happened.
    #[error("invalid profile: {field}: {reason}")]
    InvalidProfile { field: &'static str, reason: String },

    /// Frame opcode is not in the allowed command set.
    #[error("command opcode 0x{0:02X} is not allowed")]
    ForbiddenCommand(u8),

    /// Uncategorized HID failure.
    #[error("HID error: {0}")]
    Hid(String),

    /// Operation timed out.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Configuration or profile file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// A flashing run stopped at `step`.
    #[error("{step} failed, device {device_state}: {source}")]
    Aborted {
        step: FlashStep,
        device_state: DeviceState,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// What the caller may assume about the device after this error.
    ///
    /// Errors raised outside a flashing run never touched the device.
    pub fn device_state(&self) -> DeviceState {
        match self {
            Self::Aborted { device_state, .. } => *device_state,
            _ => DeviceState::Unchanged,
        }
    }

    /// The innermost error, skipping `Aborted` wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Self::Aborted { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_unwraps_nested_aborts() {
        let err = Error::Aborted {
            step: FlashStep::Colors,
            device_state: DeviceState::MayBeInconsistent,
            source: Box::new(Error::TransportWriteFailed {
                channel: Channel::Output,
                detail: "stall".into(),
            }),
        };
        assert!(matches!(err.root(), Error::TransportWriteFailed { .. }));
        assert_eq!(err.device_state(), DeviceState::MayBeInconsistent);
    }

    #[test]
    fn plain_errors_leave_device_unchanged() {
        let err = Error::InvalidProfile {
            field: "dpi_stages",
            reason: "450 is not a multiple of 100".into(),
        };
        assert_eq!(err.device_state(), DeviceState::Unchanged);
    }
}
