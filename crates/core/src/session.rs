//! Device session and the unlock handshake state machine.
//!
//! ```text
//! Idle → Stopped → PasswordSent → HandshakeInitiated → AwaitingConfirmation
//!      → Triggered → Unlocked → (sector writes) → Committed
//! ```
//!
//! Each transition sends its frame, then waits the inter-frame delay. A
//! failure anywhere in the handshake puts the session back in `Idle`; there
//! is nothing to resume.

use crate::config::TimingConfig;
use crate::error::{Error, Result};
use crate::packet::{self, opcodes, CommandFrame, CHUNK_LEN};
use crate::safety;
use crate::sectors;
use crate::transport::DeviceTransport;
use std::fmt;
use tracing::{debug, info, trace, warn};

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Stopped,
    PasswordSent,
    HandshakeInitiated,
    AwaitingConfirmation,
    Triggered,
    Unlocked,
    /// Sectors sealed; runtime registers may now be written.
    Committed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Stopped => "Stopped",
            Self::PasswordSent => "PasswordSent",
            Self::HandshakeInitiated => "HandshakeInitiated",
            Self::AwaitingConfirmation => "AwaitingConfirmation",
            Self::Triggered => "Triggered",
            Self::Unlocked => "Unlocked",
            Self::Committed => "Committed",
        };
        f.write_str(name)
    }
}

/// An exclusive channel to one mouse.
///
/// All operations take `&mut self`, so one session cannot be driven from two
/// places at once. Another process holding the device (the vendor
/// application) cannot be detected and must be closed by the caller.
pub struct DeviceSession<T: DeviceTransport> {
    transport: T,
    timing: TimingConfig,
    state: SessionState,
    frames_sent: usize,
    payloads_sent: usize,
    flash_writes: usize,
}

/// The built stop frame that opens the handshake.
pub fn stop_frame() -> Result<CommandFrame> {
    packet::build_command(opcodes::STOP, &sectors::STOP_PARAMS)
}

impl<T: DeviceTransport> DeviceSession<T> {
    pub fn new(transport: T, timing: TimingConfig) -> Self {
        Self {
            transport,
            timing,
            state: SessionState::Idle,
            frames_sent: 0,
            payloads_sent: 0,
            flash_writes: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Feature frames sent so far.
    pub fn frames_sent(&self) -> usize {
        self.frames_sent
    }

    /// Output payloads sent so far.
    pub fn payloads_sent(&self) -> usize {
        self.payloads_sent
    }

    /// Writes that reached the device while flash was open.
    pub fn flash_writes(&self) -> usize {
        self.flash_writes
    }

    /// Run the unlock handshake. Must start from `Idle`.
    pub fn unlock(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(Error::HandshakeFailed {
                state: self.state,
                reason: "handshake must start from Idle".to_string(),
            });
        }

        info!("Unlocking device");
        match self.run_handshake() {
            Ok(()) => {
                info!("Device unlocked");
                Ok(())
            }
            Err(e) => {
                let state = self.state;
                warn!(%state, error = %e, "Handshake failed, session reset");
                self.state = SessionState::Idle;
                Err(match e {
                    already @ Error::HandshakeFailed { .. } => already,
                    other => Error::HandshakeFailed {
                        state,
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    fn run_handshake(&mut self) -> Result<()> {
        self.send_command(&stop_frame()?)?;
        self.advance(SessionState::Stopped);

        self.send_command(&sectors::UNLOCK_PASSWORD)?;
        self.advance(SessionState::PasswordSent);

        self.send_command(&sectors::HANDSHAKE_START)?;
        self.advance(SessionState::HandshakeInitiated);

        self.advance(SessionState::AwaitingConfirmation);
        let reply = self.transport.read_feature(self.timing.confirm_timeout)?;
        trace!(reply = %packet::to_hex(&reply), "Handshake confirmation");

        for trigger in &sectors::TRIGGERS {
            self.send_command(trigger)?;
        }
        self.advance(SessionState::Triggered);

        self.advance(SessionState::Unlocked);
        Ok(())
    }

    fn advance(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "Session state");
        self.state = next;
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.advance(state);
    }

    /// Send one command frame, then wait the inter-frame delay.
    pub(crate) fn send_command(&mut self, frame: &CommandFrame) -> Result<()> {
        safety::validate_frame(frame)?;
        debug!(
            opcode = format_args!("0x{:02X}", frame.opcode()),
            frame = %frame,
            "Feature TX"
        );
        self.transport.send_feature(frame.bytes())?;
        self.frames_sent += 1;
        if self.state == SessionState::Unlocked {
            self.flash_writes += 1;
        }
        self.transport.pause(self.timing.inter_frame_delay);
        Ok(())
    }

    /// Zero-pad `bytes` to one output report, send it, then wait.
    pub(crate) fn send_payload(&mut self, bytes: &[u8]) -> Result<()> {
        let padded = packet::build_payload(bytes, CHUNK_LEN)?;
        let mut chunk = [0u8; CHUNK_LEN];
        chunk.copy_from_slice(&padded);
        trace!(len = bytes.len(), payload = %packet::to_hex(&chunk), "Output TX");
        self.transport.write_output(&chunk)?;
        self.payloads_sent += 1;
        if self.state == SessionState::Unlocked {
            self.flash_writes += 1;
        }
        self.transport.pause(self.timing.inter_frame_delay);
        Ok(())
    }

    /// Drop back to `Idle` after a fatal error. The next run starts over.
    pub fn reset(&mut self) {
        if self.state != SessionState::Idle {
            debug!(from = %self.state, "Session reset");
        }
        self.state = SessionState::Idle;
        self.flash_writes = 0;
    }
}
