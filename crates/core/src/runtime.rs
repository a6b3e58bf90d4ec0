//! Volatile runtime registers.
//!
//! The flash-to-RAM reload after commit does not restore polling rate,
//! sensitivity or debounce, so they are re-sent once the post-commit wait
//! is over. These frames are checksummed, unlike the sector headers.

use crate::error::{Error, Result};
use crate::flash::{DeviceState, FlashStep};
use crate::packet::{build_command, opcodes, CommandFrame};
use crate::profile::ConfigurationProfile;
use crate::session::{DeviceSession, SessionState};
use crate::transport::DeviceTransport;
use tracing::{info, warn};

/// Sensitivity register value for 1:1 X/Y scaling.
pub const SENSITIVITY_FULL_SCALE: u8 = 0x64;

/// Sub-register of the debounce opcode.
const DEBOUNCE_BUTTONS: u8 = 0x01;

/// Polling rate, sensitivity and debounce frames, in send order.
pub fn runtime_frames(profile: &ConfigurationProfile) -> Result<[CommandFrame; 3]> {
    Ok([
        build_command(opcodes::POLLING_RATE, &[profile.polling_rate().mode_byte()])?,
        build_command(
            opcodes::SENSITIVITY,
            &[SENSITIVITY_FULL_SCALE, SENSITIVITY_FULL_SCALE],
        )?,
        build_command(
            opcodes::DEBOUNCE,
            &[DEBOUNCE_BUTTONS, profile.debounce().value()],
        )?,
    ])
}

/// Re-assert the runtime registers. The session must be `Committed`.
///
/// On success the session is back in `Idle`, ready for another run.
pub fn apply_runtime<T: DeviceTransport>(
    session: &mut DeviceSession<T>,
    profile: &ConfigurationProfile,
) -> Result<()> {
    if session.state() != SessionState::Committed {
        return Err(Error::HandshakeFailed {
            state: session.state(),
            reason: "runtime registers are applied after commit".to_string(),
        });
    }

    let sent = runtime_frames(profile).and_then(|frames| {
        frames
            .iter()
            .try_for_each(|frame| session.send_command(frame))
    });

    if let Err(source) = sent {
        warn!(error = %source, "Runtime reapply failed; flash is committed");
        session.reset();
        return Err(Error::Aborted {
            step: FlashStep::RuntimeApply,
            device_state: DeviceState::RuntimeStale,
            source: Box::new(source),
        });
    }

    info!(
        rate = %profile.polling_rate(),
        debounce_ms = profile.debounce().value(),
        "Runtime registers applied"
    );
    session.reset();
    Ok(())
}
