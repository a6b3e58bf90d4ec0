//! Safety layer: validates profile values and outgoing frames before they
//! reach the device.
//!
//! # Armor M1 Bounds
//!
//! ## DPI
//! - **Range**: 100 – 6,200 DPI
//! - **Step size**: 100 DPI (stored as one byte, `value / 100`)
//!
//! ## Polling Rate
//! - **Supported values**: 125 Hz, 250 Hz, 500 Hz, 1000 Hz
//! - **Encoding**: one preparation sequence per rate, plus the runtime
//!   mode byte (report interval in ms)
//!
//! ## Debounce
//! - **Range**: 4 – 26 ms
//!
//! ## Frames
//! Only the opcodes used by the configuration flow may be sent. The unlock
//! handshake opens flash for writing, so anything outside that set (for
//! example firmware update commands) is refused before it is written.
//!
//! All validation happens before any HID communication.

use crate::error::{Error, Result};
use crate::packet::{opcodes, CommandFrame};
use crate::profile::PollingRate;

/// Bricking risk disclaimer, shown before any flash write.
pub const BRICKING_DISCLAIMER: &str = "\
WARNING: This software unlocks the mouse's configuration flash and rewrites it. \
Close the vendor control application first and do not unplug the mouse while \
a write is in progress. An interrupted write can leave the device in an \
inconsistent state until a profile is applied again. Use at your own risk.";

/// Opcodes the session is allowed to send.
const ALLOWED_OPCODES: &[u8] = &[
    opcodes::POLLING_RATE,    // 0x01 runtime polling rate
    opcodes::DEBOUNCE,        // 0x04 runtime debounce
    opcodes::STOP,            // 0x08 stop / halt
    opcodes::UNLOCK_PASSWORD, // 0x0A unlock password
    opcodes::SENSITIVITY,     // 0x0E runtime sensitivity
    opcodes::HANDSHAKE,       // 0x25 handshake start and triggers
    opcodes::SECTOR,          // 0x27 sector headers
];

/// Reject frames whose opcode is outside the configuration command set.
pub fn validate_frame(frame: &CommandFrame) -> Result<()> {
    if ALLOWED_OPCODES.contains(&frame.opcode()) {
        Ok(())
    } else {
        Err(Error::ForbiddenCommand(frame.opcode()))
    }
}

/// Armor M1 DPI constraints.
pub const DPI_MIN: u16 = 100;
pub const DPI_MAX: u16 = 6200;
pub const DPI_STEP: u16 = 100;

/// Debounce constraints in milliseconds.
pub const DEBOUNCE_MIN: u8 = 4;
pub const DEBOUNCE_MAX: u8 = 26;

/// Validate a DPI stage. Unlike rounding, a value off the 100 grid is an error.
pub fn validate_dpi_stage(dpi: u16) -> Result<u16> {
    if !(DPI_MIN..=DPI_MAX).contains(&dpi) {
        return Err(Error::InvalidProfile {
            field: "dpi_stages",
            reason: format!("{dpi} is outside {DPI_MIN}..={DPI_MAX}"),
        });
    }
    if dpi % DPI_STEP != 0 {
        return Err(Error::InvalidProfile {
            field: "dpi_stages",
            reason: format!("{dpi} is not a multiple of {DPI_STEP}"),
        });
    }
    Ok(dpi)
}

/// Validate a polling rate value.
pub fn validate_polling_rate(hz: u16) -> Result<PollingRate> {
    PollingRate::from_hz(hz).ok_or_else(|| Error::InvalidProfile {
        field: "polling_rate",
        reason: format!("{hz} Hz is not one of 125, 250, 500, 1000"),
    })
}

/// Validate a debounce time.
pub fn validate_debounce(ms: u8) -> Result<u8> {
    if (DEBOUNCE_MIN..=DEBOUNCE_MAX).contains(&ms) {
        Ok(ms)
    } else {
        Err(Error::InvalidProfile {
            field: "debounce_ms",
            reason: format!("{ms} ms is outside {DEBOUNCE_MIN}..={DEBOUNCE_MAX}"),
        })
    }
}
