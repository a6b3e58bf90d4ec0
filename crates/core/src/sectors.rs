//! Captured frame tables.
//!
//! These 8-byte sequences were recovered from USB captures of the vendor
//! application. They are addresses and keys, not computable values, and the
//! 0x25/0x27 families do not follow the command checksum. Every table is
//! indexed by an enum so a wrong lookup fails to compile.

use crate::packet::CommandFrame;
use crate::profile::PollingRate;

/// Parameters of the stop/halt command (opcode 0x08).
pub const STOP_PARAMS: [u8; 3] = [0xAA, 0xCC, 0xEE];

/// Unlock password (opcode 0x0A, key FC 15 22) as captured.
pub const UNLOCK_PASSWORD: CommandFrame =
    CommandFrame::raw([0x0A, 0xFC, 0x15, 0x22, 0x00, 0x00, 0x00, 0xBD]);

/// Handshake start, answered by a feature read.
pub const HANDSHAKE_START: CommandFrame =
    CommandFrame::raw([0x25, 0x2B, 0x41, 0x55, 0xF0, 0xE0, 0xE6, 0xEE]);

/// Trigger frames sent after the confirmation read, in order.
///
/// The first frame is the vendor wake command; the 0x252BAx frames open the
/// configuration memory (A5 is the security bypass key).
pub const TRIGGERS: [CommandFrame; 8] = [
    CommandFrame::raw([0x27, 0x27, 0xDD, 0xFF, 0xF4, 0xDD, 0x76, 0x76]),
    CommandFrame::raw([0x25, 0x2B, 0xA5, 0xFF, 0xF0, 0xE0, 0xE6, 0xEE]),
    CommandFrame::raw([0x25, 0x2B, 0xA1, 0xFF, 0xF0, 0xE0, 0xE6, 0xEE]),
    CommandFrame::raw([0x25, 0x2B, 0xA2, 0xFF, 0xF0, 0xE0, 0xE6, 0xEE]),
    CommandFrame::raw([0x25, 0x2B, 0xA3, 0xFF, 0xF0, 0xE0, 0xE6, 0xEE]),
    CommandFrame::raw([0x25, 0x2B, 0xA4, 0xFF, 0xF0, 0xE0, 0xE6, 0xEE]),
    CommandFrame::raw([0x25, 0x2B, 0xA6, 0xFF, 0xF0, 0xE0, 0xE6, 0xEE]),
    CommandFrame::raw([0x25, 0x2B, 0xA7, 0xFF, 0xF0, 0xE0, 0xE6, 0xEE]),
];

/// Hardware calibration suffix written after the six DPI stage bytes.
pub const DPI_SUFFIX: [u8; 2] = [0x7C, 0x78];

/// Dummy payload sent with the commit header to flush the write buffer.
pub const COMMIT_FLUSH: [u8; 1] = [0xFF];

/// Number of frames in every polling-rate preparation sequence.
pub const PREP_LEN: usize = 5;

const PREP_1000: [CommandFrame; PREP_LEN] = [
    CommandFrame::raw([0x27, 0x2B, 0xDD, 0xFF, 0xE8, 0xD5, 0x76, 0x76]),
    CommandFrame::raw([0x27, 0x2B, 0xD5, 0xFF, 0xE8, 0xED, 0x76, 0x76]),
    CommandFrame::raw([0x27, 0x2B, 0x6D, 0xFF, 0x00, 0x1D, 0x76, 0x76]),
    CommandFrame::raw([0x27, 0x2B, 0x9D, 0x04, 0x98, 0x45, 0x76, 0x76]),
    CommandFrame::raw([0x27, 0x2B, 0x5D, 0xFF, 0xD0, 0x52, 0x4E, 0x8E]),
];

const PREP_500: [CommandFrame; PREP_LEN] = [
    CommandFrame::raw([0x27, 0x2B, 0xDD, 0xFF, 0xE8, 0xD5, 0x76, 0x76]),
    CommandFrame::raw([0x27, 0x2B, 0xDD, 0xFF, 0x00, 0xED, 0x76, 0x76]),
    CommandFrame::raw([0x27, 0x2B, 0x75, 0xFF, 0xF8, 0x1D, 0x76, 0x76]),
    CommandFrame::raw([0x27, 0x2B, 0x9D, 0x04, 0x98, 0x45, 0x76, 0x76]),
    CommandFrame::raw([0x27, 0x2B, 0x5D, 0xFF, 0xD0, 0x52, 0x4E, 0x8E]),
];

const PREP_250: [CommandFrame; PREP_LEN] = [
    CommandFrame::raw([0x27, 0x2B, 0xDD, 0xFF, 0xE8, 0xD5, 0x76, 0x76]),
    CommandFrame::raw([0x27, 0x2B, 0xAD, 0xFF, 0xD0, 0xED, 0x76, 0x76]),
    CommandFrame::raw([0x27, 0x2B, 0x75, 0xFF, 0xF8, 0x1D, 0x76, 0x76]),
    CommandFrame::raw([0x27, 0x2B, 0x9D, 0x04, 0x98, 0x45, 0x76, 0x76]),
    CommandFrame::raw([0x27, 0x2B, 0x5D, 0xFF, 0xD0, 0x52, 0x4E, 0x8E]),
];

const PREP_125: [CommandFrame; PREP_LEN] = [
    CommandFrame::raw([0x27, 0x2B, 0xDD, 0xFF, 0xE8, 0xD5, 0x76, 0x76]),
    CommandFrame::raw([0x27, 0x2B, 0x8D, 0xFF, 0x30, 0xED, 0x76, 0x76]),
    CommandFrame::raw([0x27, 0x2B, 0x6D, 0xFF, 0x00, 0x1D, 0x76, 0x76]),
    CommandFrame::raw([0x27, 0x2B, 0x9D, 0x04, 0x98, 0x45, 0x76, 0x76]),
    CommandFrame::raw([0x27, 0x2B, 0x5D, 0xFF, 0xD0, 0x52, 0x4E, 0x8E]),
];

/// Flash preparation sequence that burns the given polling rate.
pub fn prep_sequence(rate: PollingRate) -> &'static [CommandFrame; PREP_LEN] {
    match rate {
        PollingRate::Hz1000 => &PREP_1000,
        PollingRate::Hz500 => &PREP_500,
        PollingRate::Hz250 => &PREP_250,
        PollingRate::Hz125 => &PREP_125,
    }
}

/// Addressed flash sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sector {
    /// RGB colors, first copy.
    ColorPrimary,
    /// RGB colors, redundant second copy.
    ColorSecondary,
    /// DPI stages plus calibration suffix.
    Dpi,
    /// Button slots 1-8.
    ButtonsLow,
    /// Button slots 9-16.
    ButtonsHigh,
    /// Seals flash and triggers the flash-to-RAM copy.
    Commit,
}

impl Sector {
    /// The addressed write header for this sector.
    pub fn header(self) -> CommandFrame {
        match self {
            Self::ColorPrimary => {
                CommandFrame::raw([0x27, 0x2A, 0x85, 0xFF, 0xF0, 0x65, 0x76, 0x36])
            }
            Self::ColorSecondary => {
                CommandFrame::raw([0x27, 0x2A, 0x8D, 0xFF, 0xE8, 0x65, 0x76, 0x36])
            }
            Self::Dpi => CommandFrame::raw([0x27, 0x2B, 0xFD, 0xFF, 0xE0, 0x6D, 0x76, 0xB6]),
            Self::ButtonsLow => {
                CommandFrame::raw([0x27, 0x2D, 0x5D, 0xFF, 0xE8, 0x55, 0x78, 0x76])
            }
            Self::ButtonsHigh => {
                CommandFrame::raw([0x27, 0x2D, 0x25, 0xFF, 0x00, 0x55, 0x78, 0x76])
            }
            Self::Commit => CommandFrame::raw([0x27, 0x2B, 0xFD, 0xFF, 0xF8, 0x65, 0x76, 0xD6]),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ColorPrimary => "colors (primary)",
            Self::ColorSecondary => "colors (secondary)",
            Self::Dpi => "dpi stages",
            Self::ButtonsLow => "buttons 1-8",
            Self::ButtonsHigh => "buttons 9-16",
            Self::Commit => "commit",
        }
    }
}

/// Onboard macro slots with a known sector header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroSlot {
    Slot1,
}

impl MacroSlot {
    /// Look up a slot by its 1-based number.
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Slot1),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::Slot1 => 1,
        }
    }

    /// Sector header preceding the four 32-byte macro chunks.
    pub fn header(self) -> CommandFrame {
        match self {
            Self::Slot1 => CommandFrame::raw([0x27, 0x27, 0x25, 0xFF, 0xE8, 0x5D, 0x7A, 0x76]),
        }
    }
}
