//! Button matrix: 16 slots of 4-byte action codes.
//!
//! Each slot is `mode, 0x00, code, 0x00`:
//!   - Mode 0x01: mouse button (F0 left, F1 right, F2 middle, F3 back, F4 forward)
//!   - Mode 0x04: scroll wheel (01 up, 02 down)
//!   - Mode 0x07: DPI switch (01 up, 02 down, 03 cycle)
//!   - Mode 0x09: macro trigger (code = macro slot number)
//!
//! `00000000` is an unassigned slot. Slots 1-8 and 9-16 live in two
//! separate 32-byte sectors.

use crate::error::{Error, Result};
use crate::packet;
use std::fmt;

/// Number of slots in the matrix.
pub const BUTTON_SLOT_COUNT: usize = 16;
/// Slots per flash sector.
pub const SLOTS_PER_SECTOR: usize = 8;
/// Bytes per slot.
pub const SLOT_LEN: usize = 4;

/// Mode bytes.
pub mod modes {
    pub const MOUSE: u8 = 0x01;
    pub const SCROLL: u8 = 0x04;
    pub const DPI: u8 = 0x07;
    pub const MACRO: u8 = 0x09;
}

/// A raw 4-byte slot code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonCode([u8; SLOT_LEN]);

impl ButtonCode {
    pub const UNASSIGNED: Self = Self([0; SLOT_LEN]);

    pub const fn new(bytes: [u8; SLOT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8; SLOT_LEN] {
        &self.0
    }

    pub fn is_unassigned(&self) -> bool {
        *self == Self::UNASSIGNED
    }
}

impl fmt::Display for ButtonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&packet::to_hex(&self.0))
    }
}

/// Named button actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonAction {
    LeftClick,
    RightClick,
    MiddleClick,
    Back,
    Forward,
    DpiCycle,
    DpiUp,
    DpiDown,
    ScrollUp,
    ScrollDown,
    /// Fire onboard macro `n` (1-based).
    Macro(u8),
    Disabled,
    /// Any other code, passed through untouched.
    Raw(ButtonCode),
}

impl ButtonAction {
    /// Encode to the slot code.
    pub fn code(&self) -> ButtonCode {
        match *self {
            Self::LeftClick => ButtonCode([modes::MOUSE, 0x00, 0xF0, 0x00]),
            Self::RightClick => ButtonCode([modes::MOUSE, 0x00, 0xF1, 0x00]),
            Self::MiddleClick => ButtonCode([modes::MOUSE, 0x00, 0xF2, 0x00]),
            Self::Back => ButtonCode([modes::MOUSE, 0x00, 0xF3, 0x00]),
            Self::Forward => ButtonCode([modes::MOUSE, 0x00, 0xF4, 0x00]),
            Self::DpiCycle => ButtonCode([modes::DPI, 0x00, 0x03, 0x00]),
            Self::DpiUp => ButtonCode([modes::DPI, 0x00, 0x01, 0x00]),
            Self::DpiDown => ButtonCode([modes::DPI, 0x00, 0x02, 0x00]),
            Self::ScrollUp => ButtonCode([modes::SCROLL, 0x00, 0x01, 0x00]),
            Self::ScrollDown => ButtonCode([modes::SCROLL, 0x00, 0x02, 0x00]),
            Self::Macro(n) => ButtonCode([modes::MACRO, 0x00, n, 0x00]),
            Self::Disabled => ButtonCode::UNASSIGNED,
            Self::Raw(code) => code,
        }
    }

    /// Decode a slot code. Unknown codes come back as `Raw`.
    pub fn from_code(code: ButtonCode) -> Self {
        match code.0 {
            [0, 0, 0, 0] => Self::Disabled,
            [modes::MOUSE, 0x00, 0xF0, 0x00] => Self::LeftClick,
            [modes::MOUSE, 0x00, 0xF1, 0x00] => Self::RightClick,
            [modes::MOUSE, 0x00, 0xF2, 0x00] => Self::MiddleClick,
            [modes::MOUSE, 0x00, 0xF3, 0x00] => Self::Back,
            [modes::MOUSE, 0x00, 0xF4, 0x00] => Self::Forward,
            [modes::DPI, 0x00, 0x03, 0x00] => Self::DpiCycle,
            [modes::DPI, 0x00, 0x01, 0x00] => Self::DpiUp,
            [modes::DPI, 0x00, 0x02, 0x00] => Self::DpiDown,
            [modes::SCROLL, 0x00, 0x01, 0x00] => Self::ScrollUp,
            [modes::SCROLL, 0x00, 0x02, 0x00] => Self::ScrollDown,
            [modes::MACRO, 0x00, n, 0x00] if n > 0 => Self::Macro(n),
            _ => Self::Raw(code),
        }
    }

    /// Parse a CLI/profile-friendly name (case-insensitive).
    ///
    /// Accepts:
    /// - "left", "right", "middle", "back", "forward"
    /// - "dpi", "dpi-cycle", "dpi-up", "dpi-down"
    /// - "scroll-up", "scroll-down"
    /// - "macro:N"
    /// - "none", "disabled", "unassigned"
    /// - 8 hex digits, e.g. "0100F000"
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_lowercase();
        let action = match lower.as_str() {
            "left" | "left-click" => Self::LeftClick,
            "right" | "right-click" => Self::RightClick,
            "middle" | "middle-click" => Self::MiddleClick,
            "back" | "backward" => Self::Back,
            "forward" => Self::Forward,
            "dpi" | "dpi-cycle" => Self::DpiCycle,
            "dpi-up" => Self::DpiUp,
            "dpi-down" => Self::DpiDown,
            "scroll-up" | "wheel-up" => Self::ScrollUp,
            "scroll-down" | "wheel-down" => Self::ScrollDown,
            "none" | "disabled" | "unassigned" => Self::Disabled,
            other => {
                if let Some(n) = other.strip_prefix("macro:") {
                    let n: u8 = n.parse().ok()?;
                    if n == 0 {
                        return None;
                    }
                    Self::Macro(n)
                } else {
                    let bytes = packet::from_hex(other)?;
                    let raw: [u8; SLOT_LEN] = bytes.try_into().ok()?;
                    Self::from_code(ButtonCode(raw))
                }
            }
        };
        Some(action)
    }

    /// Name accepted by [`ButtonAction::from_name`].
    pub fn name(&self) -> String {
        match self {
            Self::LeftClick => "left".into(),
            Self::RightClick => "right".into(),
            Self::MiddleClick => "middle".into(),
            Self::Back => "back".into(),
            Self::Forward => "forward".into(),
            Self::DpiCycle => "dpi-cycle".into(),
            Self::DpiUp => "dpi-up".into(),
            Self::DpiDown => "dpi-down".into(),
            Self::ScrollUp => "scroll-up".into(),
            Self::ScrollDown => "scroll-down".into(),
            Self::Macro(n) => format!("macro:{n}"),
            Self::Disabled => "none".into(),
            Self::Raw(code) => code.to_string(),
        }
    }
}

impl fmt::Display for ButtonAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// The 16-slot button matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonMatrix([ButtonCode; BUTTON_SLOT_COUNT]);

impl ButtonMatrix {
    /// Build from exactly 16 actions.
    pub fn from_actions(actions: &[ButtonAction]) -> Result<Self> {
        if actions.len() != BUTTON_SLOT_COUNT {
            return Err(Error::InvalidProfile {
                field: "buttons",
                reason: format!(
                    "expected {BUTTON_SLOT_COUNT} slots, got {}",
                    actions.len()
                ),
            });
        }
        let mut slots = [ButtonCode::UNASSIGNED; BUTTON_SLOT_COUNT];
        for (slot, action) in slots.iter_mut().zip(actions) {
            *slot = action.code();
        }
        Ok(Self(slots))
    }

    pub fn slots(&self) -> &[ButtonCode; BUTTON_SLOT_COUNT] {
        &self.0
    }

    pub fn actions(&self) -> Vec<ButtonAction> {
        self.0.iter().map(|c| ButtonAction::from_code(*c)).collect()
    }

    /// Concatenated codes for one sector (0 = slots 1-8, 1 = slots 9-16).
    pub fn sector_bytes(&self, sector: usize) -> Vec<u8> {
        self.0
            .iter()
            .skip(sector * SLOTS_PER_SECTOR)
            .take(SLOTS_PER_SECTOR)
            .flat_map(|c| c.0)
            .collect()
    }

    /// Macro slot numbers referenced by any button.
    pub fn referenced_macros(&self) -> Vec<u8> {
        let mut slots: Vec<u8> = self
            .actions()
            .into_iter()
            .filter_map(|a| match a {
                ButtonAction::Macro(n) => Some(n),
                _ => None,
            })
            .collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }
}

impl Default for ButtonMatrix {
    /// Vendor default layout.
    fn default() -> Self {
        let mut actions = [ButtonAction::Disabled; BUTTON_SLOT_COUNT];
        actions[0] = ButtonAction::LeftClick;
        actions[1] = ButtonAction::DpiCycle;
        actions[2] = ButtonAction::MiddleClick;
        actions[3] = ButtonAction::Forward;
        actions[4] = ButtonAction::Back;
        actions[5] = ButtonAction::RightClick;
        actions[14] = ButtonAction::ScrollUp;
        actions[15] = ButtonAction::ScrollDown;
        let mut slots = [ButtonCode::UNASSIGNED; BUTTON_SLOT_COUNT];
        for (slot, action) in slots.iter_mut().zip(actions.iter()) {
            *slot = action.code();
        }
        Self(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_actions_encode_to_captured_codes() {
        assert_eq!(ButtonAction::LeftClick.code().to_string(), "0100F000");
        assert_eq!(ButtonAction::DpiCycle.code().to_string(), "07000300");
        assert_eq!(ButtonAction::ScrollDown.code().to_string(), "04000200");
        assert_eq!(ButtonAction::Macro(1).code().to_string(), "09000100");
        assert!(ButtonAction::Disabled.code().is_unassigned());
    }

    #[test]
    fn code_action_roundtrip() {
        let all = [
            ButtonAction::LeftClick,
            ButtonAction::RightClick,
            ButtonAction::MiddleClick,
            ButtonAction::Back,
            ButtonAction::Forward,
            ButtonAction::DpiCycle,
            ButtonAction::DpiUp,
            ButtonAction::DpiDown,
            ButtonAction::ScrollUp,
            ButtonAction::ScrollDown,
            ButtonAction::Macro(3),
            ButtonAction::Disabled,
        ];
        for action in all {
            assert_eq!(ButtonAction::from_code(action.code()), action);
            assert_eq!(ButtonAction::from_name(&action.name()), Some(action));
        }
    }

    #[test]
    fn from_name_accepts_variants_and_hex() {
        assert_eq!(ButtonAction::from_name("LEFT"), Some(ButtonAction::LeftClick));
        assert_eq!(ButtonAction::from_name("macro:2"), Some(ButtonAction::Macro(2)));
        assert_eq!(ButtonAction::from_name("0100F100"), Some(ButtonAction::RightClick));
        assert_eq!(
            ButtonAction::from_name("0A0B0C0D"),
            Some(ButtonAction::Raw(ButtonCode::new([0x0A, 0x0B, 0x0C, 0x0D])))
        );
    }

    #[test]
    fn from_name_rejects_unknown() {
        assert_eq!(ButtonAction::from_name("shoot"), None);
        assert_eq!(ButtonAction::from_name("macro:0"), None);
        assert_eq!(ButtonAction::from_name("0100F0"), None);
        assert_eq!(ButtonAction::from_name(""), None);
    }

    #[test]
    fn default_matrix_sectors() {
        let matrix = ButtonMatrix::default();
        assert_eq!(
            packet::to_hex(&matrix.sector_bytes(0)),
            "0100F000070003000100F2000100F4000100F3000100F1000000000000000000"
        );
        let high = matrix.sector_bytes(1);
        assert_eq!(high.len(), 32);
        assert_eq!(&high[24..], &[0x04, 0x00, 0x01, 0x00, 0x04, 0x00, 0x02, 0x00]);
    }

    #[test]
    fn from_actions_requires_sixteen_slots() {
        let err = ButtonMatrix::from_actions(&[ButtonAction::LeftClick; 6]).unwrap_err();
        assert!(matches!(err, Error::InvalidProfile { field: "buttons", .. }));
    }

    #[test]
    fn referenced_macros_are_deduplicated() {
        let mut actions = [ButtonAction::Disabled; BUTTON_SLOT_COUNT];
        actions[3] = ButtonAction::Macro(1);
        actions[7] = ButtonAction::Macro(1);
        let matrix = ButtonMatrix::from_actions(&actions).unwrap();
        assert_eq!(matrix.referenced_macros(), vec![1]);
    }
}
