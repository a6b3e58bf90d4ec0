//! Onboard macro compiler.
//!
//! A macro blob is exactly 128 bytes (four 32-byte output reports):
//!   - bytes[0..2]: repeat count, big-endian
//!   - then 2 bytes per action: attribute, USB-HID key code
//!   - zero padding to 128
//!
//! Attribute byte: bit 7 = release (clear = press), bits 0-6 = delay before
//! the next action in 10 ms steps (0-127).

use crate::error::{Error, Result};
use crate::packet::{self, CHUNK_LEN};
use crate::sectors::MacroSlot;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Compiled blob length.
pub const MACRO_BLOB_LEN: usize = 128;
/// 32-byte chunks per blob.
pub const MACRO_CHUNKS: usize = MACRO_BLOB_LEN / CHUNK_LEN;
/// Repeat-count header length.
pub const HEADER_LEN: usize = 2;
/// Encoded length per action.
pub const ACTION_LEN: usize = 2;
/// Largest action list that fits the blob.
pub const MAX_ACTIONS: usize = (MACRO_BLOB_LEN - HEADER_LEN) / ACTION_LEN;
/// Delay step size in milliseconds.
pub const DELAY_STEP_MS: u32 = 10;
/// Largest encodable delay in steps.
pub const MAX_DELAY_STEPS: u32 = 0x7F;
/// Release flag in the attribute byte.
pub const RELEASE_FLAG: u8 = 0x80;

/// Press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyState {
    Press,
    Release,
}

/// A USB-HID usage code (keyboard page), plus the vendor mouse-button codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u8);

impl KeyCode {
    /// Look up a key by name (case-insensitive).
    ///
    /// Letters, digits, F1-F12, common editing keys, arrows, modifiers, and
    /// LCLICK / RCLICK / MCLICK for the mouse buttons.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_uppercase();
        let bytes = upper.as_bytes();

        // A-Z = 0x04..0x1D
        if bytes.len() == 1 && bytes[0].is_ascii_uppercase() {
            return Some(Self(0x04 + (bytes[0] - b'A')));
        }
        // 1-9 = 0x1E..0x26, 0 = 0x27
        if bytes.len() == 1 && bytes[0].is_ascii_digit() {
            let code = if bytes[0] == b'0' {
                0x27
            } else {
                0x1E + (bytes[0] - b'1')
            };
            return Some(Self(code));
        }
        // F1-F12 = 0x3A..0x45
        if let Some(n) = upper.strip_prefix('F').and_then(|n| n.parse::<u8>().ok()) {
            if (1..=12).contains(&n) {
                return Some(Self(0x3A + n - 1));
            }
        }

        let code = match upper.as_str() {
            "ENTER" | "RETURN" => 0x28,
            "ESC" | "ESCAPE" => 0x29,
            "BACKSPACE" => 0x2A,
            "TAB" => 0x2B,
            "SPACE" => 0x2C,
            "MINUS" => 0x2D,
            "EQUAL" => 0x2E,
            "CAPSLOCK" => 0x39,
            "INSERT" => 0x49,
            "HOME" => 0x4A,
            "PAGEUP" => 0x4B,
            "DELETE" => 0x4C,
            "END" => 0x4D,
            "PAGEDOWN" => 0x4E,
            "RIGHT" => 0x4F,
            "LEFT" => 0x50,
            "DOWN" => 0x51,
            "UP" => 0x52,
            "LCTRL" => 0xE0,
            "LSHIFT" => 0xE1,
            "LALT" => 0xE2,
            "LGUI" | "LWIN" => 0xE3,
            "RCTRL" => 0xE4,
            "RSHIFT" => 0xE5,
            "RALT" => 0xE6,
            "RGUI" | "RWIN" => 0xE7,
            "LCLICK" => 0xF0,
            "RCLICK" => 0xF1,
            "MCLICK" => 0xF2,
            _ => return None,
        };
        Some(Self(code))
    }
}

/// One macro step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    pub state: KeyState,
    pub key: KeyCode,
    /// Delay before the next action.
    pub delay_ms: u32,
}

impl Action {
    pub fn press(key: KeyCode, delay_ms: u32) -> Self {
        Self {
            state: KeyState::Press,
            key,
            delay_ms,
        }
    }

    pub fn release(key: KeyCode, delay_ms: u32) -> Self {
        Self {
            state: KeyState::Release,
            key,
            delay_ms,
        }
    }

    fn attribute(&self) -> (u8, Option<u32>) {
        let requested = self.delay_ms / DELAY_STEP_MS;
        let steps = requested.min(MAX_DELAY_STEPS);
        let flag = match self.state {
            KeyState::Press => 0,
            KeyState::Release => RELEASE_FLAG,
        };
        let clamped = (requested > MAX_DELAY_STEPS).then_some(steps * DELAY_STEP_MS);
        (steps as u8 | flag, clamped)
    }
}

/// A delay that exceeded the 7-bit step limit and was shortened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayClamp {
    /// Index of the action in the list.
    pub index: usize,
    pub requested_ms: u32,
    pub applied_ms: u32,
}

/// A compiled 128-byte macro blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroBlob([u8; MACRO_BLOB_LEN]);

impl MacroBlob {
    pub fn bytes(&self) -> &[u8; MACRO_BLOB_LEN] {
        &self.0
    }

    pub fn repeat(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }

    /// The four 32-byte chunks in transmission order.
    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> {
        self.0.chunks_exact(CHUNK_LEN)
    }
}

/// Compiler output: the blob plus any delays that had to be clamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMacro {
    pub blob: MacroBlob,
    pub clamped: Vec<DelayClamp>,
}

/// Compile an action list into a macro blob.
///
/// Rejects lists that do not fit rather than truncating them. Delays over
/// 1270 ms are clamped and reported in [`CompiledMacro::clamped`].
pub fn compile(actions: &[Action], repeat: u16) -> Result<CompiledMacro> {
    if actions.len() > MAX_ACTIONS {
        return Err(Error::MacroTooLong {
            actions: actions.len(),
            max: MAX_ACTIONS,
        });
    }

    let mut encoded = Vec::with_capacity(MACRO_BLOB_LEN);
    encoded.extend_from_slice(&repeat.to_be_bytes());

    let mut clamped = Vec::new();
    for (index, action) in actions.iter().enumerate() {
        let (attr, clamp) = action.attribute();
        if let Some(applied_ms) = clamp {
            warn!(
                index,
                requested_ms = action.delay_ms,
                applied_ms,
                "Macro delay exceeds hardware limit, clamped"
            );
            clamped.push(DelayClamp {
                index,
                requested_ms: action.delay_ms,
                applied_ms,
            });
        }
        encoded.push(attr);
        encoded.push(action.key.0);
    }

    let padded = packet::build_payload(&encoded, MACRO_BLOB_LEN)?;
    let mut blob = [0u8; MACRO_BLOB_LEN];
    blob.copy_from_slice(&padded);

    Ok(CompiledMacro {
        blob: MacroBlob(blob),
        clamped,
    })
}

/// User-facing macro step, as written in profile files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub state: KeyState,
    pub key: String,
    #[serde(default)]
    pub delay_ms: u32,
}

/// User-facing macro definition, as written in profile files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroSpec {
    pub slot: u8,
    #[serde(default = "default_repeat")]
    pub repeat: u16,
    pub actions: Vec<ActionSpec>,
}

fn default_repeat() -> u16 {
    1
}

/// A validated macro bound to an onboard slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDefinition {
    slot: MacroSlot,
    repeat: u16,
    actions: Vec<Action>,
    key_names: Vec<String>,
}

impl MacroDefinition {
    /// Validate a macro spec: known slot, known keys, fits the blob.
    pub fn from_spec(spec: &MacroSpec) -> Result<Self> {
        let slot = MacroSlot::from_number(spec.slot).ok_or_else(|| Error::InvalidProfile {
            field: "macros",
            reason: format!("macro slot {} has no known sector address", spec.slot),
        })?;
        if spec.actions.len() > MAX_ACTIONS {
            return Err(Error::MacroTooLong {
                actions: spec.actions.len(),
                max: MAX_ACTIONS,
            });
        }

        let mut actions = Vec::with_capacity(spec.actions.len());
        for step in &spec.actions {
            let key = KeyCode::from_name(&step.key).ok_or_else(|| Error::InvalidProfile {
                field: "macros",
                reason: format!("unknown key name '{}'", step.key),
            })?;
            actions.push(Action {
                state: step.state,
                key,
                delay_ms: step.delay_ms,
            });
        }

        Ok(Self {
            slot,
            repeat: spec.repeat,
            actions,
            key_names: spec.actions.iter().map(|a| a.key.clone()).collect(),
        })
    }

    pub fn slot(&self) -> MacroSlot {
        self.slot
    }

    pub fn repeat(&self) -> u16 {
        self.repeat
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn compile(&self) -> Result<CompiledMacro> {
        compile(&self.actions, self.repeat)
    }

    /// Back to the file form.
    pub fn to_spec(&self) -> MacroSpec {
        MacroSpec {
            slot: self.slot.number(),
            repeat: self.repeat,
            actions: self
                .actions
                .iter()
                .zip(&self.key_names)
                .map(|(a, name)| ActionSpec {
                    state: a.state,
                    key: name.clone(),
                    delay_ms: a.delay_ms,
                })
                .collect(),
        }
    }
}
