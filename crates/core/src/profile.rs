//! Configuration profile model, validation and JSON persistence.
//!
//! A [`ProfileSpec`] is the loose, user-editable file form. It becomes a
//! [`ConfigurationProfile`] only through [`ConfigurationProfile::from_spec`],
//! which validates everything before a single byte is generated. Profiles
//! are immutable; build a new one instead of editing one mid-flash.

use crate::buttons::{ButtonAction, ButtonMatrix};
use crate::error::{Error, Result};
use crate::macros::{MacroDefinition, MacroSpec};
use crate::packet::{self, CommandFrame};
use crate::safety;
use crate::sectors::{self, MacroSlot, PREP_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// DPI stages per profile.
pub const DPI_STAGE_COUNT: usize = 6;

/// File name of the last-applied profile inside the config directory.
pub const LAST_APPLIED_FILE: &str = "last-applied.json";

/// One sensor resolution step, stored on the device as `value / 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DpiStage(u16);

impl DpiStage {
    pub fn new(value: u16) -> Result<Self> {
        safety::validate_dpi_stage(value).map(Self)
    }

    /// Decode a stored byte.
    pub fn decode(byte: u8) -> Result<Self> {
        Self::new(byte as u16 * safety::DPI_STEP)
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    pub fn encode(&self) -> u8 {
        (self.0 / safety::DPI_STEP) as u8
    }
}

/// An RGB indicator color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    /// Parse `RRGGBB` (optional leading `#`).
    pub fn from_hex(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('#');
        let bytes = (trimmed.len() == 6)
            .then(|| packet::from_hex(trimmed))
            .flatten()
            .ok_or_else(|| Error::InvalidProfile {
                field: "colors",
                reason: format!("'{s}' is not an RRGGBB hex color"),
            })?;
        Ok(Self {
            r: bytes[0],
            g: bytes[1],
            b: bytes[2],
        })
    }

    pub fn bytes(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Polling rates accepted by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum PollingRate {
    Hz125 = 125,
    Hz250 = 250,
    Hz500 = 500,
    Hz1000 = 1000,
}

impl PollingRate {
    /// Convert from raw Hz value.
    pub fn from_hz(hz: u16) -> Option<Self> {
        match hz {
            125 => Some(Self::Hz125),
            250 => Some(Self::Hz250),
            500 => Some(Self::Hz500),
            1000 => Some(Self::Hz1000),
            _ => None,
        }
    }

    pub fn as_hz(&self) -> u16 {
        *self as u16
    }

    /// Runtime register value (report interval in ms).
    pub fn mode_byte(&self) -> u8 {
        match self {
            Self::Hz1000 => 0x01,
            Self::Hz500 => 0x02,
            Self::Hz250 => 0x04,
            Self::Hz125 => 0x08,
        }
    }

    /// Flash preparation frames that persist this rate.
    pub fn prep_sequence(&self) -> &'static [CommandFrame; PREP_LEN] {
        sectors::prep_sequence(*self)
    }

    /// All supported rates.
    pub const ALL: &'static [PollingRate] = &[
        PollingRate::Hz125,
        PollingRate::Hz250,
        PollingRate::Hz500,
        PollingRate::Hz1000,
    ];
}

impl fmt::Display for PollingRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.as_hz())
    }
}

/// Button debounce time in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebounceMs(u8);

impl DebounceMs {
    pub fn new(ms: u8) -> Result<Self> {
        safety::validate_debounce(ms).map(Self)
    }

    /// Clamp into range instead of rejecting.
    pub fn clamped(ms: u8) -> Self {
        Self(ms.clamp(safety::DEBOUNCE_MIN, safety::DEBOUNCE_MAX))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// Profile as written in JSON files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSpec {
    #[serde(default = "default_name")]
    pub name: String,
    pub dpi_stages: Vec<u16>,
    pub colors: Vec<String>,
    #[serde(default = "default_button_names")]
    pub buttons: Vec<String>,
    pub polling_rate: u16,
    #[serde(default = "default_debounce")]
    pub debounce_ms: u8,
    #[serde(default)]
    pub macros: Vec<MacroSpec>,
}

fn default_name() -> String {
    "Default".into()
}

fn default_button_names() -> Vec<String> {
    ButtonMatrix::default()
        .actions()
        .iter()
        .map(ButtonAction::name)
        .collect()
}

fn default_debounce() -> u8 {
    12
}

impl Default for ProfileSpec {
    fn default() -> Self {
        Self {
            name: default_name(),
            dpi_stages: vec![400, 800, 1200, 2400, 3200, 6200],
            colors: ["FFFFFF", "00FF00", "0000FF", "FFFF00", "FF8800", "00FFFF"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            buttons: default_button_names(),
            polling_rate: 1000,
            debounce_ms: default_debounce(),
            macros: Vec::new(),
        }
    }
}

/// A validated, immutable configuration profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationProfile {
    name: String,
    dpi_stages: [DpiStage; DPI_STAGE_COUNT],
    colors: [RgbColor; DPI_STAGE_COUNT],
    buttons: ButtonMatrix,
    polling_rate: PollingRate,
    debounce: DebounceMs,
    macros: Vec<MacroDefinition>,
}

impl ConfigurationProfile {
    /// Validate a parsed profile file. Pure: never touches the device.
    pub fn from_spec(spec: &ProfileSpec) -> Result<Self> {
        let dpi_stages = fixed_six("dpi_stages", &spec.dpi_stages, |&v| DpiStage::new(v))?;
        let colors = fixed_six("colors", &spec.colors, |s| RgbColor::from_hex(s))?;

        let actions = spec
            .buttons
            .iter()
            .map(|name| {
                ButtonAction::from_name(name).ok_or_else(|| Error::InvalidProfile {
                    field: "buttons",
                    reason: format!("unknown button action '{name}'"),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let buttons = ButtonMatrix::from_actions(&actions)?;

        let polling_rate = safety::validate_polling_rate(spec.polling_rate)?;
        let debounce = DebounceMs::new(spec.debounce_ms)?;

        let macros = spec
            .macros
            .iter()
            .map(MacroDefinition::from_spec)
            .collect::<Result<Vec<_>>>()?;
        for (i, m) in macros.iter().enumerate() {
            if macros[..i].iter().any(|other| other.slot() == m.slot()) {
                return Err(Error::InvalidProfile {
                    field: "macros",
                    reason: format!("macro slot {} defined twice", m.slot().number()),
                });
            }
        }

        for n in buttons.referenced_macros() {
            let Some(slot) = MacroSlot::from_number(n) else {
                return Err(Error::InvalidProfile {
                    field: "buttons",
                    reason: format!("macro slot {n} has no onboard sector"),
                });
            };
            // A macro written by an earlier run stays in flash.
            if !macros.iter().any(|m| m.slot() == slot) {
                warn!(slot = n, "Button bound to a macro slot this profile does not write");
            }
        }

        debug!(
            name = %spec.name,
            polling_rate = spec.polling_rate,
            macros = macros.len(),
            "Profile validated"
        );

        Ok(Self {
            name: spec.name.clone(),
            dpi_stages,
            colors,
            buttons,
            polling_rate,
            debounce,
            macros,
        })
    }

    /// Back to the file form.
    pub fn to_spec(&self) -> ProfileSpec {
        ProfileSpec {
            name: self.name.clone(),
            dpi_stages: self.dpi_stages.iter().map(DpiStage::value).collect(),
            colors: self.colors.iter().map(RgbColor::to_string).collect(),
            buttons: self.buttons.actions().iter().map(ButtonAction::name).collect(),
            polling_rate: self.polling_rate.as_hz(),
            debounce_ms: self.debounce.value(),
            macros: self.macros.iter().map(MacroDefinition::to_spec).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dpi_stages(&self) -> &[DpiStage; DPI_STAGE_COUNT] {
        &self.dpi_stages
    }

    pub fn colors(&self) -> &[RgbColor; DPI_STAGE_COUNT] {
        &self.colors
    }

    pub fn buttons(&self) -> &ButtonMatrix {
        &self.buttons
    }

    pub fn polling_rate(&self) -> PollingRate {
        self.polling_rate
    }

    pub fn debounce(&self) -> DebounceMs {
        self.debounce
    }

    pub fn macros(&self) -> &[MacroDefinition] {
        &self.macros
    }

    /// Six concatenated RGB triples, stage order.
    pub fn color_bytes(&self) -> Vec<u8> {
        self.colors.iter().flat_map(RgbColor::bytes).collect()
    }

    /// Six encoded DPI stage bytes, without the calibration suffix.
    pub fn dpi_bytes(&self) -> [u8; DPI_STAGE_COUNT] {
        self.dpi_stages.map(|s| s.encode())
    }
}

fn fixed_six<S, T>(
    field: &'static str,
    items: &[S],
    parse: impl Fn(&S) -> Result<T>,
) -> Result<[T; DPI_STAGE_COUNT]> {
    if items.len() != DPI_STAGE_COUNT {
        return Err(Error::InvalidProfile {
            field,
            reason: format!("expected {DPI_STAGE_COUNT} entries, got {}", items.len()),
        });
    }
    let parsed = items.iter().map(parse).collect::<Result<Vec<T>>>()?;
    parsed.try_into().map_err(|_| Error::InvalidProfile {
        field,
        reason: "length mismatch".into(),
    })
}

/// Read and validate a profile file.
pub fn load_profile(path: &Path) -> Result<ConfigurationProfile> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
    let spec: ProfileSpec = serde_json::from_str(&text)
        .map_err(|e| Error::Config(format!("parse {}: {e}", path.display())))?;
    ConfigurationProfile::from_spec(&spec)
}

/// Write a profile file (pretty JSON).
pub fn save_profile(path: &Path, profile: &ConfigurationProfile) -> Result<()> {
    save_spec(path, &profile.to_spec())
}

/// Write a spec file without validating it.
pub fn save_spec(path: &Path, spec: &ProfileSpec) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("create {}: {e}", parent.display())))?;
        }
    }
    let json = serde_json::to_string_pretty(spec)
        .map_err(|e| Error::Config(format!("serialize profile: {e}")))?;
    std::fs::write(path, json).map_err(|e| Error::Config(format!("write {}: {e}", path.display())))
}

/// Directory for the state file.
///
/// `ARMOR_FLASH_CONFIG_DIR` overrides the platform default.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("ARMOR_FLASH_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }

    #[cfg(target_os = "windows")]
    {
        let app_data = std::env::var_os("APPDATA")
            .ok_or_else(|| Error::Config("APPDATA is not set".to_string()))?;
        Ok(PathBuf::from(app_data).join("armor-flash"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg).join("armor-flash"));
        }
        let home = std::env::var_os("HOME")
            .ok_or_else(|| Error::Config("neither XDG_CONFIG_HOME nor HOME is set".to_string()))?;
        Ok(PathBuf::from(home).join(".config").join("armor-flash"))
    }
}

/// Record a profile as the one currently on the device.
pub fn save_last_applied(dir: &Path, profile: &ConfigurationProfile) -> Result<PathBuf> {
    let path = dir.join(LAST_APPLIED_FILE);
    save_profile(&path, profile)?;
    info!(path = %path.display(), "Recorded applied profile");
    Ok(path)
}

/// The profile last applied successfully, if any.
///
/// The device has no read-back path for its configuration, so this is the
/// host-side record written after a successful run.
pub fn read_current_profile(dir: &Path) -> Result<Option<ConfigurationProfile>> {
    let path = dir.join(LAST_APPLIED_FILE);
    if !path.exists() {
        return Ok(None);
    }
    load_profile(&path).map(Some)
}
