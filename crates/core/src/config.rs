//! Device selection and timing configuration.
//!
//! Both structs are plain serde types with millisecond fields so a JSON file
//! such as `{"timing": {"post_commit_wait": 2000}}` overrides only what it
//! names.

use crate::error::{Error, Result};
use crate::{pids, HOLTEK_VID};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;
use std::time::Duration;

/// Delays and timeouts used by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Pause after every frame and payload.
    #[serde(with = "millis")]
    pub inter_frame_delay: Duration,
    /// Pause after commit while the device copies flash into RAM.
    #[serde(with = "millis")]
    pub post_commit_wait: Duration,
    /// Upper bound on the handshake confirmation read.
    #[serde(with = "millis")]
    pub confirm_timeout: Duration,
    /// Send a stop frame right after the commit sector.
    pub stop_after_commit: bool,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            inter_frame_delay: Duration::from_millis(10),
            post_commit_wait: Duration::from_millis(1500),
            confirm_timeout: Duration::from_millis(1000),
            stop_after_commit: false,
        }
    }
}

/// Which HID device to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub vid: u16,
    pub pid: u16,
    /// Interface carrying feature reports. `None` picks the first match.
    pub feature_interface: Option<i32>,
    /// Interface carrying output reports. `None` uses the feature interface.
    pub output_interface: Option<i32>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vid: HOLTEK_VID,
            pid: pids::ARMOR_M1,
            feature_interface: None,
            output_interface: None,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub timing: TimingConfig,
}

/// Load a configuration file. Missing fields keep their defaults.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
    serde_json::from_str(&text).map_err(|e| Error::Config(format!("parse {}: {e}", path.display())))
}

mod millis {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
