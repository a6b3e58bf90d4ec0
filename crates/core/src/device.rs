//! Device discovery and the hidapi transport.

use crate::comm;
use crate::config::{DeviceConfig, TimingConfig};
use crate::error::{Error, Result};
use crate::packet::{self, CHUNK_LEN, COMMAND_LEN};
use crate::session::DeviceSession;
use crate::transport::{Channel, DeviceTransport};
use std::ffi::CString;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// hidapi report ID for devices without numbered reports.
const REPORT_ID: u8 = 0x00;

/// Poll interval while waiting for a feature report.
const READ_POLL: Duration = Duration::from_millis(10);

/// A matching HID interface.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub vid: u16,
    pub pid: u16,
    pub path: CString,
    pub interface_number: i32,
    pub product: Option<String>,
    pub serial: Option<String>,
}

/// Enumerate HID interfaces matching the configured VID/PID.
pub fn discover_devices(config: &DeviceConfig) -> Result<Vec<DeviceInfo>> {
    debug!("Starting HID device enumeration");
    let api = hidapi::HidApi::new().map_err(|e| Error::Hid(e.to_string()))?;
    Ok(matching_interfaces(&api, config))
}

fn matching_interfaces(api: &hidapi::HidApi, config: &DeviceConfig) -> Vec<DeviceInfo> {
    let mut devices = Vec::new();
    for info in api.device_list() {
        if info.vendor_id() != config.vid || info.product_id() != config.pid {
            continue;
        }
        info!(
            vid = format_args!("0x{:04X}", info.vendor_id()),
            pid = format_args!("0x{:04X}", info.product_id()),
            interface = info.interface_number(),
            path = %info.path().to_string_lossy(),
            "Found device interface"
        );
        devices.push(DeviceInfo {
            vid: info.vendor_id(),
            pid: info.product_id(),
            path: info.path().to_owned(),
            interface_number: info.interface_number(),
            product: info.product_string().map(str::to_string),
            serial: info.serial_number().map(str::to_string),
        });
    }
    debug!(count = devices.len(), "Device enumeration complete");
    devices
}

fn pick<'a>(devices: &'a [DeviceInfo], interface: Option<i32>) -> Option<&'a DeviceInfo> {
    match interface {
        Some(n) => devices.iter().find(|d| d.interface_number == n),
        None => devices.first(),
    }
}

/// Feature and output channels over hidapi.
///
/// The device does not number its reports, so report ID 0 is prepended to
/// every buffer.
pub struct HidapiTransport {
    feature: hidapi::HidDevice,
    /// Separate output interface, when it differs from the feature one.
    output: Option<hidapi::HidDevice>,
}

impl HidapiTransport {
    /// Open the configured interfaces.
    pub fn open(config: &DeviceConfig) -> Result<Self> {
        let api = hidapi::HidApi::new().map_err(|e| Error::Hid(e.to_string()))?;
        let devices = matching_interfaces(&api, config);
        let not_found = |which: &str| {
            Error::DeviceNotFound(format!(
                "no {which} interface for {:04X}:{:04X}",
                config.vid, config.pid
            ))
        };

        let feature_info =
            pick(&devices, config.feature_interface).ok_or_else(|| not_found("feature"))?;
        let feature = api
            .open_path(&feature_info.path)
            .map_err(|e| comm::open_error(&e.to_string(), config.vid, config.pid))?;

        let output = match config.output_interface {
            Some(n) if n != feature_info.interface_number => {
                let info = pick(&devices, Some(n)).ok_or_else(|| not_found("output"))?;
                let dev = api
                    .open_path(&info.path)
                    .map_err(|e| comm::open_error(&e.to_string(), config.vid, config.pid))?;
                Some(dev)
            }
            _ => None,
        };

        info!(
            vid = format_args!("0x{:04X}", config.vid),
            pid = format_args!("0x{:04X}", config.pid),
            feature_interface = feature_info.interface_number,
            separate_output = output.is_some(),
            "Device opened"
        );
        Ok(Self { feature, output })
    }

    fn output_device(&self) -> &hidapi::HidDevice {
        self.output.as_ref().unwrap_or(&self.feature)
    }
}

impl DeviceTransport for HidapiTransport {
    fn send_feature(&self, frame: &[u8; COMMAND_LEN]) -> Result<()> {
        let mut buf = [0u8; COMMAND_LEN + 1];
        buf[0] = REPORT_ID;
        buf[1..].copy_from_slice(frame);
        trace!(report_hex = %packet::to_hex(&buf), "HID feature TX");
        self.feature
            .send_feature_report(&buf)
            .map_err(|e| comm::write_error(Channel::Feature, &e.to_string()))
    }

    fn read_feature(&self, timeout: Duration) -> Result<[u8; COMMAND_LEN]> {
        let started = Instant::now();
        loop {
            let mut buf = [0u8; COMMAND_LEN + 1];
            buf[0] = REPORT_ID;
            let n = self
                .feature
                .get_feature_report(&mut buf)
                .map_err(|e| Error::Hid(format!("get_feature_report: {e}")))?;
            if n > 1 {
                trace!(report_hex = %packet::to_hex(&buf[..n]), "HID feature RX");
                let mut reply = [0u8; COMMAND_LEN];
                reply.copy_from_slice(&buf[1..]);
                return Ok(reply);
            }
            if started.elapsed() >= timeout {
                return Err(Error::Timeout(format!(
                    "no feature report within {} ms",
                    timeout.as_millis()
                )));
            }
            std::thread::sleep(READ_POLL);
        }
    }

    fn write_output(&self, chunk: &[u8; CHUNK_LEN]) -> Result<()> {
        let mut buf = [0u8; CHUNK_LEN + 1];
        buf[0] = REPORT_ID;
        buf[1..].copy_from_slice(chunk);
        let written = self
            .output_device()
            .write(&buf)
            .map_err(|e| comm::write_error(Channel::Output, &e.to_string()))?;
        check_output_written(written, buf.len())
    }
}

/// hidapi counts the report ID byte in the returned length.
fn check_output_written(written: usize, expected: usize) -> Result<()> {
    if written < expected {
        return Err(Error::TransportWriteFailed {
            channel: Channel::Output,
            detail: format!("short write: {written} of {expected} bytes"),
        });
    }
    Ok(())
}

/// Open the configured device and wrap it in an idle session.
pub fn open_session(
    device: &DeviceConfig,
    timing: TimingConfig,
) -> Result<DeviceSession<HidapiTransport>> {
    let transport = HidapiTransport::open(device)?;
    Ok(DeviceSession::new(transport, timing))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(interface: i32) -> DeviceInfo {
        DeviceInfo {
            vid: 0x04D9,
            pid: 0xA09F,
            path: CString::new(format!("/dev/hidraw{interface}")).unwrap(),
            interface_number: interface,
            product: None,
            serial: None,
        }
    }

    #[test]
    fn short_output_write_reports_expected_length() {
        assert!(check_output_written(CHUNK_LEN + 1, CHUNK_LEN + 1).is_ok());
        match check_output_written(CHUNK_LEN, CHUNK_LEN + 1) {
            Err(Error::TransportWriteFailed { channel, detail }) => {
                assert_eq!(channel, Channel::Output);
                assert_eq!(detail, "short write: 32 of 33 bytes");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn pick_defaults_to_first_interface() {
        let devices = [info(0), info(1)];
        assert_eq!(pick(&devices, None).unwrap().interface_number, 0);
        assert_eq!(pick(&devices, Some(1)).unwrap().interface_number, 1);
        assert!(pick(&devices, Some(2)).is_none());
        assert!(pick(&[], None).is_none());
    }
}
