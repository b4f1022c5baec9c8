//! HID driver for low-level device communication
//!
//! Provides raw report I/O with the Commander Pro over the platform HID
//! layer.

use async_trait::async_trait;
use commander_core::{CommanderError, DriverConfig, Result, REPORT_LENGTH, USB_PID, USB_VID};
use hidapi::{HidApi, HidDevice};
use std::ffi::CString;
use tracing::{debug, error, warn};

/// Trait for HID transport abstraction
///
/// This trait enables testing of the controller session without real
/// hardware by allowing mock implementations.
#[async_trait]
pub trait HidTransport: Send {
    /// Write one request report and read the matching response report.
    ///
    /// The device answers each request with exactly one report; the read is
    /// bounded by the configured timeout.
    async fn transaction(&mut self, request: &[u8; REPORT_LENGTH]) -> Result<[u8; REPORT_LENGTH]>;

    /// Check if the transport is connected
    fn is_connected(&self) -> bool;

    /// Get the device path for diagnostics
    fn device_path(&self) -> Option<&str>;
}

/// HID driver for hardware communication
pub struct HidDriver {
    device: HidDevice,
    device_path: String,
    timeout_ms: i32,
    debug_hid: bool,
}

impl HidDriver {
    /// Open the HID device at `device_path`.
    ///
    /// # Arguments
    /// * `device_path` - Platform path to the HID device (e.g., "/dev/hidraw3")
    /// * `config` - Read timeout and debug logging settings
    pub fn open(device_path: &str, config: &DriverConfig) -> Result<Self> {
        debug!("Opening HID device: {}", device_path);

        let api = HidApi::new().map_err(|e| {
            error!("Failed to initialize HID layer: {}", e);
            CommanderError::Hid(format!("Failed to initialize HID layer: {}", e))
        })?;

        let path = CString::new(device_path).map_err(|_| {
            CommanderError::InvalidInput(format!("Device path contains NUL: {}", device_path))
        })?;

        let device = api.open_path(&path).map_err(|e| {
            error!("Failed to open HID device {}: {}", device_path, e);
            CommanderError::Hid(format!("Failed to open HID device: {}", e))
        })?;

        debug!("HID device opened successfully");

        Ok(Self {
            device,
            device_path: device_path.to_string(),
            timeout_ms: i32::try_from(config.read_timeout_ms).unwrap_or(i32::MAX),
            debug_hid: config.debug_hid,
        })
    }
}

#[async_trait]
impl HidTransport for HidDriver {
    async fn transaction(&mut self, request: &[u8; REPORT_LENGTH]) -> Result<[u8; REPORT_LENGTH]> {
        // The HID layer wants the report ID in front of the payload; the
        // Commander Pro does not use numbered reports, so it is always zero.
        let mut tx = [0u8; REPORT_LENGTH + 1];
        tx[1..].copy_from_slice(request);

        if self.debug_hid {
            debug!("TX: {:02X?}", request);
        }

        self.device.write(&tx).map_err(|e| {
            error!("Write failed: {}", e);
            CommanderError::Hid(format!("Write failed: {}", e))
        })?;

        let mut response = [0u8; REPORT_LENGTH];
        let read = self
            .device
            .read_timeout(&mut response, self.timeout_ms)
            .map_err(|e| {
                error!("Read failed: {}", e);
                CommanderError::Hid(format!("Read failed: {}", e))
            })?;

        if read == 0 {
            warn!("Read timed out after {} ms", self.timeout_ms);
            return Err(CommanderError::Timeout(format!(
                "No response within {} ms",
                self.timeout_ms
            )));
        }
        if read < REPORT_LENGTH {
            return Err(CommanderError::Protocol(format!(
                "Short response: {} of {} bytes",
                read, REPORT_LENGTH
            )));
        }

        if self.debug_hid {
            debug!("RX: {:02X?}", &response[..read]);
        }

        Ok(response)
    }

    fn is_connected(&self) -> bool {
        // Best-effort check; actual disconnection is detected during I/O
        true
    }

    fn device_path(&self) -> Option<&str> {
        Some(&self.device_path)
    }
}

/// Find the Commander Pro by VID/PID
///
/// Enumerates HID devices and returns the platform path of the first match.
pub fn find_device() -> Result<String> {
    debug!(
        "Searching for Commander Pro (VID:0x{:04X}, PID:0x{:04X})",
        USB_VID, USB_PID
    );

    let api = HidApi::new().map_err(|e| {
        error!("Failed to enumerate HID devices: {}", e);
        CommanderError::Hid(format!("Failed to enumerate HID devices: {}", e))
    })?;

    for info in api.device_list() {
        if info.vendor_id() == USB_VID && info.product_id() == USB_PID {
            debug!("Found Commander Pro at: {:?}", info.path());
            return info
                .path()
                .to_str()
                .map(str::to_string)
                .map_err(|_| CommanderError::Hid("Device path is not valid UTF-8".to_string()));
        }
    }

    error!("Commander Pro not found");
    Err(CommanderError::DeviceNotFound)
}

/// Determine if an error indicates device disconnection
///
/// Returns `true` if the error suggests the device has been unplugged
/// rather than a transient failure.
pub fn is_disconnect_error(err: &CommanderError) -> bool {
    match err {
        CommanderError::DeviceDisconnected(_) => true,
        CommanderError::Hid(msg) => {
            let msg_lower = msg.to_lowercase();
            msg_lower.contains("no such device")
                || msg_lower.contains("device disconnected")
                || msg_lower.contains("broken pipe")
                || msg_lower.contains("input/output error")
        }
        // Timeouts are typically transient, not disconnection
        CommanderError::Timeout(_) => false,
        _ => false,
    }
}
