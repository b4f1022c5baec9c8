//! Core types and data structures for the Commander Pro driver

use serde::{Deserialize, Serialize};

/// Connection mode reported for one fan channel.
///
/// The device reports one byte per channel; anything it does not recognize
/// is treated as a disconnected header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanMode {
    /// No fan present on the channel
    Disconnected,
    /// Three-pin (DC voltage controlled) fan
    ThreePin,
    /// Four-pin (PWM controlled) fan
    FourPin,
}

impl FanMode {
    /// Decode a raw mode byte from a fan-modes response
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x01 => FanMode::ThreePin,
            0x02 => FanMode::FourPin,
            _ => FanMode::Disconnected,
        }
    }

    /// Whether a fan is attached to the channel
    pub fn is_connected(&self) -> bool {
        !matches!(self, FanMode::Disconnected)
    }
}

/// Connection state reported for one temperature sensor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureMode {
    /// No probe attached
    Disconnected,
    /// Thermistor probe attached
    Connected,
}

impl TemperatureMode {
    /// Decode a raw mode byte from a temperature-config response
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x01 => TemperatureMode::Connected,
            _ => TemperatureMode::Disconnected,
        }
    }

    /// Whether a probe is attached to the channel
    pub fn is_connected(&self) -> bool {
        matches!(self, TemperatureMode::Connected)
    }
}

/// Who drives a fan channel's duty cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    /// The device manages the fan itself; the driver issues no duty writes
    Hardware,
    /// The host supplies the duty value; changes are written to the device
    Software,
}

/// Firmware and bootloader versions captured once at connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareIdentity {
    /// Firmware version string, e.g. "0.9.212"
    pub firmware: String,
    /// Bootloader version string, e.g. "0.5"
    pub bootloader: String,
}
