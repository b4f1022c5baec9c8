//! Commander Pro device characteristics
//!
//! Fixed identifiers and channel counts for the Corsair Commander Pro.
//! The controller speaks a stateless request/response protocol over 64-byte
//! HID reports; these constants bound every request the driver frames.

/// USB Vendor ID (Corsair).
pub const USB_VID: u16 = 0x1B1C;

/// USB Product ID (Commander Pro).
pub const USB_PID: u16 = 0x0C10;

/// Fixed HID report length for both requests and responses, in bytes.
pub const REPORT_LENGTH: usize = 64;

/// Number of fan channels on the controller.
pub const FAN_CHANNELS: u8 = 6;

/// Number of temperature sensor channels on the controller.
pub const TEMP_CHANNELS: u8 = 4;

/// Default read timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Maximum fan duty percentage.
pub const MAX_DUTY: u8 = 100;

/// Validate a fan channel index against this device's channel count
pub fn validate_fan_channel(channel: u8) -> crate::Result<()> {
    if channel >= FAN_CHANNELS {
        return Err(crate::CommanderError::InvalidChannel {
            channel,
            max_channels: FAN_CHANNELS,
        });
    }
    Ok(())
}

/// Validate a temperature channel index against this device's channel count
pub fn validate_temp_channel(channel: u8) -> crate::Result<()> {
    if channel >= TEMP_CHANNELS {
        return Err(crate::CommanderError::InvalidChannel {
            channel,
            max_channels: TEMP_CHANNELS,
        });
    }
    Ok(())
}
