//! Error types for the Commander Pro driver

use thiserror::Error;

/// Core error type for Commander Pro operations
#[derive(Error, Debug)]
pub enum CommanderError {
    /// HID transport errors (write failed, device unreachable)
    #[error("HID error: {0}")]
    Hid(String),

    /// Malformed or unexpected response data
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid input or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Channel index out of range
    #[error("Channel index out of range: {channel} (must be 0-{max})", max = max_channels - 1)]
    InvalidChannel { channel: u8, max_channels: u8 },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read did not complete within the configured timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Device not found during enumeration
    #[error("Device not found")]
    DeviceNotFound,

    /// Device disconnected (USB unplugged, power cycle)
    #[error("Device disconnected: {0}")]
    DeviceDisconnected(String),
}

/// Result type alias for Commander Pro operations
pub type Result<T> = std::result::Result<T, CommanderError>;
