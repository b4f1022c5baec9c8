//! Driver configuration
//!
//! The driver persists nothing itself; hosts that keep settings on disk can
//! deserialize this from their own TOML section.

use serde::{Deserialize, Serialize};

use crate::device::DEFAULT_TIMEOUT_MS;

/// Runtime configuration for a controller session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Read timeout in milliseconds for each transaction
    pub read_timeout_ms: u64,
    /// Log raw TX/RX report bytes at debug level
    pub debug_hid: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: DEFAULT_TIMEOUT_MS,
            debug_hid: false,
        }
    }
}
