//! Commander Pro core library
//!
//! Shared types, errors, and configuration for the Commander Pro driver.
//! Hardware I/O lives in the `commander-hid` crate; this crate only holds
//! the pieces both the driver and its hosts need.

pub mod config;
pub mod device;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::DriverConfig;
pub use device::*;
pub use error::*;
pub use types::*;
