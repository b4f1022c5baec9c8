//! commander-hid
//!
//! USB HID driver for the Corsair Commander Pro fan and temperature
//! controller. The controller speaks a stateless request/response protocol
//! over fixed-length HID reports; this crate frames those requests, decodes
//! the responses, and keeps a per-channel sensor/control model current on a
//! host-driven poll cycle.
//!
//! Public API:
//! - [`controller::CommanderPro`] — controller session: discovery, polling,
//!   duty writes
//! - [`hid_driver::HidDriver`] — low-level HID report I/O
//! - [`hid_driver::find_device`] — helper to locate the device by VID/PID
//!
//! ```no_run
//! use commander_core::DriverConfig;
//! use commander_hid::{find_device, CommanderPro};
//!
//! # async fn run() {
//! let path = find_device().unwrap();
//! let session = CommanderPro::open(&path, &DriverConfig::default()).await;
//!
//! session.update().await;
//! for fan in session.fan_sensors() {
//!     println!("fan {}: {:?} rpm", fan.channel(), fan.rpm());
//! }
//! # }
//! ```

pub mod controller;
pub mod hid_driver;
pub mod model;
pub mod protocol;

pub use controller::CommanderPro;
pub use hid_driver::{find_device, is_disconnect_error, HidDriver, HidTransport};
pub use model::{ControlEvent, ControlEventKind, FanControl, FanSensor, TemperatureSensor};
