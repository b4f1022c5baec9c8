//! Sensor and control entities
//!
//! Per-channel entities the controller session builds at discovery and the
//! host reads between polls. Readings are plain atomics so hosts can read
//! them from any thread without locking; only the poll cycle writes them.

use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU8, Ordering};

use commander_core::ControlMode;
use tokio::sync::mpsc;

/// Raw value marking a reading that has not been taken yet
const UNSET: u32 = u32::MAX;
const DUTY_UNSET: u8 = u8::MAX;

const MODE_HARDWARE: u8 = 0;
const MODE_SOFTWARE: u8 = 1;

/// Change notification emitted by a [`FanControl`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEvent {
    /// Fan channel the change applies to
    pub channel: u8,
    /// Which aspect of the control changed
    pub kind: ControlEventKind,
}

/// The two notification streams a control emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEventKind {
    /// The control mode was switched
    ModeChanged,
    /// The requested software duty was changed
    SoftwareValueChanged,
}

/// Read-only RPM reading for one fan channel
pub struct FanSensor {
    channel: u8,
    rpm: AtomicU32,
}

impl FanSensor {
    pub(crate) fn new(channel: u8) -> Self {
        Self {
            channel,
            rpm: AtomicU32::new(UNSET),
        }
    }

    /// Channel index this sensor reads from
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Latest RPM reading, or `None` before the first successful poll
    pub fn rpm(&self) -> Option<u16> {
        match self.rpm.load(Ordering::Relaxed) {
            UNSET => None,
            value => Some(value as u16),
        }
    }

    pub(crate) fn set_rpm(&self, rpm: u16) {
        self.rpm.store(rpm as u32, Ordering::Relaxed);
    }
}

/// Read-only temperature reading for one sensor channel
pub struct TemperatureSensor {
    channel: u8,
    /// f32 bit pattern; `UNSET` never collides with a real reading
    value: AtomicU32,
}

impl TemperatureSensor {
    pub(crate) fn new(channel: u8) -> Self {
        Self {
            channel,
            value: AtomicU32::new(UNSET),
        }
    }

    /// Channel index this sensor reads from
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Latest reading in degrees Celsius, or `None` before the first one
    pub fn value(&self) -> Option<f32> {
        match self.value.load(Ordering::Relaxed) {
            UNSET => None,
            bits => Some(f32::from_bits(bits)),
        }
    }

    pub(crate) fn set_value(&self, value: f32) {
        self.value.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Writable duty-cycle control for one fan channel
///
/// `set_mode` and `set_software_duty` emit change events on the session's
/// subscription channel; the session reacts by writing the clamped duty to
/// the device while the mode is [`ControlMode::Software`].
pub struct FanControl {
    channel: u8,
    /// Duty read back from the device on each poll
    duty: AtomicU8,
    mode: AtomicU8,
    software_duty: AtomicI32,
    events: mpsc::UnboundedSender<ControlEvent>,
}

impl FanControl {
    pub(crate) fn new(channel: u8, events: mpsc::UnboundedSender<ControlEvent>) -> Self {
        Self {
            channel,
            duty: AtomicU8::new(DUTY_UNSET),
            mode: AtomicU8::new(MODE_HARDWARE),
            software_duty: AtomicI32::new(0),
            events,
        }
    }

    /// Channel index this control drives
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Latest duty percentage read back from the device, or `None` before
    /// the first successful poll
    pub fn duty(&self) -> Option<u8> {
        match self.duty.load(Ordering::Relaxed) {
            DUTY_UNSET => None,
            value => Some(value),
        }
    }

    pub(crate) fn set_duty(&self, duty: u8) {
        self.duty.store(duty, Ordering::Relaxed);
    }

    /// Current control mode
    pub fn mode(&self) -> ControlMode {
        match self.mode.load(Ordering::Relaxed) {
            MODE_SOFTWARE => ControlMode::Software,
            _ => ControlMode::Hardware,
        }
    }

    /// Switch the control mode and notify the session
    pub fn set_mode(&self, mode: ControlMode) {
        let raw = match mode {
            ControlMode::Hardware => MODE_HARDWARE,
            ControlMode::Software => MODE_SOFTWARE,
        };
        self.mode.store(raw, Ordering::Relaxed);
        self.notify(ControlEventKind::ModeChanged);
    }

    /// Requested software duty, as last set by the host
    pub fn software_duty(&self) -> i32 {
        self.software_duty.load(Ordering::Relaxed)
    }

    /// Request a software duty value and notify the session
    ///
    /// Out-of-range values are accepted here and clamped to 0-100 when
    /// written to the device.
    pub fn set_software_duty(&self, duty: i32) {
        self.software_duty.store(duty, Ordering::Relaxed);
        self.notify(ControlEventKind::SoftwareValueChanged);
    }

    fn notify(&self, kind: ControlEventKind) {
        // After close() the session no longer listens; nothing to do then
        let _ = self.events.send(ControlEvent {
            channel: self.channel,
            kind,
        });
    }
}
