//! Controller session
//!
//! Owns the device connection for its lifetime: runs the discovery sequence
//! once at construction, re-reads every active channel on each poll, and
//! services duty-write notifications from the fan controls.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use commander_core::{ControlMode, DriverConfig, FirmwareIdentity, Result};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::hid_driver::{HidDriver, HidTransport};
use crate::model::{ControlEvent, FanControl, FanSensor, TemperatureSensor};
use crate::protocol;

/// One Commander Pro connection
///
/// Generic over the transport type, allowing real hardware ([`HidDriver`])
/// or mock transports for testing. All device access is serialized through
/// a single mutex-guarded transport handle.
pub struct CommanderPro<T: HidTransport + ?Sized = dyn HidTransport> {
    /// Guarded transport; `None` when the device failed to open
    transport: Option<Arc<Mutex<Box<T>>>>,
    fan_sensors: Vec<Arc<FanSensor>>,
    fan_controls: Vec<Arc<FanControl>>,
    temp_sensors: Vec<Arc<TemperatureSensor>>,
    firmware: Option<FirmwareIdentity>,
    report: String,
    duty_writer: Option<JoinHandle<()>>,
}

impl CommanderPro<HidDriver> {
    /// Open the device at `device_path` and run discovery.
    ///
    /// If the device cannot be opened the session is inert: no sensors, no
    /// controls, an empty report, and [`update`](Self::update) does nothing.
    /// Use [`is_connected`](Self::is_connected) to tell the cases apart.
    pub async fn open(device_path: &str, config: &DriverConfig) -> Self {
        match HidDriver::open(device_path, config) {
            Ok(driver) => Self::with_transport(Box::new(driver)).await,
            Err(e) => {
                warn!("Commander Pro unavailable, session is inert: {}", e);
                Self::inert()
            }
        }
    }
}

impl<T: HidTransport + ?Sized + 'static> CommanderPro<T> {
    /// Create a session over an already-open transport and run discovery.
    ///
    /// This is primarily useful for testing with mock transports.
    pub async fn with_transport(transport: Box<T>) -> Self {
        let mut session = Self::inert();
        session.transport = Some(Arc::new(Mutex::new(transport)));
        session.discover().await;
        session
    }

    fn inert() -> Self {
        Self {
            transport: None,
            fan_sensors: Vec::new(),
            fan_controls: Vec::new(),
            temp_sensors: Vec::new(),
            firmware: None,
            report: String::new(),
            duty_writer: None,
        }
    }

    /// Run the fixed discovery sequence, one transaction per step.
    ///
    /// A failing step logs a warning and leaves its part of the model
    /// empty; construction itself never fails.
    async fn discover(&mut self) {
        let transport = match &self.transport {
            Some(t) => Arc::clone(t),
            None => return,
        };

        if let Err(e) = self.discover_identity(&transport).await {
            warn!("Version discovery failed: {}", e);
        }
        if let Err(e) = self.discover_fans(&transport).await {
            warn!("Fan discovery failed: {}", e);
        }
        if let Err(e) = self.discover_temperatures(&transport).await {
            warn!("Temperature discovery failed: {}", e);
        }
    }

    async fn discover_identity(&mut self, transport: &Arc<Mutex<Box<T>>>) -> Result<()> {
        let firmware = protocol::get_firmware_version(transport).await?;
        let bootloader = protocol::get_bootloader_version(transport).await?;

        let path = {
            let guard = transport.lock().await;
            guard.device_path().unwrap_or("<unknown>").to_string()
        };
        let _ = writeln!(
            self.report,
            "Commander Pro at {} FirmwareVersion: {} BootloaderVersion: {}",
            path, firmware, bootloader
        );

        self.firmware = Some(FirmwareIdentity {
            firmware,
            bootloader,
        });
        Ok(())
    }

    async fn discover_fans(&mut self, transport: &Arc<Mutex<Box<T>>>) -> Result<()> {
        let modes = protocol::get_fan_modes(transport).await?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut channels: Vec<u8> = modes
            .iter()
            .filter(|(_, mode)| mode.is_connected())
            .map(|(channel, _)| *channel)
            .collect();
        channels.sort_unstable();

        for channel in channels {
            self.fan_controls
                .push(Arc::new(FanControl::new(channel, events_tx.clone())));
            self.fan_sensors.push(Arc::new(FanSensor::new(channel)));
            let _ = writeln!(self.report, "Fan index {} found", channel);
        }

        // Subscription held until close(); both event kinds funnel into the
        // same clamp-and-write handler.
        self.duty_writer = Some(Self::spawn_duty_writer(
            Arc::clone(transport),
            self.fan_controls.clone(),
            events_rx,
        ));
        Ok(())
    }

    async fn discover_temperatures(&mut self, transport: &Arc<Mutex<Box<T>>>) -> Result<()> {
        let config = protocol::get_temperature_config(transport).await?;

        let mut channels: Vec<u8> = config
            .iter()
            .filter(|(_, mode)| mode.is_connected())
            .map(|(channel, _)| *channel)
            .collect();
        channels.sort_unstable();

        for channel in channels {
            let sensor = Arc::new(TemperatureSensor::new(channel));
            match protocol::get_temperature(transport, channel).await {
                Ok(value) => sensor.set_value(value),
                Err(e) => warn!("Initial temperature read for channel {} failed: {}", channel, e),
            }
            self.temp_sensors.push(sensor);
            let _ = writeln!(self.report, "Temperature sensor index {} found", channel);
        }
        Ok(())
    }

    /// React to mode and software-value changes from the fan controls.
    ///
    /// While a control is in software mode, its requested duty is clamped
    /// to 0-100 and written to the device; in hardware mode the device
    /// manages the fan itself and no write is issued.
    fn spawn_duty_writer(
        transport: Arc<Mutex<Box<T>>>,
        controls: Vec<Arc<FanControl>>,
        mut events: mpsc::UnboundedReceiver<ControlEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let by_channel: HashMap<u8, Arc<FanControl>> = controls
                .into_iter()
                .map(|control| (control.channel(), control))
                .collect();

            while let Some(event) = events.recv().await {
                debug!("Control event {:?} for fan {}", event.kind, event.channel);

                let control = match by_channel.get(&event.channel) {
                    Some(control) => control,
                    None => continue,
                };

                if control.mode() != ControlMode::Software {
                    // The device has no default duty sequence to restore
                    continue;
                }

                let duty = protocol::clamp_duty(control.software_duty());
                if let Err(e) = protocol::set_fan_duty(&transport, event.channel, duty).await {
                    warn!("Duty write for fan {} failed: {}", event.channel, e);
                }
            }

            debug!("Duty-write subscription ended");
        })
    }

    /// Refresh every active sensor and control from the device.
    ///
    /// Each channel is read independently; a failed read leaves the prior
    /// cached value in place and the remaining channels are still polled.
    pub async fn update(&self) {
        let transport = match &self.transport {
            Some(t) => t,
            None => return,
        };

        for sensor in &self.fan_sensors {
            match protocol::get_fan_rpm(transport, sensor.channel()).await {
                Ok(rpm) => sensor.set_rpm(rpm),
                Err(e) => warn!("RPM read for fan {} failed: {}", sensor.channel(), e),
            }
        }

        for control in &self.fan_controls {
            match protocol::get_fan_duty(transport, control.channel()).await {
                Ok(duty) => control.set_duty(duty),
                Err(e) => warn!("Duty read for fan {} failed: {}", control.channel(), e),
            }
        }

        for sensor in &self.temp_sensors {
            match protocol::get_temperature(transport, sensor.channel()).await {
                Ok(value) => sensor.set_value(value),
                Err(e) => {
                    warn!(
                        "Temperature read for channel {} failed: {}",
                        sensor.channel(),
                        e
                    )
                }
            }
        }
    }

    /// Whether the session holds an open device connection
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Active fan RPM sensors, one per connected fan channel
    pub fn fan_sensors(&self) -> &[Arc<FanSensor>] {
        &self.fan_sensors
    }

    /// Active fan duty controls, one per connected fan channel
    pub fn fan_controls(&self) -> &[Arc<FanControl>] {
        &self.fan_controls
    }

    /// Active temperature sensors, one per connected probe
    pub fn temperature_sensors(&self) -> &[Arc<TemperatureSensor>] {
        &self.temp_sensors
    }

    /// Firmware and bootloader versions captured at discovery
    pub fn firmware_identity(&self) -> Option<&FirmwareIdentity> {
        self.firmware.as_ref()
    }

    /// Firmware version string, if discovery reached the device
    pub fn firmware_version(&self) -> Option<&str> {
        self.firmware.as_ref().map(|id| id.firmware.as_str())
    }

    /// Bootloader version string, if discovery reached the device
    pub fn bootloader_version(&self) -> Option<&str> {
        self.firmware.as_ref().map(|id| id.bootloader.as_str())
    }

    /// The discovery log, accumulated once at construction
    pub fn report(&self) -> &str {
        &self.report
    }

    /// Tear the session down: end the duty-write subscription, clear the
    /// sensor/control model, and drop the transport. Safe to call twice.
    pub fn close(&mut self) {
        if let Some(task) = self.duty_writer.take() {
            task.abort();
        }
        self.fan_sensors.clear();
        self.fan_controls.clear();
        self.temp_sensors.clear();
        // Dropping the driver closes the underlying device handle
        self.transport = None;
    }
}

impl<T: HidTransport + ?Sized> Drop for CommanderPro<T> {
    fn drop(&mut self) {
        if let Some(task) = self.duty_writer.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use commander_core::device::REPORT_LENGTH;

    /// Transport that answers every request with an all-zero report:
    /// firmware 0.0.0, every channel disconnected.
    struct EmptyDevice;

    #[async_trait]
    impl HidTransport for EmptyDevice {
        async fn transaction(
            &mut self,
            _request: &[u8; REPORT_LENGTH],
        ) -> Result<[u8; REPORT_LENGTH]> {
            Ok([0u8; REPORT_LENGTH])
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn device_path(&self) -> Option<&str> {
            Some("/dev/hidraw-test")
        }
    }

    #[tokio::test]
    async fn test_no_channels_connected() {
        let session = CommanderPro::with_transport(Box::new(EmptyDevice)).await;

        assert!(session.is_connected());
        assert_eq!(session.firmware_version(), Some("0.0.0"));
        assert_eq!(session.bootloader_version(), Some("0.0"));
        assert!(session.fan_sensors().is_empty());
        assert!(session.fan_controls().is_empty());
        assert!(session.temperature_sensors().is_empty());
        assert!(session.report().contains("/dev/hidraw-test"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut session = CommanderPro::with_transport(Box::new(EmptyDevice)).await;

        session.close();
        assert!(!session.is_connected());
        assert!(session.fan_sensors().is_empty());

        // Second close must be a no-op
        session.close();
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_update_after_close_is_noop() {
        let mut session = CommanderPro::with_transport(Box::new(EmptyDevice)).await;
        session.close();
        session.update().await;
    }
}
