//! Command protocol layer
//!
//! Turns one logical operation into exactly one locked request/response
//! exchange. Requests are fixed-length reports: byte 0 carries the opcode,
//! the payload follows at fixed offsets, the rest is zero padding. Response
//! offsets are opcode-specific and fixed.

use std::collections::HashMap;

use commander_core::{device, FanMode, Result, TemperatureMode};
use tokio::sync::Mutex;
use tracing::debug;

use crate::hid_driver::HidTransport;

pub use commander_core::device::REPORT_LENGTH;

/// Opcodes understood by the controller
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Get firmware version (0x02)
    GetFirmwareVersion = 0x02,
    /// Get bootloader version (0x06)
    GetBootloaderVersion = 0x06,
    /// Get temperature sensor configuration (0x10)
    GetTemperatureConfig = 0x10,
    /// Get one temperature reading (0x11)
    GetTemperature = 0x11,
    /// Get connection mode for all fan channels (0x20)
    GetFanModes = 0x20,
    /// Get one fan RPM reading (0x21)
    GetFanRpm = 0x21,
    /// Get one fan duty reading (0x22)
    GetFanDuty = 0x22,
    /// Set one fan duty value (0x23)
    SetFanDuty = 0x23,
}

/// Frame a request report: opcode first, payload next, zero padding after.
pub fn build_request(opcode: Opcode, payload: &[u8]) -> [u8; REPORT_LENGTH] {
    let mut request = [0u8; REPORT_LENGTH];
    request[0] = opcode as u8;
    request[1..1 + payload.len()].copy_from_slice(payload);
    request
}

/// Perform one locked request/response exchange.
///
/// The transport mutex is the sole guard against interleaved exchanges on
/// the single-duplex report stream; the guard is dropped on every exit
/// path, errors included.
pub async fn transaction<T: HidTransport + ?Sized>(
    transport: &Mutex<Box<T>>,
    opcode: Opcode,
    payload: &[u8],
) -> Result<[u8; REPORT_LENGTH]> {
    let request = build_request(opcode, payload);

    let mut guard = transport.lock().await;
    debug!("Sending command: {:?}", opcode);
    guard.transaction(&request).await
}

/// Read the firmware version, e.g. "0.9.212".
pub async fn get_firmware_version<T: HidTransport + ?Sized>(
    transport: &Mutex<Box<T>>,
) -> Result<String> {
    let response = transaction(transport, Opcode::GetFirmwareVersion, &[]).await?;
    Ok(format!(
        "{}.{}.{}",
        response[1], response[2], response[3]
    ))
}

/// Read the bootloader version, e.g. "0.5".
pub async fn get_bootloader_version<T: HidTransport + ?Sized>(
    transport: &Mutex<Box<T>>,
) -> Result<String> {
    let response = transaction(transport, Opcode::GetBootloaderVersion, &[]).await?;
    Ok(format!("{}.{}", response[1], response[2]))
}

/// Read the connection mode of every fan channel.
pub async fn get_fan_modes<T: HidTransport + ?Sized>(
    transport: &Mutex<Box<T>>,
) -> Result<HashMap<u8, FanMode>> {
    let response = transaction(transport, Opcode::GetFanModes, &[]).await?;

    let mut modes = HashMap::new();
    for channel in 0..device::FAN_CHANNELS {
        modes.insert(channel, FanMode::from_raw(response[1 + channel as usize]));
    }

    debug!("Fan modes: {:?}", modes);
    Ok(modes)
}

/// Read the connection state of every temperature sensor channel.
pub async fn get_temperature_config<T: HidTransport + ?Sized>(
    transport: &Mutex<Box<T>>,
) -> Result<HashMap<u8, TemperatureMode>> {
    let response = transaction(transport, Opcode::GetTemperatureConfig, &[]).await?;

    let mut config = HashMap::new();
    for channel in 0..device::TEMP_CHANNELS {
        config.insert(
            channel,
            TemperatureMode::from_raw(response[1 + channel as usize]),
        );
    }

    debug!("Temperature config: {:?}", config);
    Ok(config)
}

/// Read the current RPM of one fan channel.
pub async fn get_fan_rpm<T: HidTransport + ?Sized>(
    transport: &Mutex<Box<T>>,
    channel: u8,
) -> Result<u16> {
    device::validate_fan_channel(channel)?;

    let response = transaction(transport, Opcode::GetFanRpm, &[channel]).await?;
    Ok(u16::from_be_bytes([response[1], response[2]]))
}

/// Read the current duty percentage of one fan channel.
pub async fn get_fan_duty<T: HidTransport + ?Sized>(
    transport: &Mutex<Box<T>>,
    channel: u8,
) -> Result<u8> {
    device::validate_fan_channel(channel)?;

    let response = transaction(transport, Opcode::GetFanDuty, &[channel]).await?;
    Ok(response[2])
}

/// Write a duty percentage to one fan channel.
///
/// `duty` must already be clamped to 0-100; the acknowledgement report is
/// not decoded.
pub async fn set_fan_duty<T: HidTransport + ?Sized>(
    transport: &Mutex<Box<T>>,
    channel: u8,
    duty: u8,
) -> Result<()> {
    device::validate_fan_channel(channel)?;

    transaction(transport, Opcode::SetFanDuty, &[channel, duty]).await?;
    Ok(())
}

/// Read the current temperature of one sensor channel, in degrees Celsius.
///
/// The device reports hundredths of a degree as a 16-bit big-endian value.
pub async fn get_temperature<T: HidTransport + ?Sized>(
    transport: &Mutex<Box<T>>,
    channel: u8,
) -> Result<f32> {
    device::validate_temp_channel(channel)?;

    let response = transaction(transport, Opcode::GetTemperature, &[channel]).await?;
    let raw = u16::from_be_bytes([response[1], response[2]]);
    Ok(raw as f32 / 100.0)
}

/// Clamp a requested duty value to the 0-100 range the device accepts.
#[inline]
pub fn clamp_duty(requested: i32) -> u8 {
    requested.clamp(0, device::MAX_DUTY as i32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use commander_core::CommanderError;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Mock transport that replays queued responses and records requests
    struct MockTransport {
        responses: StdMutex<VecDeque<Result<[u8; REPORT_LENGTH]>>>,
        requests: StdMutex<Vec<[u8; REPORT_LENGTH]>>,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                responses: StdMutex::new(VecDeque::new()),
                requests: StdMutex::new(Vec::new()),
            }
        }

        fn queue_response(&self, response: [u8; REPORT_LENGTH]) {
            self.responses.lock().unwrap().push_back(Ok(response));
        }

        fn queue_error(&self) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(CommanderError::Timeout("read".to_string())));
        }

        fn requests(&self) -> Vec<[u8; REPORT_LENGTH]> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HidTransport for MockTransport {
        async fn transaction(
            &mut self,
            request: &[u8; REPORT_LENGTH],
        ) -> Result<[u8; REPORT_LENGTH]> {
            self.requests.lock().unwrap().push(*request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CommanderError::Hid("no response queued".to_string())))
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn device_path(&self) -> Option<&str> {
            None
        }
    }

    fn guarded(mock: MockTransport) -> Mutex<Box<MockTransport>> {
        Mutex::new(Box::new(mock))
    }

    fn response(bytes: &[u8]) -> [u8; REPORT_LENGTH] {
        let mut buffer = [0u8; REPORT_LENGTH];
        buffer[..bytes.len()].copy_from_slice(bytes);
        buffer
    }

    #[test]
    fn test_build_request_framing() {
        let request = build_request(Opcode::SetFanDuty, &[3, 75]);

        assert_eq!(request.len(), REPORT_LENGTH);
        assert_eq!(request[0], 0x23);
        assert_eq!(request[1], 3);
        assert_eq!(request[2], 75);
        // Everything past the payload is zero padding
        assert!(request[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_build_request_no_payload() {
        let request = build_request(Opcode::GetFanModes, &[]);

        assert_eq!(request[0], 0x20);
        assert!(request[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_opcode_values() {
        assert_eq!(Opcode::GetFirmwareVersion as u8, 0x02);
        assert_eq!(Opcode::GetBootloaderVersion as u8, 0x06);
        assert_eq!(Opcode::GetTemperatureConfig as u8, 0x10);
        assert_eq!(Opcode::GetTemperature as u8, 0x11);
        assert_eq!(Opcode::GetFanModes as u8, 0x20);
        assert_eq!(Opcode::GetFanRpm as u8, 0x21);
        assert_eq!(Opcode::GetFanDuty as u8, 0x22);
        assert_eq!(Opcode::SetFanDuty as u8, 0x23);
    }

    #[tokio::test]
    async fn test_get_firmware_version() {
        let mock = MockTransport::new();
        mock.queue_response(response(&[0x00, 0, 9, 212]));
        let transport = guarded(mock);

        let version = get_firmware_version(&transport).await.unwrap();
        assert_eq!(version, "0.9.212");
    }

    #[tokio::test]
    async fn test_get_bootloader_version() {
        let mock = MockTransport::new();
        mock.queue_response(response(&[0x00, 2, 3]));
        let transport = guarded(mock);

        let version = get_bootloader_version(&transport).await.unwrap();
        assert_eq!(version, "2.3");
    }

    #[tokio::test]
    async fn test_get_fan_modes() {
        let mock = MockTransport::new();
        // Channels: 3-pin, disconnected, 4-pin, disconnected, unknown byte, 3-pin
        mock.queue_response(response(&[0x00, 0x01, 0x00, 0x02, 0x00, 0x55, 0x01]));
        let transport = guarded(mock);

        let modes = get_fan_modes(&transport).await.unwrap();

        assert_eq!(modes.len(), 6);
        assert_eq!(modes[&0], FanMode::ThreePin);
        assert_eq!(modes[&1], FanMode::Disconnected);
        assert_eq!(modes[&2], FanMode::FourPin);
        assert_eq!(modes[&3], FanMode::Disconnected);
        assert_eq!(modes[&4], FanMode::Disconnected);
        assert_eq!(modes[&5], FanMode::ThreePin);
    }

    #[tokio::test]
    async fn test_get_temperature_config() {
        let mock = MockTransport::new();
        mock.queue_response(response(&[0x00, 0x01, 0x00, 0x00, 0x01]));
        let transport = guarded(mock);

        let config = get_temperature_config(&transport).await.unwrap();

        assert_eq!(config.len(), 4);
        assert!(config[&0].is_connected());
        assert!(!config[&1].is_connected());
        assert!(!config[&2].is_connected());
        assert!(config[&3].is_connected());
    }

    #[tokio::test]
    async fn test_get_fan_rpm_decodes_big_endian() {
        let mock = MockTransport::new();
        // 0x04B0 = 1200 RPM
        mock.queue_response(response(&[0x00, 0x04, 0xB0]));
        let transport = guarded(mock);

        let rpm = get_fan_rpm(&transport, 2).await.unwrap();
        assert_eq!(rpm, 1200);

        let requests = transport.lock().await.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0][0], 0x21);
        assert_eq!(requests[0][1], 2);
    }

    #[tokio::test]
    async fn test_get_fan_duty_offset() {
        let mock = MockTransport::new();
        mock.queue_response(response(&[0x00, 0x00, 67]));
        let transport = guarded(mock);

        let duty = get_fan_duty(&transport, 0).await.unwrap();
        assert_eq!(duty, 67);
    }

    #[tokio::test]
    async fn test_set_fan_duty_framing() {
        let mock = MockTransport::new();
        mock.queue_response(response(&[0x00]));
        let transport = guarded(mock);

        set_fan_duty(&transport, 4, 100).await.unwrap();

        let requests = transport.lock().await.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0][0], 0x23);
        assert_eq!(requests[0][1], 4);
        assert_eq!(requests[0][2], 100);
        assert!(requests[0][3..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn test_get_temperature_scaling() {
        let mock = MockTransport::new();
        // 0x09D0 = 2512 hundredths = 25.12 degrees
        mock.queue_response(response(&[0x00, 0x09, 0xD0]));
        let transport = guarded(mock);

        let value = get_temperature(&transport, 1).await.unwrap();
        assert!((value - 25.12).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_invalid_fan_channel_sends_nothing() {
        let mock = MockTransport::new();
        let transport = guarded(mock);

        let result = get_fan_rpm(&transport, 6).await;
        assert!(matches!(
            result.unwrap_err(),
            CommanderError::InvalidChannel { channel: 6, .. }
        ));

        assert!(transport.lock().await.requests().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_temp_channel_sends_nothing() {
        let mock = MockTransport::new();
        let transport = guarded(mock);

        let result = get_temperature(&transport, 4).await;
        assert!(result.is_err());
        assert!(transport.lock().await.requests().is_empty());
    }

    #[tokio::test]
    async fn test_lock_released_after_failed_transaction() {
        let mock = MockTransport::new();
        mock.queue_error();
        mock.queue_response(response(&[0x00, 0x04, 0xB0]));
        let transport = guarded(mock);

        let first = get_fan_rpm(&transport, 0).await;
        assert!(first.is_err());

        // The failed exchange must not leave the guard held
        let second = get_fan_rpm(&transport, 0).await.unwrap();
        assert_eq!(second, 1200);
    }

    #[test]
    fn test_clamp_duty_pins_range() {
        assert_eq!(clamp_duty(-5), 0);
        assert_eq!(clamp_duty(0), 0);
        assert_eq!(clamp_duty(42), 42);
        assert_eq!(clamp_duty(100), 100);
        assert_eq!(clamp_duty(150), 100);
        assert_eq!(clamp_duty(i32::MIN), 0);
        assert_eq!(clamp_duty(i32::MAX), 100);
    }

    #[test]
    fn test_clamp_duty_idempotent() {
        for requested in [-50, -1, 0, 1, 42, 99, 100, 101, 150, 10_000] {
            let once = clamp_duty(requested);
            let twice = clamp_duty(once as i32);
            assert_eq!(once, twice);
        }
    }
}
