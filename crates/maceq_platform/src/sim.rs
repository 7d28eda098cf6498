//! Simulated Audio Hardware
//!
//! In-memory device table with failure injection. Used by tests and by the
//! host binary when no real audio subsystem should be touched.

use std::sync::Arc;

use maceq_dsp::AudioFormat;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::PlatformError;
use crate::traits::{AudioHardware, DeviceId, Scope, TransportKind};

/// One device in the simulated table
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub id: DeviceId,
    /// `None` makes the name query fail
    pub name: Option<String>,
    pub input: Option<AudioFormat>,
    pub output: Option<AudioFormat>,
    pub transport: TransportKind,
    /// Capability and transport queries fail
    pub failing_queries: bool,
}

impl SimulatedDevice {
    pub fn new(id: DeviceId, name: &str) -> Self {
        Self {
            id,
            name: Some(name.to_string()),
            input: None,
            output: None,
            transport: TransportKind::BuiltIn,
            failing_queries: false,
        }
    }

    pub fn with_input(mut self, format: AudioFormat) -> Self {
        self.input = Some(format);
        self
    }

    pub fn with_output(mut self, format: AudioFormat) -> Self {
        self.output = Some(format);
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn unnamed(mut self) -> Self {
        self.name = None;
        self
    }

    pub fn with_failing_queries(mut self) -> Self {
        self.failing_queries = true;
        self
    }

    fn format(&self, scope: Scope) -> Option<AudioFormat> {
        match scope {
            Scope::Input => self.input,
            Scope::Output => self.output,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    devices: Vec<SimulatedDevice>,
    /// Handles reported by `device_ids`; may repeat
    reported: Vec<DeviceId>,
    default_input: Option<DeviceId>,
    default_output: Option<DeviceId>,
    fail_device_list: bool,
    fail_default_query: bool,
    fail_default_writes: bool,
    default_writes: Vec<(Scope, DeviceId)>,
}

impl SimState {
    fn device(&self, id: DeviceId) -> Result<&SimulatedDevice, PlatformError> {
        self.devices
            .iter()
            .find(|d| d.id == id)
            .ok_or(PlatformError::DeviceNotFound(id))
    }
}

/// Cloneable handle to a shared simulated device table
#[derive(Debug, Clone, Default)]
pub struct SimulatedHardware {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedHardware {
    /// Empty device table
    pub fn new() -> Self {
        Self::default()
    }

    /// A typical laptop with a loopback driver installed
    pub fn demo() -> Self {
        let stereo = AudioFormat::new(48000, 2);
        let hw = Self::new()
            .with_device(
                SimulatedDevice::new(38, "MacBook Pro Microphone")
                    .with_input(AudioFormat::new(48000, 1)),
            )
            .with_device(SimulatedDevice::new(45, "MacBook Pro Speakers").with_output(stereo))
            .with_device(
                SimulatedDevice::new(62, "BlackHole 2ch")
                    .with_input(stereo)
                    .with_output(stereo)
                    .with_transport(TransportKind::Virtual),
            )
            .with_device(
                SimulatedDevice::new(71, "USB Audio Interface")
                    .with_input(AudioFormat::new(44100, 2))
                    .with_output(AudioFormat::new(44100, 2))
                    .with_transport(TransportKind::Usb),
            );
        hw.set_defaults(Some(38), Some(45));
        hw
    }

    /// Append a device, reported once in `device_ids`
    pub fn with_device(self, device: SimulatedDevice) -> Self {
        {
            let mut state = self.state.lock();
            state.reported.push(device.id);
            state.devices.push(device);
        }
        self
    }

    /// Report `id` a second time in `device_ids`
    pub fn report_duplicate(&self, id: DeviceId) {
        self.state.lock().reported.push(id);
    }

    pub fn set_defaults(&self, input: Option<DeviceId>, output: Option<DeviceId>) {
        let mut state = self.state.lock();
        state.default_input = input;
        state.default_output = output;
    }

    pub fn fail_device_list(&self, fail: bool) {
        self.state.lock().fail_device_list = fail;
    }

    pub fn fail_default_query(&self, fail: bool) {
        self.state.lock().fail_default_query = fail;
    }

    pub fn fail_default_writes(&self, fail: bool) {
        self.state.lock().fail_default_writes = fail;
    }

    /// Successful default-device writes, oldest first
    pub fn default_writes(&self) -> Vec<(Scope, DeviceId)> {
        self.state.lock().default_writes.clone()
    }
}

impl AudioHardware for SimulatedHardware {
    fn name(&self) -> &'static str {
        "Simulated"
    }

    fn device_ids(&self) -> Result<Vec<DeviceId>, PlatformError> {
        let state = self.state.lock();
        if state.fail_device_list {
            return Err(PlatformError::PropertyQueryFailed {
                property: "devices",
                status: -1,
            });
        }
        Ok(state.reported.clone())
    }

    fn device_name(&self, id: DeviceId) -> Result<String, PlatformError> {
        let state = self.state.lock();
        state.device(id)?.name.clone().ok_or(PlatformError::PropertyQueryFailed {
            property: "name",
            status: -1,
        })
    }

    fn has_streams(&self, id: DeviceId, scope: Scope) -> Result<bool, PlatformError> {
        let state = self.state.lock();
        let device = state.device(id)?;
        if device.failing_queries {
            return Err(PlatformError::PropertyQueryFailed {
                property: "stream configuration",
                status: -1,
            });
        }
        Ok(device.format(scope).is_some())
    }

    fn default_device(&self, scope: Scope) -> Result<DeviceId, PlatformError> {
        let state = self.state.lock();
        if state.fail_default_query {
            return Err(PlatformError::PropertyQueryFailed {
                property: "default device",
                status: -1,
            });
        }
        let id = match scope {
            Scope::Input => state.default_input,
            Scope::Output => state.default_output,
        };
        id.ok_or(PlatformError::NoDefaultDevice(scope))
    }

    fn set_default_device(&self, scope: Scope, id: DeviceId) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        if state.fail_default_writes {
            return Err(PlatformError::PropertyWriteFailed {
                property: "default device",
                status: -1,
            });
        }
        state.device(id)?;
        match scope {
            Scope::Input => state.default_input = Some(id),
            Scope::Output => state.default_output = Some(id),
        }
        state.default_writes.push((scope, id));
        debug!("Simulated default {} device set to {}", scope, id);
        Ok(())
    }

    fn native_format(&self, id: DeviceId, scope: Scope) -> Result<AudioFormat, PlatformError> {
        let state = self.state.lock();
        state.device(id)?.format(scope).ok_or_else(|| {
            PlatformError::FeatureNotAvailable(format!("device {} has no {} streams", id, scope))
        })
    }

    fn transport(&self, id: DeviceId) -> Result<TransportKind, PlatformError> {
        let state = self.state.lock();
        let device = state.device(id)?;
        if device.failing_queries {
            return Err(PlatformError::PropertyQueryFailed {
                property: "transport type",
                status: -1,
            });
        }
        Ok(device.transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_table() {
        let hw = SimulatedHardware::demo();
        assert_eq!(hw.device_ids().unwrap(), vec![38, 45, 62, 71]);
        assert_eq!(hw.device_name(62).unwrap(), "BlackHole 2ch");
        assert!(hw.has_streams(62, Scope::Input).unwrap());
        assert!(!hw.has_streams(45, Scope::Input).unwrap());
        assert_eq!(hw.default_device(Scope::Output).unwrap(), 45);
        assert_eq!(hw.transport(62).unwrap(), TransportKind::Virtual);
        assert_eq!(
            hw.native_format(38, Scope::Input).unwrap(),
            AudioFormat::new(48000, 1)
        );
    }

    #[test]
    fn test_failure_injection() {
        let hw = SimulatedHardware::new()
            .with_device(SimulatedDevice::new(1, "x").unnamed())
            .with_device(SimulatedDevice::new(2, "Broken").with_failing_queries());

        assert!(hw.device_name(1).is_err());
        assert!(hw.has_streams(2, Scope::Output).is_err());
        assert!(hw.transport(2).is_err());
        assert_eq!(
            hw.default_device(Scope::Output),
            Err(PlatformError::NoDefaultDevice(Scope::Output))
        );

        hw.fail_device_list(true);
        assert!(hw.device_ids().is_err());
    }

    #[test]
    fn test_default_writes_recorded() {
        let hw = SimulatedHardware::demo();
        hw.set_default_device(Scope::Output, 62).unwrap();
        assert_eq!(hw.default_device(Scope::Output).unwrap(), 62);
        assert_eq!(hw.default_writes(), vec![(Scope::Output, 62)]);

        assert_eq!(
            hw.set_default_device(Scope::Input, 999),
            Err(PlatformError::DeviceNotFound(999))
        );

        hw.fail_default_writes(true);
        assert!(hw.set_default_device(Scope::Input, 62).is_err());
        assert_eq!(hw.default_writes().len(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let hw = SimulatedHardware::demo();
        let handle = hw.clone();
        hw.report_duplicate(45);
        assert_eq!(handle.device_ids().unwrap(), vec![38, 45, 62, 71, 45]);
    }
}
