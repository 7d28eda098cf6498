//! cpal Hardware Backend
//!
//! Portable fallback used on hosts without a CoreAudio HAL. cpal identifies
//! devices by name only, so handles are assigned from a name registry that
//! lives as long as the backend. Two devices sharing a name share a handle.
//!
//! cpal cannot change the system default device; `set_default_device`
//! reports `FeatureNotAvailable`.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;
use maceq_dsp::AudioFormat;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::PlatformError;
use crate::traits::{AudioHardware, DeviceId, Scope, TransportKind};

pub struct CpalHardware {
    /// Index + 1 is the handle
    names: Mutex<Vec<String>>,
}

impl CpalHardware {
    pub fn new() -> Self {
        Self {
            names: Mutex::new(Vec::new()),
        }
    }

    fn register(&self, name: &str) -> DeviceId {
        let mut names = self.names.lock();
        if let Some(pos) = names.iter().position(|n| n == name) {
            return pos as DeviceId + 1;
        }
        names.push(name.to_string());
        names.len() as DeviceId
    }

    fn lookup(&self, id: DeviceId) -> Result<String, PlatformError> {
        let names = self.names.lock();
        (id as usize)
            .checked_sub(1)
            .and_then(|i| names.get(i))
            .cloned()
            .ok_or(PlatformError::DeviceNotFound(id))
    }

    fn device(&self, id: DeviceId) -> Result<Device, PlatformError> {
        let wanted = self.lookup(id)?;
        let host = cpal::default_host();
        host.devices()
            .map_err(|e| PlatformError::Backend(e.to_string()))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or(PlatformError::DeviceNotFound(id))
    }
}

impl Default for CpalHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioHardware for CpalHardware {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn device_ids(&self) -> Result<Vec<DeviceId>, PlatformError> {
        let host = cpal::default_host();
        let devices = host
            .devices()
            .map_err(|e| PlatformError::Backend(e.to_string()))?;

        let mut ids = Vec::new();
        for device in devices {
            match device.name() {
                Ok(name) => ids.push(self.register(&name)),
                Err(e) => trace!("Skipping device without a name: {}", e),
            }
        }
        Ok(ids)
    }

    fn device_name(&self, id: DeviceId) -> Result<String, PlatformError> {
        self.lookup(id)
    }

    fn has_streams(&self, id: DeviceId, scope: Scope) -> Result<bool, PlatformError> {
        let device = self.device(id)?;
        let count = match scope {
            Scope::Input => device
                .supported_input_configs()
                .map_err(|e| PlatformError::Backend(e.to_string()))?
                .count(),
            Scope::Output => device
                .supported_output_configs()
                .map_err(|e| PlatformError::Backend(e.to_string()))?
                .count(),
        };
        Ok(count > 0)
    }

    fn default_device(&self, scope: Scope) -> Result<DeviceId, PlatformError> {
        let host = cpal::default_host();
        let device = match scope {
            Scope::Input => host.default_input_device(),
            Scope::Output => host.default_output_device(),
        }
        .ok_or(PlatformError::NoDefaultDevice(scope))?;

        let name = device
            .name()
            .map_err(|e| PlatformError::Backend(e.to_string()))?;
        Ok(self.register(&name))
    }

    fn set_default_device(&self, scope: Scope, _id: DeviceId) -> Result<(), PlatformError> {
        Err(PlatformError::FeatureNotAvailable(format!(
            "changing the default {} device",
            scope
        )))
    }

    fn native_format(&self, id: DeviceId, scope: Scope) -> Result<AudioFormat, PlatformError> {
        let device = self.device(id)?;
        let config = match scope {
            Scope::Input => device.default_input_config(),
            Scope::Output => device.default_output_config(),
        }
        .map_err(|e| PlatformError::Backend(e.to_string()))?;

        Ok(AudioFormat::new(config.sample_rate().0, config.channels()))
    }

    fn transport(&self, _id: DeviceId) -> Result<TransportKind, PlatformError> {
        Ok(TransportKind::Unknown)
    }
}
