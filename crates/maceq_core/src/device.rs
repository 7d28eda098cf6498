//! Audio Device Enumeration and Management

use std::collections::HashSet;
use std::sync::Arc;

use maceq_platform::{AudioHardware, DeviceId, Scope, TransportKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::EngineResult;

/// Snapshot of one host audio device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Platform device handle
    pub id: DeviceId,

    /// Human-readable device name
    pub name: String,

    /// Device exposes an input stream configuration
    pub has_input: bool,

    /// Device exposes an output stream configuration
    pub has_output: bool,

    /// Device was the system default output at enumeration time
    pub is_default: bool,

    /// Virtual or aggregate device, usable as a system audio loopback
    pub is_virtual: bool,
}

/// Name fragments of common loopback drivers
const VIRTUAL_NAME_HINTS: [&str; 4] = ["blackhole", "soundflower", "virtual", "loopback"];

/// Whether a device name looks like a loopback driver
pub fn looks_virtual(name: &str) -> bool {
    let lower = name.to_lowercase();
    VIRTUAL_NAME_HINTS.iter().any(|hint| lower.contains(hint))
}

/// How to route system audio through the equalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopbackSetup {
    pub has_virtual_device: bool,

    /// Name of the first virtual device, if any
    pub recommended_device: Option<String>,

    pub instructions: String,
}

impl LoopbackSetup {
    pub fn from_devices(devices: &[AudioDevice]) -> Self {
        match devices.iter().find(|d| d.is_virtual) {
            Some(device) => {
                let name = &device.name;
                Self {
                    has_virtual_device: true,
                    recommended_device: Some(name.clone()),
                    instructions: format!(
                        "Virtual audio device found: {name}\n\n\
                         To equalize all system audio:\n\
                         1. Choose '{name}' as the system output in Sound settings\n\
                         2. Choose '{name}' as the input in MacEQ\n\
                         3. Choose your speakers or headphones as the output in MacEQ\n\
                         4. Start the equalizer"
                    ),
                }
            }
            None => Self {
                has_virtual_device: false,
                recommended_device: None,
                instructions: "No virtual audio device found.\n\n\
                     System-wide equalization needs a loopback driver such as \
                     BlackHole (https://github.com/ExistentialAudio/BlackHole).\n\
                     After installing it, restart MacEQ, make the loopback device \
                     the system output and select it as the input here."
                    .to_string(),
            },
        }
    }
}

/// Enumerates host devices and changes the system defaults
#[derive(Clone)]
pub struct DeviceCatalog {
    hardware: Arc<dyn AudioHardware>,
}

impl DeviceCatalog {
    pub fn new(hardware: Arc<dyn AudioHardware>) -> Self {
        Self { hardware }
    }

    pub fn backend_name(&self) -> &'static str {
        self.hardware.name()
    }

    /// List every device with its capabilities
    ///
    /// Never fails: a device whose name can't be read is skipped, a failed
    /// capability query reads as `false`, and a failed device list yields an
    /// empty result. Handles are unique; repeats keep the first occurrence.
    pub fn enumerate(&self) -> Vec<AudioDevice> {
        let ids = match self.hardware.device_ids() {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Failed to list audio devices: {}", e);
                return Vec::new();
            }
        };

        let default_output = match self.hardware.default_device(Scope::Output) {
            Ok(id) => Some(id),
            Err(e) => {
                debug!("Default output device unavailable: {}", e);
                None
            }
        };

        let mut seen = HashSet::with_capacity(ids.len());
        let mut devices = Vec::with_capacity(ids.len());

        for id in ids {
            if !seen.insert(id) {
                debug!("Skipping repeated device handle {}", id);
                continue;
            }

            let name = match self.hardware.device_name(id) {
                Ok(name) => name,
                Err(e) => {
                    debug!("Skipping device {}: {}", id, e);
                    continue;
                }
            };

            let transport = self.hardware.transport(id).unwrap_or_else(|e| {
                debug!("Transport query failed for '{}': {}", name, e);
                TransportKind::Unknown
            });

            devices.push(AudioDevice {
                id,
                has_input: self.capability(id, &name, Scope::Input),
                has_output: self.capability(id, &name, Scope::Output),
                is_default: default_output == Some(id),
                is_virtual: transport.is_virtual() || looks_virtual(&name),
                name,
            });
        }

        debug!("Enumerated {} audio devices", devices.len());
        devices
    }

    fn capability(&self, id: DeviceId, name: &str, scope: Scope) -> bool {
        self.hardware.has_streams(id, scope).unwrap_or_else(|e| {
            debug!("{} capability query failed for '{}': {}", scope, name, e);
            false
        })
    }

    /// Write the system default input and/or output device
    ///
    /// `None` leaves that direction alone. Both directions are attempted;
    /// the first failure is returned.
    pub fn set_default(
        &self,
        input: Option<&AudioDevice>,
        output: Option<&AudioDevice>,
    ) -> EngineResult<()> {
        let mut first_error = None;

        for (scope, device) in [(Scope::Input, input), (Scope::Output, output)] {
            let Some(device) = device else {
                continue;
            };
            match self.hardware.set_default_device(scope, device.id) {
                Ok(()) => info!("System default {} device set to '{}'", scope, device.name),
                Err(e) => {
                    warn!(
                        "Failed to set default {} device to '{}': {}",
                        scope, device.name, e
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maceq_dsp::AudioFormat;
    use maceq_platform::{SimulatedDevice, SimulatedHardware};

    use crate::error::EngineError;

    fn stereo() -> AudioFormat {
        AudioFormat::new(48000, 2)
    }

    fn catalog(hw: &SimulatedHardware) -> DeviceCatalog {
        DeviceCatalog::new(Arc::new(hw.clone()))
    }

    #[test]
    fn test_enumerate_demo() {
        let hw = SimulatedHardware::demo();
        let devices = catalog(&hw).enumerate();

        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "MacBook Pro Microphone",
                "MacBook Pro Speakers",
                "BlackHole 2ch",
                "USB Audio Interface"
            ]
        );

        let speakers = &devices[1];
        assert!(speakers.has_output && !speakers.has_input);
        assert!(speakers.is_default);
        assert!(!devices[0].is_default);
        assert!(devices[2].is_virtual);
        assert!(!devices[3].is_virtual);
    }

    #[test]
    fn test_handles_unique_and_single_default() {
        let hw = SimulatedHardware::demo();
        hw.report_duplicate(45);
        hw.report_duplicate(38);
        let devices = catalog(&hw).enumerate();

        let ids: HashSet<DeviceId> = devices.iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), devices.len());
        assert_eq!(devices.len(), 4);
        assert_eq!(
            devices.iter().filter(|d| d.has_output && d.is_default).count(),
            1
        );
    }

    #[test]
    fn test_unnamed_device_skipped() {
        let hw = SimulatedHardware::new()
            .with_device(SimulatedDevice::new(1, "?").unnamed().with_output(stereo()))
            .with_device(SimulatedDevice::new(2, "Speakers").with_output(stereo()));
        let devices = catalog(&hw).enumerate();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, 2);
    }

    #[test]
    fn test_capability_failure_reads_false() {
        let hw = SimulatedHardware::new().with_device(
            SimulatedDevice::new(5, "Flaky DAC")
                .with_output(stereo())
                .with_failing_queries(),
        );
        let devices = catalog(&hw).enumerate();
        assert_eq!(devices.len(), 1);
        assert!(!devices[0].has_input);
        assert!(!devices[0].has_output);
        assert!(!devices[0].is_virtual);
    }

    #[test]
    fn test_default_query_failure() {
        let hw = SimulatedHardware::demo();
        hw.fail_default_query(true);
        let devices = catalog(&hw).enumerate();
        assert_eq!(devices.len(), 4);
        assert!(devices.iter().all(|d| !d.is_default));
    }

    #[test]
    fn test_device_list_failure_is_empty() {
        let hw = SimulatedHardware::demo();
        hw.fail_device_list(true);
        assert!(catalog(&hw).enumerate().is_empty());
    }

    #[test]
    fn test_name_heuristic() {
        assert!(looks_virtual("BlackHole 16ch"));
        assert!(looks_virtual("Soundflower (2ch)"));
        assert!(looks_virtual("Loopback Audio"));
        assert!(!looks_virtual("MacBook Pro Speakers"));
    }

    #[test]
    fn test_set_default_writes_both_directions() {
        let hw = SimulatedHardware::demo();
        let catalog = catalog(&hw);
        let devices = catalog.enumerate();
        let blackhole = devices.iter().find(|d| d.id == 62).unwrap();
        let usb = devices.iter().find(|d| d.id == 71).unwrap();

        catalog.set_default(Some(blackhole), Some(usb)).unwrap();
        assert_eq!(
            hw.default_writes(),
            vec![(Scope::Input, 62), (Scope::Output, 71)]
        );

        catalog.set_default(None, None).unwrap();
        assert_eq!(hw.default_writes().len(), 2);

        let refreshed = catalog.enumerate();
        assert!(refreshed.iter().find(|d| d.id == 71).unwrap().is_default);
    }

    #[test]
    fn test_set_default_failure_reported() {
        let hw = SimulatedHardware::demo();
        let catalog = catalog(&hw);
        let devices = catalog.enumerate();
        hw.fail_default_writes(true);

        let result = catalog.set_default(None, Some(&devices[1]));
        assert!(matches!(result, Err(EngineError::PlatformError(_))));
        assert!(hw.default_writes().is_empty());
    }

    #[test]
    fn test_loopback_setup() {
        let hw = SimulatedHardware::demo();
        let setup = LoopbackSetup::from_devices(&catalog(&hw).enumerate());
        assert!(setup.has_virtual_device);
        assert_eq!(setup.recommended_device.as_deref(), Some("BlackHole 2ch"));
        assert!(setup.instructions.contains("BlackHole 2ch"));

        let bare = SimulatedHardware::new()
            .with_device(SimulatedDevice::new(1, "Speakers").with_output(stereo()));
        let setup = LoopbackSetup::from_devices(&catalog(&bare).enumerate());
        assert!(!setup.has_virtual_device);
        assert_eq!(setup.recommended_device, None);
    }

    #[test]
    fn test_device_serialization() {
        let hw = SimulatedHardware::demo();
        let devices = catalog(&hw).enumerate();
        let json = serde_json::to_string(&devices).unwrap();
        let back: Vec<AudioDevice> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, devices);
    }
}
