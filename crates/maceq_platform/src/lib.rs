//! MacEQ Platform - Host Audio Hardware Access
//!
//! This crate provides the device-level view of the host audio subsystem:
//! - Device enumeration (names, input/output capability, transport)
//! - System default device query and change
//! - Native stream format of a device
//!
//! # Platform Support
//!
//! | Platform | Backend   | Change Defaults | Transport Type |
//! |----------|-----------|-----------------|----------------|
//! | macOS    | CoreAudio | Yes             | Yes            |
//! | Other    | cpal      | No              | No             |
//! | Any      | Simulated | Yes (in memory) | Yes            |
//!
//! # Architecture
//!
//! Each backend implements the `AudioHardware` trait, giving the device
//! catalog and session a unified interface over the OS-specific details.

mod cpal_host;
mod error;
mod sim;
mod traits;

#[cfg(target_os = "macos")]
mod coreaudio;

use std::sync::Arc;

#[cfg(target_os = "macos")]
pub use coreaudio::CoreAudioHardware;
pub use cpal_host::CpalHardware;
pub use error::PlatformError;
pub use sim::{SimulatedDevice, SimulatedHardware};
pub use traits::{AudioHardware, DeviceId, Scope, TransportKind};

/// Get the hardware backend for the current OS
pub fn default_hardware() -> Arc<dyn AudioHardware> {
    #[cfg(target_os = "macos")]
    {
        Arc::new(CoreAudioHardware::new())
    }

    #[cfg(not(target_os = "macos"))]
    {
        Arc::new(CpalHardware::new())
    }
}

/// Check if the current platform backend can change the system default devices
pub fn supports_default_device_changes() -> bool {
    cfg!(target_os = "macos")
}
