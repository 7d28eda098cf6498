//! Audio Hardware Trait
//!
//! Defines the interface every host audio backend must provide. The device
//! catalog and the session only ever talk to the hardware through this trait.

use std::fmt;

use maceq_dsp::AudioFormat;
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

/// Opaque platform device handle
pub type DeviceId = u32;

/// Direction of a device stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Input,
    Output,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Input => f.write_str("input"),
            Scope::Output => f.write_str("output"),
        }
    }
}

/// How a device is attached to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportKind {
    BuiltIn,
    Usb,
    Bluetooth,
    /// Software device such as a loopback driver
    Virtual,
    /// Aggregate of several physical devices
    Aggregate,
    Unknown,
}

impl TransportKind {
    /// Virtual and aggregate devices can carry system audio back into an app
    pub fn is_virtual(self) -> bool {
        matches!(self, TransportKind::Virtual | TransportKind::Aggregate)
    }
}

/// Host audio subsystem
///
/// Each backend (CoreAudio, cpal, simulated) implements this trait. Queries
/// are independent so a failure on one property never hides the others.
pub trait AudioHardware: Send + Sync {
    /// Backend name (e.g. "CoreAudio", "cpal", "Simulated")
    fn name(&self) -> &'static str;

    /// All device handles, in platform order
    fn device_ids(&self) -> Result<Vec<DeviceId>, PlatformError>;

    /// Human-readable device name
    fn device_name(&self, id: DeviceId) -> Result<String, PlatformError>;

    /// Whether the device exposes a stream configuration on `scope`
    fn has_streams(&self, id: DeviceId, scope: Scope) -> Result<bool, PlatformError>;

    /// Current system default device for `scope`
    fn default_device(&self, scope: Scope) -> Result<DeviceId, PlatformError>;

    /// Change the system default device for `scope`
    fn set_default_device(&self, scope: Scope, id: DeviceId) -> Result<(), PlatformError>;

    /// Native stream format of the device on `scope`
    fn native_format(&self, id: DeviceId, scope: Scope) -> Result<AudioFormat, PlatformError>;

    /// Transport type of the device
    fn transport(&self, id: DeviceId) -> Result<TransportKind, PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_transports() {
        assert!(TransportKind::Virtual.is_virtual());
        assert!(TransportKind::Aggregate.is_virtual());
        assert!(!TransportKind::BuiltIn.is_virtual());
        assert!(!TransportKind::Unknown.is_virtual());
    }

    #[test]
    fn test_scope_serialization() {
        let json = serde_json::to_string(&Scope::Input).unwrap();
        let back: Scope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Scope::Input);
        assert_eq!(Scope::Output.to_string(), "output");
    }
}
