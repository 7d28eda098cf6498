//! Platform Error Types

use thiserror::Error;

use crate::traits::{DeviceId, Scope};

/// Errors from host audio hardware queries
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("Platform not supported")]
    UnsupportedPlatform,

    #[error("Feature not available on this platform: {0}")]
    FeatureNotAvailable(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceId),

    #[error("No default {0} device")]
    NoDefaultDevice(Scope),

    #[error("Property query '{property}' failed: OSStatus {status}")]
    PropertyQueryFailed { property: &'static str, status: i32 },

    #[error("Property write '{property}' failed: OSStatus {status}")]
    PropertyWriteFailed { property: &'static str, status: i32 },

    #[error("Audio backend error: {0}")]
    Backend(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
