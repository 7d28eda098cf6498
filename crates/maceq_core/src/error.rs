//! Engine Error Types

use thiserror::Error;

/// Errors that can occur in the audio engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to start audio engine: {0}")]
    StartFailed(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    #[error("Failed to play audio stream: {0}")]
    StreamPlayError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("DSP error: {0}")]
    DspError(#[from] maceq_dsp::DspError),

    #[error("Platform error: {0}")]
    PlatformError(#[from] maceq_platform::PlatformError),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
