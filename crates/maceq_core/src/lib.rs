//! MacEQ Core - Audio Engine
//!
//! This crate provides the engine behind the MacEQ system-wide equalizer:
//! - Device catalog (enumeration, capabilities, system default changes)
//! - Equalizer session (start/stop, live band gains, presets)
//! - Signal graph on cpal streams with an offline simulated twin
//! - Application model with a main-thread update queue and event publishing
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Main Thread                          │
//! │  AppModel ◀──MainQueue── device refresh / stream errors     │
//! │     │  └──events──▶ subscribers                             │
//! └─────────────────────────────────────────────────────────────┘
//!       │ EqParameters (atomics)
//!       ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Audio Callbacks                        │
//! │   Capture ──rtrb──▶ EQ ──▶ Mixer ──▶ Output                │
//! │              (Zero allocation in this path)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod app;
mod config;
mod device;
mod error;
mod graph;
mod message;
mod session;
mod stream;

pub use app::{AppModel, AppSnapshot};
pub use config::EngineConfig;
pub use device::{looks_virtual, AudioDevice, DeviceCatalog, LoopbackSetup};
pub use error::{EngineError, EngineResult};
pub use graph::{SignalGraph, SimulatedGraph};
pub use message::{Event, MainQueue, Update};
pub use session::EqualizerSession;
pub use stream::{CpalGraph, GraphProcessor, SharedState};

// Re-export DSP and platform types for convenience
pub use maceq_dsp::{band_label, format_gain, AudioFormat, Preset, BAND_COUNT, EQ_BANDS};
pub use maceq_platform::{DeviceId, Scope};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        // Verify public API is accessible
        let _config = EngineConfig::default();
        let _queue = MainQueue::new();
        assert_eq!(EQ_BANDS.len(), BAND_COUNT);
    }
}
