//! Message Types for Thread Communication
//!
//! Updates flow from worker/audio threads -> main queue -> AppModel
//! Events flow from AppModel -> subscribers (UI)

use crossbeam_channel::{unbounded, Receiver, Sender};
use maceq_dsp::BAND_COUNT;
use maceq_platform::DeviceId;
use serde::{Deserialize, Serialize};

use crate::device::AudioDevice;

/// Work handed to the main thread for application to UI-facing state
#[derive(Debug, Clone)]
pub enum Update {
    /// Device enumeration finished
    DevicesRefreshed(Vec<AudioDevice>),

    /// An audio stream reported an error; `fatal` when its device is gone
    StreamError { message: String, fatal: bool },
}

/// Events published to subscribers after state changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// Audio started flowing
    Started,

    /// Audio stopped
    Stopped,

    /// Error occurred
    Error { message: String },

    /// EQ processing switched off (`true`) or back on
    BypassChanged { bypassed: bool },

    /// Band gains changed
    GainsChanged { gains: [f32; BAND_COUNT] },

    /// Device list replaced
    DevicesChanged { devices: Vec<AudioDevice> },

    /// Selected input or output changed
    SelectionChanged {
        input: Option<DeviceId>,
        output: Option<DeviceId>,
    },
}

impl Event {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::Error {
            message: err.to_string(),
        }
    }
}

/// Multi-producer queue drained only by the main thread
pub struct MainQueue {
    sender: Sender<Update>,
    receiver: Receiver<Update>,
}

impl MainQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Producer handle for any thread
    pub fn sender(&self) -> Sender<Update> {
        self.sender.clone()
    }

    /// Next queued update without blocking
    pub fn try_next(&self) -> Option<Update> {
        self.receiver.try_recv().ok()
    }
}

impl Default for MainQueue {
    fn default() -> Self {
        Self::new()
    }
}
