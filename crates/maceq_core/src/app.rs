//! Application Model
//!
//! UI-facing state: the device list, the selected input and output, and the
//! equalizer session. Owned by the main thread. Background work (device
//! enumeration, stream errors) arrives through the `MainQueue` and is applied
//! in `pump`; every state change is published to subscribers as an `Event`.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use maceq_dsp::{AudioFormat, Preset, BAND_COUNT};
use maceq_platform::DeviceId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::device::{AudioDevice, DeviceCatalog, LoopbackSetup};
use crate::error::{EngineError, EngineResult};
use crate::message::{Event, MainQueue, Update};
use crate::session::EqualizerSession;

/// Point-in-time copy of the published state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSnapshot {
    pub is_running: bool,
    pub bypassed: bool,
    pub gains: [f32; BAND_COUNT],
    pub error_message: Option<String>,
    pub devices: Vec<AudioDevice>,
    pub selected_input: Option<AudioDevice>,
    pub selected_output: Option<AudioDevice>,
    pub input_format: AudioFormat,
    pub output_format: AudioFormat,
    pub input_peaks: (f32, f32),
    pub output_peaks: (f32, f32),
}

pub struct AppModel {
    catalog: DeviceCatalog,
    session: EqualizerSession,
    queue: MainQueue,
    devices: Vec<AudioDevice>,
    selected_input: Option<AudioDevice>,
    selected_output: Option<AudioDevice>,
    subscribers: Vec<Sender<Event>>,
}

impl AppModel {
    pub fn new(catalog: DeviceCatalog, session: EqualizerSession, queue: MainQueue) -> Self {
        Self {
            catalog,
            session,
            queue,
            devices: Vec::new(),
            selected_input: None,
            selected_output: None,
            subscribers: Vec::new(),
        }
    }

    /// Receive every event published from now on
    pub fn subscribe(&mut self) -> Receiver<Event> {
        let (sender, receiver) = unbounded();
        self.subscribers.push(sender);
        receiver
    }

    fn publish(&mut self, event: Event) {
        self.subscribers.retain(|s| s.send(event.clone()).is_ok());
    }

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            is_running: self.session.is_running(),
            bypassed: self.session.is_bypassed(),
            gains: self.session.gains(),
            error_message: self.session.error_message().map(str::to_string),
            devices: self.devices.clone(),
            selected_input: self.selected_input.clone(),
            selected_output: self.selected_output.clone(),
            input_format: self.session.input_format(),
            output_format: self.session.output_format(),
            input_peaks: self.session.input_peaks(),
            output_peaks: self.session.output_peaks(),
        }
    }

    /// Producer handle for work that must land on the main thread
    pub fn queue_sender(&self) -> Sender<Update> {
        self.queue.sender()
    }

    /// Enumerate devices on a background thread
    ///
    /// The result is applied by a later `pump`.
    pub fn refresh_devices(&self) -> EngineResult<JoinHandle<()>> {
        let catalog = self.catalog.clone();
        let sender = self.queue.sender();

        thread::Builder::new()
            .name("maceq-devices".into())
            .spawn(move || {
                let devices = catalog.enumerate();
                if sender.send(Update::DevicesRefreshed(devices)).is_err() {
                    debug!("Main queue closed before device refresh finished");
                }
            })
            .map_err(|e| {
                EngineError::ConfigError(format!("failed to spawn refresh thread: {}", e))
            })
    }

    /// Apply all queued updates; returns how many were applied
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(update) = self.queue.try_next() {
            self.apply(update);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, update: Update) {
        match update {
            Update::DevicesRefreshed(devices) => {
                info!("Device list refreshed ({} devices)", devices.len());
                self.selected_output = devices
                    .iter()
                    .find(|d| d.is_default)
                    .or_else(|| devices.first())
                    .cloned();
                self.selected_input = devices.iter().find(|d| d.has_input).cloned();
                self.devices = devices;

                self.publish(Event::DevicesChanged {
                    devices: self.devices.clone(),
                });
                self.publish_selection();
            }
            Update::StreamError { message, fatal } => {
                warn!("Audio stream error: {}", message);
                self.session.set_error_message(message.clone());
                self.publish(Event::Error { message });
                if fatal {
                    self.stop();
                }
            }
        }
    }

    fn publish_selection(&mut self) {
        let event = Event::SelectionChanged {
            input: self.selected_input.as_ref().map(|d| d.id),
            output: self.selected_output.as_ref().map(|d| d.id),
        };
        self.publish(event);
    }

    fn find_device(&self, id: DeviceId) -> EngineResult<AudioDevice> {
        self.devices
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| EngineError::DeviceNotFound(format!("device {}", id)))
    }

    /// Select the input device and make it the system default input
    pub fn select_input(&mut self, id: DeviceId) -> EngineResult<()> {
        let device = self.find_device(id)?;
        let result = self.catalog.set_default(Some(&device), None);
        self.selected_input = Some(device);
        self.publish_selection();
        result
    }

    /// Select the output device and make it the system default output
    pub fn select_output(&mut self, id: DeviceId) -> EngineResult<()> {
        let device = self.find_device(id)?;
        let result = self.catalog.set_default(None, Some(&device));
        self.selected_output = Some(device);
        self.publish_selection();
        result
    }

    pub fn input_choices(&self) -> Vec<&AudioDevice> {
        self.devices.iter().filter(|d| d.has_input).collect()
    }

    pub fn output_choices(&self) -> Vec<&AudioDevice> {
        self.devices.iter().filter(|d| d.has_output).collect()
    }

    pub fn devices(&self) -> &[AudioDevice] {
        &self.devices
    }

    pub fn selected_input(&self) -> Option<&AudioDevice> {
        self.selected_input.as_ref()
    }

    pub fn selected_output(&self) -> Option<&AudioDevice> {
        self.selected_output.as_ref()
    }

    pub fn loopback_setup(&self) -> LoopbackSetup {
        LoopbackSetup::from_devices(&self.devices)
    }

    pub fn session(&self) -> &EqualizerSession {
        &self.session
    }

    pub fn start(&mut self) -> EngineResult<()> {
        if self.session.is_running() {
            return Ok(());
        }
        match self.session.start() {
            Ok(()) => {
                self.publish(Event::Started);
                Ok(())
            }
            Err(e) => {
                self.publish(Event::error(&e));
                Err(e)
            }
        }
    }

    pub fn stop(&mut self) {
        if !self.session.is_running() {
            return;
        }
        self.session.stop();
        self.publish(Event::Stopped);
    }

    pub fn set_bypassed(&mut self, bypassed: bool) {
        if self.session.is_bypassed() == bypassed {
            return;
        }
        self.session.set_bypassed(bypassed);
        self.publish(Event::BypassChanged { bypassed });
    }

    pub fn set_band_gain(&mut self, index: usize, gain_db: f32) {
        let before = self.session.gains();
        self.session.set_band_gain(index, gain_db);
        self.publish_gains_if_changed(before);
    }

    pub fn reset_all(&mut self) {
        let before = self.session.gains();
        self.session.reset_all();
        self.publish_gains_if_changed(before);
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        let before = self.session.gains();
        self.session.apply_preset(preset);
        self.publish_gains_if_changed(before);
    }

    fn publish_gains_if_changed(&mut self, before: [f32; BAND_COUNT]) {
        let gains = self.session.gains();
        if gains != before {
            self.publish(Event::GainsChanged { gains });
        }
    }
}
