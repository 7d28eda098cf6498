//! Equalizer Session
//!
//! Owns the signal graph and the ten band gains. Lives on the main thread;
//! gain writes reach the audio callback through the lock-free parameter
//! block, so they are audible immediately while running.

use maceq_dsp::{AudioFormat, Preset, BAND_COUNT, MAX_GAIN_DB, MIN_GAIN_DB};
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::graph::SignalGraph;
use crate::stream::CpalGraph;

pub struct EqualizerSession {
    graph: Box<dyn SignalGraph>,
    gains: [f32; BAND_COUNT],
    bypassed: bool,
    error_message: Option<String>,
}

impl EqualizerSession {
    /// Wrap a built graph; all bands start flat and the session is stopped
    pub fn new(graph: Box<dyn SignalGraph>) -> Self {
        let gains = [0.0; BAND_COUNT];
        graph.shared().params.set_all_gains(&gains);
        graph.shared().params.set_enabled(true);

        debug!(
            "Equalizer session created ({} -> {})",
            graph.input_format(),
            graph.output_format()
        );

        Self {
            graph,
            gains,
            bypassed: false,
            error_message: None,
        }
    }

    /// Session on the system default devices
    pub fn with_cpal(graph: CpalGraph) -> Self {
        Self::new(Box::new(graph))
    }

    /// Start audio flow
    ///
    /// A no-op while running. On failure the session stays stopped and
    /// `error_message` describes the cause until the next successful start.
    pub fn start(&mut self) -> EngineResult<()> {
        if self.graph.is_running() {
            return Ok(());
        }

        match self.graph.start() {
            Ok(()) => {
                self.error_message = None;
                info!("Equalizer started");
                Ok(())
            }
            Err(e) => {
                let err = EngineError::StartFailed(e.to_string());
                error!("{}", err);
                self.error_message = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Stop audio flow; a no-op while stopped
    pub fn stop(&mut self) {
        if !self.graph.is_running() {
            return;
        }
        self.graph.stop();
        info!("Equalizer stopped");
    }

    pub fn is_running(&self) -> bool {
        self.graph.is_running()
    }

    /// Set one band's gain in dB, clamped to ±12
    ///
    /// An index outside 0..10 is ignored.
    pub fn set_band_gain(&mut self, index: usize, gain_db: f32) {
        let Some(slot) = self.gains.get_mut(index) else {
            warn!("Ignoring gain for band {} (only {} bands)", index, BAND_COUNT);
            return;
        };

        let gain_db = gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
        *slot = gain_db;
        if let Err(e) = self.graph.shared().params.set_band_gain(index, gain_db) {
            warn!("Failed to update band {}: {}", index, e);
        }
    }

    pub fn band_gain(&self, index: usize) -> Option<f32> {
        self.gains.get(index).copied()
    }

    pub fn gains(&self) -> [f32; BAND_COUNT] {
        self.gains
    }

    /// Set every band to 0 dB
    pub fn reset_all(&mut self) {
        for index in 0..BAND_COUNT {
            self.set_band_gain(index, 0.0);
        }
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        for (index, gain) in preset.gains().into_iter().enumerate() {
            self.set_band_gain(index, gain);
        }
        debug!("Applied preset '{}'", preset);
    }

    /// Apply a preset by display name
    pub fn apply_preset_named(&mut self, name: &str) -> EngineResult<()> {
        let preset: Preset = name.parse()?;
        self.apply_preset(preset);
        Ok(())
    }

    /// Route audio around the EQ unit, or back through it
    ///
    /// Band gains are kept and apply again when bypass is lifted.
    pub fn set_bypassed(&mut self, bypassed: bool) {
        if bypassed == self.bypassed {
            return;
        }
        self.bypassed = bypassed;
        self.graph.shared().params.set_enabled(!bypassed);
        info!("Equalizer {}", if bypassed { "bypassed" } else { "engaged" });
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    /// Message from the last failed start, cleared by a successful one
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Record an error reported while running
    pub(crate) fn set_error_message(&mut self, message: String) {
        self.error_message = Some(message);
    }

    /// Output peak levels (left, right)
    pub fn output_peaks(&self) -> (f32, f32) {
        self.graph.shared().peaks()
    }

    /// Captured peak levels before the EQ (left, right)
    pub fn input_peaks(&self) -> (f32, f32) {
        self.graph.shared().input_peaks()
    }

    /// Output buffers that could not be filled from captured audio
    pub fn underruns(&self) -> u64 {
        self.graph.shared().underruns()
    }

    pub fn input_format(&self) -> AudioFormat {
        self.graph.input_format()
    }

    pub fn output_format(&self) -> AudioFormat {
        self.graph.output_format()
    }
}

impl Drop for EqualizerSession {
    fn drop(&mut self) {
        self.stop();
    }
}
