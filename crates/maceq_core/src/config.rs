//! Engine Configuration

use std::str::FromStr;

use maceq_dsp::{AudioFormat, MAX_GAIN_DB, MIN_GAIN_DB};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Overall engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hardware buffer size in frames; `None` keeps the device default
    pub buffer_frames: Option<u32>,

    /// Capacity of the capture-to-output ring buffer in milliseconds
    pub ring_buffer_ms: u32,

    /// Gain applied after the ten bands, in dB
    pub global_gain_db: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_frames: None,
            ring_buffer_ms: 100,
            global_gain_db: 0.0,
        }
    }
}

impl EngineConfig {
    /// Create config optimized for low latency
    pub fn low_latency() -> Self {
        Self {
            buffer_frames: Some(128), // ~2.7ms at 48kHz
            ring_buffer_ms: 20,
            global_gain_db: 0.0,
        }
    }

    /// Create config optimized for stability
    pub fn stable() -> Self {
        Self {
            buffer_frames: Some(1024), // ~21ms at 48kHz
            ring_buffer_ms: 200,
            global_gain_db: 0.0,
        }
    }

    /// Named starting point: `default`, `low-latency` or `stable`
    pub fn profile(name: &str) -> EngineResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::default()),
            "low-latency" | "low_latency" => Ok(Self::low_latency()),
            "stable" => Ok(Self::stable()),
            other => Err(EngineError::ConfigError(format!(
                "Unknown engine profile: {:?}",
                other
            ))),
        }
    }

    /// Read the environment
    ///
    /// `MACEQ_PROFILE` picks the starting profile; `MACEQ_BUFFER_FRAMES`,
    /// `MACEQ_RING_MS` and `MACEQ_GLOBAL_GAIN` override single fields.
    pub fn from_env() -> EngineResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> EngineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("MACEQ_PROFILE") {
            Some(name) => Self::profile(&name)?,
            None => Self::default(),
        };

        if let Some(frames) = parse_var::<u32>(&lookup, "MACEQ_BUFFER_FRAMES")? {
            config.buffer_frames = Some(frames);
        }
        if let Some(ms) = parse_var::<u32>(&lookup, "MACEQ_RING_MS")? {
            config.ring_buffer_ms = ms;
        }
        if let Some(gain_db) = parse_var::<f32>(&lookup, "MACEQ_GLOBAL_GAIN")? {
            config.global_gain_db = gain_db;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> EngineResult<()> {
        if let Some(frames) = self.buffer_frames {
            if !(32..=8192).contains(&frames) {
                return Err(EngineError::ConfigError(format!(
                    "Invalid buffer size: {}",
                    frames
                )));
            }
        }
        if !(10..=2000).contains(&self.ring_buffer_ms) {
            return Err(EngineError::ConfigError(format!(
                "Invalid ring buffer length: {} ms",
                self.ring_buffer_ms
            )));
        }
        if !(MIN_GAIN_DB..=MAX_GAIN_DB).contains(&self.global_gain_db) {
            return Err(EngineError::ConfigError(format!(
                "Invalid global gain: {} dB",
                self.global_gain_db
            )));
        }
        Ok(())
    }

    /// Buffer latency in milliseconds at `sample_rate`, if the size is fixed
    pub fn latency_ms(&self, sample_rate: u32) -> Option<f32> {
        self.buffer_frames
            .map(|frames| frames as f32 / sample_rate.max(1) as f32 * 1000.0)
    }

    /// Ring buffer capacity in samples for a stream in `format`
    pub fn ring_buffer_samples(&self, format: AudioFormat) -> usize {
        let frames = format.sample_rate as usize * self.ring_buffer_ms as usize / 1000;
        frames.max(64) * format.channels.max(1) as usize
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> EngineResult<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            EngineError::ConfigError(format!("{} is not a valid number: {:?}", key, raw))
        }),
    }
}
