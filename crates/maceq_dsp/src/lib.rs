//! MacEQ DSP - Equalizer and Mixer Nodes
//!
//! This crate provides the processing nodes of the MacEQ signal graph:
//! - 10-band parametric equalizer unit built from BiQuad filters
//! - Lock-free parameter block for live band updates from the control thread
//! - Mixer node converting between the input and output stream formats
//! - Built-in presets and band display labels
//!
//! # Architecture
//!
//! The audio callback never allocates. Parameter writes land in atomics and
//! the EQ unit recomputes coefficients between buffers when the parameter
//! generation changes.

mod eq;
mod error;
mod labels;
mod mixer;
mod params;
mod presets;

pub use eq::{
    bandwidth_for, octaves_to_q, Band, EqConfig, EqUnit, FilterType, BAND_COUNT, EQ_BANDS,
    MAX_GAIN_DB, MIN_GAIN_DB,
};
pub use error::DspError;
pub use labels::{band_label, format_gain};
pub use mixer::{map_channels, AudioFormat, Mixer, MAX_CHANNELS};
pub use params::EqParameters;
pub use presets::{preset_gains, Preset, PresetGains, PRESETS};
