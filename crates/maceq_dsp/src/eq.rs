//! 10-Band Parametric Equalizer Unit
//!
//! A fixed-band parametric filter unit: each band has a centre frequency, a
//! gain, a bandwidth in octaves, a filter type and a bypass flag. Bands are
//! realised as a cascade of BiQuad filters (RBJ Audio EQ Cookbook), one
//! cascade per channel of the interleaved stream.

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};
use serde::{Deserialize, Serialize};

use crate::error::DspError;
use crate::mixer::MAX_CHANNELS;
use crate::params::EqParameters;

/// Number of bands in the equalizer
pub const BAND_COUNT: usize = 10;

/// Band centre frequencies (Hz)
pub const EQ_BANDS: [f32; BAND_COUNT] = [
    32.0, 64.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

/// Lowest gain a band accepts (dB)
pub const MIN_GAIN_DB: f32 = -12.0;

/// Highest gain a band accepts (dB)
pub const MAX_GAIN_DB: f32 = 12.0;

/// Bandwidth in octaves for a band centred at `frequency`.
///
/// Low bands are wide, the mids narrower, the top end narrowest.
pub fn bandwidth_for(frequency: f32) -> f32 {
    if frequency < 100.0 {
        1.0
    } else if frequency < 1000.0 {
        0.7
    } else {
        0.5
    }
}

/// Convert a bandwidth in octaves to the equivalent filter Q
///
/// Q = sqrt(2^N) / (2^N - 1)
pub fn octaves_to_q(octaves: f32) -> f32 {
    let ratio = 2.0_f32.powf(octaves);
    ratio.sqrt() / (ratio - 1.0)
}

/// Filter type for an EQ band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterType {
    Parametric,
}

/// Single EQ band configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub frequency: f32,
    pub gain_db: f32,
    /// Bandwidth in octaves
    pub bandwidth: f32,
    pub filter_type: FilterType,
    pub bypass: bool,
}

impl Band {
    /// A flat parametric band with the bandwidth its frequency calls for
    pub fn new(frequency: f32) -> Self {
        Self {
            frequency,
            gain_db: 0.0,
            bandwidth: bandwidth_for(frequency),
            filter_type: FilterType::Parametric,
            bypass: false,
        }
    }

    pub fn q(&self) -> f32 {
        octaves_to_q(self.bandwidth)
    }

    /// Generate BiQuad coefficients for this band
    fn to_coefficients(self, sample_rate: f32) -> Result<Coefficients<f32>, DspError> {
        let filter = match self.filter_type {
            FilterType::Parametric => Type::PeakingEQ(self.gain_db),
        };

        Coefficients::<f32>::from_params(filter, sample_rate.hz(), self.frequency.hz(), self.q())
            .map_err(|_| DspError::InvalidCoefficients {
                frequency: self.frequency,
                sample_rate,
            })
    }
}

/// Pass-through coefficients, used for bands above Nyquist
const IDENTITY: Coefficients<f32> = Coefficients {
    a1: 0.0,
    a2: 0.0,
    b0: 1.0,
    b1: 0.0,
    b2: 0.0,
};

fn coefficients_or_identity(band: Band, sample_rate: f32) -> Coefficients<f32> {
    band.to_coefficients(sample_rate).unwrap_or(IDENTITY)
}

/// Complete EQ configuration for all 10 bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqConfig {
    pub bands: [Band; BAND_COUNT],
    pub global_gain_db: f32,
    pub enabled: bool,
}

impl Default for EqConfig {
    fn default() -> Self {
        Self {
            bands: core::array::from_fn(|i| Band::new(EQ_BANDS[i])),
            global_gain_db: 0.0,
            enabled: true,
        }
    }
}

impl EqConfig {
    /// Set gain for a specific band (0-9), clamped to the accepted range
    pub fn set_band_gain(&mut self, band_index: usize, gain_db: f32) -> Result<(), DspError> {
        let band = self
            .bands
            .get_mut(band_index)
            .ok_or(DspError::InvalidBandIndex(band_index))?;
        band.gain_db = gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
        Ok(())
    }

    pub fn gains(&self) -> [f32; BAND_COUNT] {
        core::array::from_fn(|i| self.bands[i].gain_db)
    }
}

/// The equalizer node of the signal graph
///
/// Holds one filter cascade per channel. Designed for real-time use:
/// `process_*` and `sync` never allocate.
pub struct EqUnit {
    filters: Vec<[DirectForm2Transposed<f32>; BAND_COUNT]>,
    config: EqConfig,
    sample_rate: f32,
    global_gain_linear: f32,
    seen_generation: u64,
}

impl EqUnit {
    /// Create a flat equalizer for an interleaved stream
    pub fn new(sample_rate: f32, channels: u16) -> Result<Self, DspError> {
        Self::with_config(sample_rate, channels, EqConfig::default())
    }

    pub fn with_config(
        sample_rate: f32,
        channels: u16,
        config: EqConfig,
    ) -> Result<Self, DspError> {
        if sample_rate.is_nan() || sample_rate <= 0.0 {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }
        if channels == 0 || channels as usize > MAX_CHANNELS {
            return Err(DspError::UnsupportedChannelCount(channels));
        }

        let filters = (0..channels)
            .map(|_| {
                core::array::from_fn(|i| {
                    DirectForm2Transposed::<f32>::new(coefficients_or_identity(
                        config.bands[i],
                        sample_rate,
                    ))
                })
            })
            .collect();

        Ok(Self {
            filters,
            global_gain_linear: db_to_amplitude(config.global_gain_db),
            config,
            sample_rate,
            seen_generation: u64::MAX,
        })
    }

    /// Replace the whole configuration, recalculating every band
    pub fn update_config(&mut self, config: EqConfig) {
        for i in 0..BAND_COUNT {
            self.apply_band(i, config.bands[i]);
        }
        self.global_gain_linear = db_to_amplitude(config.global_gain_db);
        self.config = config;
    }

    /// Set gain for a single band
    pub fn set_band_gain(&mut self, band_index: usize, gain_db: f32) -> Result<(), DspError> {
        self.config.set_band_gain(band_index, gain_db)?;
        let band = self.config.bands[band_index];
        self.apply_band(band_index, band);
        Ok(())
    }

    /// Pick up parameter changes published by the control thread
    ///
    /// Cheap when nothing changed: a single atomic load.
    #[inline]
    pub fn sync(&mut self, params: &EqParameters) {
        let generation = params.generation();
        if generation == self.seen_generation {
            return;
        }
        self.seen_generation = generation;

        for i in 0..BAND_COUNT {
            let mut band = self.config.bands[i];
            band.gain_db = params.gain(i);
            if band != self.config.bands[i] {
                self.config.bands[i] = band;
                self.apply_band(i, band);
            }
        }

        self.config.enabled = params.is_enabled();

        let global_gain_db = params.global_gain();
        if global_gain_db != self.config.global_gain_db {
            self.config.global_gain_db = global_gain_db;
            self.global_gain_linear = db_to_amplitude(global_gain_db);
        }
    }

    fn apply_band(&mut self, band_index: usize, band: Band) {
        let coeffs = coefficients_or_identity(band, self.sample_rate);
        for bank in &mut self.filters {
            bank[band_index].update_coefficients(coeffs);
        }
    }

    /// Process one interleaved frame in place
    #[inline]
    pub fn process_frame(&mut self, frame: &mut [f32]) {
        if !self.config.enabled {
            return;
        }

        for (sample, bank) in frame.iter_mut().zip(self.filters.iter_mut()) {
            let mut s = *sample;
            for (filter, band) in bank.iter_mut().zip(self.config.bands.iter()) {
                if !band.bypass {
                    s = filter.run(s);
                }
            }
            *sample = s * self.global_gain_linear;
        }
    }

    /// Process an interleaved buffer in place
    ///
    /// A trailing partial frame is left untouched.
    #[inline]
    pub fn process_interleaved(&mut self, buffer: &mut [f32]) {
        let channels = self.filters.len();
        for frame in buffer.chunks_exact_mut(channels) {
            self.process_frame(frame);
        }
    }

    pub fn config(&self) -> &EqConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.filters.len()
    }

    /// Clear the filter delay lines
    pub fn reset(&mut self) {
        for bank in &mut self.filters {
            for filter in bank.iter_mut() {
                filter.reset_state();
            }
        }
    }
}

/// amplitude = 10^(dB/20)
fn db_to_amplitude(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_peak(eq: &mut EqUnit, freq: f32, sample_rate: f32) -> f32 {
        let mut peak = 0.0_f32;
        for i in 0..4800 {
            let t = i as f32 / sample_rate;
            let s = (2.0 * std::f32::consts::PI * freq * t).sin() * 0.25;
            let mut frame = [s, s];
            eq.process_frame(&mut frame);
            // skip the settling transient
            if i > 2400 {
                peak = peak.max(frame[0].abs());
            }
        }
        peak
    }

    #[test]
    fn test_default_config_is_flat() {
        let config = EqConfig::default();
        assert_eq!(config.gains(), [0.0; BAND_COUNT]);
        assert_eq!(config.global_gain_db, 0.0);
    }

    #[test]
    fn test_band_frequencies() {
        let config = EqConfig::default();
        for (band, &freq) in config.bands.iter().zip(EQ_BANDS.iter()) {
            assert_eq!(band.frequency, freq);
            assert_eq!(band.filter_type, FilterType::Parametric);
            assert!(!band.bypass);
        }
    }

    #[test]
    fn test_bandwidth_by_frequency() {
        assert_eq!(bandwidth_for(32.0), 1.0);
        assert_eq!(bandwidth_for(64.0), 1.0);
        assert_eq!(bandwidth_for(125.0), 0.7);
        assert_eq!(bandwidth_for(500.0), 0.7);
        assert_eq!(bandwidth_for(1000.0), 0.5);
        assert_eq!(bandwidth_for(16000.0), 0.5);

        let config = EqConfig::default();
        assert_eq!(config.bands[0].bandwidth, 1.0);
        assert_eq!(config.bands[4].bandwidth, 0.7);
        assert_eq!(config.bands[5].bandwidth, 0.5);
    }

    #[test]
    fn test_one_octave_q() {
        // One octave is the textbook Q of ~1.414
        assert!((octaves_to_q(1.0) - std::f32::consts::SQRT_2).abs() < 1e-4);
        assert!(octaves_to_q(0.5) > octaves_to_q(1.0));
    }

    #[test]
    fn test_gain_clamping() {
        let mut config = EqConfig::default();

        config.set_band_gain(0, 100.0).unwrap();
        assert_eq!(config.bands[0].gain_db, MAX_GAIN_DB);

        config.set_band_gain(0, -100.0).unwrap();
        assert_eq!(config.bands[0].gain_db, MIN_GAIN_DB);
    }

    #[test]
    fn test_invalid_band_index() {
        let mut config = EqConfig::default();
        assert_eq!(
            config.set_band_gain(10, 0.0),
            Err(DspError::InvalidBandIndex(10))
        );
    }

    #[test]
    fn test_rejects_bad_stream_shape() {
        assert!(matches!(
            EqUnit::new(0.0, 2),
            Err(DspError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            EqUnit::new(48000.0, 0),
            Err(DspError::UnsupportedChannelCount(0))
        ));
    }

    #[test]
    fn test_flat_is_transparent() {
        let mut eq = EqUnit::new(48000.0, 2).unwrap();
        let peak = sine_peak(&mut eq, 1000.0, 48000.0);
        assert!((peak - 0.25).abs() < 0.01, "flat EQ changed level: {}", peak);
    }

    #[test]
    fn test_boost_increases_amplitude() {
        let mut eq = EqUnit::new(48000.0, 2).unwrap();
        eq.set_band_gain(5, 12.0).unwrap();

        let peak = sine_peak(&mut eq, 1000.0, 48000.0);
        assert!(peak > 0.25 * 3.0, "+12dB at 1kHz should be ~4x: {}", peak);
    }

    #[test]
    fn test_cut_decreases_amplitude() {
        let mut eq = EqUnit::new(48000.0, 2).unwrap();
        eq.set_band_gain(5, -12.0).unwrap();

        let peak = sine_peak(&mut eq, 1000.0, 48000.0);
        assert!(peak < 0.25 / 2.0, "-12dB at 1kHz should be ~1/4: {}", peak);
    }

    #[test]
    fn test_bypassed_band_is_skipped() {
        let mut eq = EqUnit::new(48000.0, 2).unwrap();
        let mut config = eq.config().clone();
        config.bands[5].gain_db = 12.0;
        config.bands[5].bypass = true;
        eq.update_config(config);

        let peak = sine_peak(&mut eq, 1000.0, 48000.0);
        assert!((peak - 0.25).abs() < 0.01);
    }

    #[test]
    fn test_disabled_passthrough() {
        let mut eq = EqUnit::new(48000.0, 2).unwrap();
        eq.set_band_gain(5, 12.0).unwrap();

        let mut config = eq.config().clone();
        config.enabled = false;
        eq.update_config(config);

        let mut frame = [0.5, -0.5];
        eq.process_frame(&mut frame);
        assert_eq!(frame, [0.5, -0.5]);
    }

    #[test]
    fn test_bypass_follows_parameters() {
        let params = EqParameters::new();
        params.set_band_gain(5, 12.0).unwrap();
        params.set_enabled(false);

        let mut eq = EqUnit::new(48000.0, 2).unwrap();
        eq.sync(&params);
        let mut frame = [0.5, -0.5];
        eq.process_frame(&mut frame);
        assert_eq!(frame, [0.5, -0.5]);

        params.set_enabled(true);
        eq.sync(&params);
        assert!(eq.config().enabled);
        let peak = sine_peak(&mut eq, 1000.0, 48000.0);
        assert!(peak > 0.25 * 3.0, "re-enabled boost missing: {}", peak);
    }

    #[test]
    fn test_band_above_nyquist_passes_through() {
        // 16kHz is above Nyquist at 22.05kHz; the unit must still build
        let mut eq = EqUnit::new(22050.0, 1).unwrap();
        eq.set_band_gain(9, 12.0).unwrap();

        let mut buffer = vec![0.1_f32; 64];
        eq.process_interleaved(&mut buffer);
        assert!(buffer.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_sync_picks_up_parameter_changes() {
        let params = EqParameters::new();
        let mut eq = EqUnit::new(48000.0, 2).unwrap();

        params.set_band_gain(3, 6.0).unwrap();
        params.set_enabled(false);
        eq.sync(&params);

        assert_eq!(eq.config().bands[3].gain_db, 6.0);
        assert!(!eq.config().enabled);

        // No new generation: config untouched even if edited locally
        eq.set_band_gain(3, 0.0).unwrap();
        eq.sync(&params);
        assert_eq!(eq.config().bands[3].gain_db, 0.0);
    }

    #[test]
    fn test_mono_and_multichannel_streams() {
        let mut mono = EqUnit::new(44100.0, 1).unwrap();
        assert_eq!(mono.channels(), 1);
        let mut buffer = vec![0.5, 0.3, 0.1];
        mono.process_interleaved(&mut buffer);
        assert!(buffer.iter().all(|s| s.is_finite()));

        let mut surround = EqUnit::new(48000.0, 6).unwrap();
        let mut buffer = vec![0.2; 6 * 16];
        surround.process_interleaved(&mut buffer);
        assert!(buffer.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_reset_doesnt_panic() {
        let mut eq = EqUnit::new(48000.0, 2).unwrap();
        for _ in 0..100 {
            let mut frame = [0.5, -0.5];
            eq.process_frame(&mut frame);
        }

        eq.reset();

        let mut frame = [0.5, -0.5];
        eq.process_frame(&mut frame);
        assert!(frame.iter().all(|s| s.is_finite()));
    }
}
