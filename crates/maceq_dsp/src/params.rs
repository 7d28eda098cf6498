//! Lock-free EQ Parameter Block
//!
//! Shared between the control thread (writer) and the audio callback
//! (reader). f32 values are stored bit-cast in `AtomicU32` since there is no
//! `AtomicF32`. Every write bumps a generation counter so the reader can skip
//! coefficient work when nothing moved.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::eq::{BAND_COUNT, MAX_GAIN_DB, MIN_GAIN_DB};
use crate::error::DspError;

pub struct EqParameters {
    gains: [AtomicU32; BAND_COUNT],
    enabled: AtomicBool,
    global_gain: AtomicU32,
    generation: AtomicU64,
}

impl EqParameters {
    pub fn new() -> Self {
        Self {
            gains: core::array::from_fn(|_| AtomicU32::new(0.0_f32.to_bits())),
            enabled: AtomicBool::new(true),
            global_gain: AtomicU32::new(0.0_f32.to_bits()),
            generation: AtomicU64::new(0),
        }
    }

    /// Set a band gain, clamped to the accepted range
    pub fn set_band_gain(&self, band: usize, gain_db: f32) -> Result<(), DspError> {
        let slot = self.gains.get(band).ok_or(DspError::InvalidBandIndex(band))?;
        slot.store(gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB).to_bits(), Ordering::Relaxed);
        self.bump();
        Ok(())
    }

    /// Set every band gain with a single generation bump
    pub fn set_all_gains(&self, gains: &[f32; BAND_COUNT]) {
        for (slot, &gain) in self.gains.iter().zip(gains.iter()) {
            slot.store(gain.clamp(MIN_GAIN_DB, MAX_GAIN_DB).to_bits(), Ordering::Relaxed);
        }
        self.bump();
    }

    /// Switch the whole unit between processing and pass-through
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        self.bump();
    }

    pub fn set_global_gain(&self, gain_db: f32) {
        self.global_gain.store(gain_db.to_bits(), Ordering::Relaxed);
        self.bump();
    }

    /// Gain of `band` in dB
    ///
    /// # Panics
    /// Panics if `band >= BAND_COUNT`.
    #[inline]
    pub fn gain(&self, band: usize) -> f32 {
        f32::from_bits(self.gains[band].load(Ordering::Relaxed))
    }

    pub fn gains(&self) -> [f32; BAND_COUNT] {
        core::array::from_fn(|i| self.gain(i))
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn global_gain(&self) -> f32 {
        f32::from_bits(self.global_gain.load(Ordering::Relaxed))
    }

    /// Monotonic change counter; pairs with the Release in `bump`
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::Release);
    }
}

impl Default for EqParameters {
    fn default() -> Self {
        Self::new()
    }
}
