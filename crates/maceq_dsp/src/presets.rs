//! Built-in EQ Presets
//!
//! Fixed gain vectors only; there are no user-defined presets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::eq::BAND_COUNT;
use crate::error::DspError;

/// Named gain vector, one value per band
pub type PresetGains = (&'static str, [f32; BAND_COUNT]);

/// Built-in presets, in display order
pub const PRESETS: &[PresetGains] = &[
    ("Flat", [0.0; BAND_COUNT]),
    ("Bass Boost", [8.0, 6.0, 4.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
    ("Treble Boost", [0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 4.0, 6.0, 8.0, 8.0]),
    ("Vocal", [-2.0, -1.0, 0.0, 2.0, 4.0, 4.0, 2.0, 0.0, -1.0, -2.0]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Preset {
    Flat,
    BassBoost,
    TrebleBoost,
    Vocal,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Flat,
        Preset::BassBoost,
        Preset::TrebleBoost,
        Preset::Vocal,
    ];

    fn entry(self) -> &'static PresetGains {
        &PRESETS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.entry().0
    }

    pub fn gains(self) -> [f32; BAND_COUNT] {
        self.entry().1
    }

    /// Look a preset up by display name, ignoring ASCII case
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = DspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| DspError::UnknownPreset(s.to_string()))
    }
}

/// Gain vector of the preset called `name`
pub fn preset_gains(name: &str) -> Option<[f32; BAND_COUNT]> {
    Preset::from_name(name).map(Preset::gains)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_matches_table() {
        assert_eq!(Preset::ALL.len(), PRESETS.len());
        for (preset, (name, gains)) in Preset::ALL.iter().zip(PRESETS.iter()) {
            assert_eq!(preset.name(), *name);
            assert_eq!(preset.gains(), *gains);
        }
    }

    #[test]
    fn test_documented_vectors() {
        assert_eq!(
            preset_gains("Bass Boost"),
            Some([8.0, 6.0, 4.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
        );
        assert_eq!(
            preset_gains("Treble Boost"),
            Some([0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 4.0, 6.0, 8.0, 8.0])
        );
        assert_eq!(
            preset_gains("Vocal"),
            Some([-2.0, -1.0, 0.0, 2.0, 4.0, 4.0, 2.0, 0.0, -1.0, -2.0])
        );
        assert_eq!(preset_gains("Flat"), Some([0.0; BAND_COUNT]));
    }

    #[test]
    fn test_lookup_ignores_case() {
        assert_eq!(Preset::from_name("bass boost"), Some(Preset::BassBoost));
        assert_eq!(" VOCAL ".parse::<Preset>(), Ok(Preset::Vocal));
        assert!(matches!(
            "Loudness".parse::<Preset>(),
            Err(DspError::UnknownPreset(_))
        ));
        assert_eq!(preset_gains("Loudness"), None);
    }

    #[test]
    fn test_all_gains_within_range() {
        for (_, gains) in PRESETS {
            for gain in gains {
                assert!((crate::MIN_GAIN_DB..=crate::MAX_GAIN_DB).contains(gain));
            }
        }
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&Preset::TrebleBoost).unwrap();
        let back: Preset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Preset::TrebleBoost);
        assert_eq!(Preset::TrebleBoost.to_string(), "Treble Boost");
    }
}
