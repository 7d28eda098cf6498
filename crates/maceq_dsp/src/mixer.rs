//! Mixer Node - Format Conversion Between Graph Legs
//!
//! The capture and EQ nodes run in the input device's native format; the
//! output node runs in the output device's. The mixer bridges the two:
//! channel up/down-mixing plus linear-interpolation sample rate conversion.
//!
//! ```text
//! capture ──(input fmt)──▶ EQ ──(input fmt)──▶ Mixer ──(output fmt)──▶ output
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Largest channel count the graph handles
pub const MAX_CHANNELS: usize = 8;

/// Native stream format of one side of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
        }
    }
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz / {} ch", self.sample_rate, self.channels)
    }
}

/// Copy one frame between channel layouts
///
/// Mono sources are duplicated, mono destinations get the average, other
/// layouts copy the shared channels and silence the rest.
#[inline]
pub fn map_channels(src: &[f32], dst: &mut [f32]) {
    if src.is_empty() {
        dst.fill(0.0);
        return;
    }

    if src.len() == dst.len() {
        dst.copy_from_slice(src);
    } else if src.len() == 1 {
        dst.fill(src[0]);
    } else if dst.len() == 1 {
        dst[0] = src.iter().sum::<f32>() / src.len() as f32;
    } else {
        for (i, out) in dst.iter_mut().enumerate() {
            *out = src.get(i).copied().unwrap_or(0.0);
        }
    }
}

/// Streaming format converter
///
/// Pulls input frames on demand and renders output frames. Holds two input
/// frames and a fractional read position between them.
pub struct Mixer {
    input: AudioFormat,
    output: AudioFormat,
    /// Input frames consumed per output frame
    step: f64,
    position: f64,
    prev: [f32; MAX_CHANNELS],
    next: [f32; MAX_CHANNELS],
    primed: bool,
}

impl Mixer {
    pub fn new(input: AudioFormat, output: AudioFormat) -> Self {
        let clamp = |format: AudioFormat| AudioFormat {
            sample_rate: format.sample_rate.max(1),
            channels: format.channels.clamp(1, MAX_CHANNELS as u16),
        };
        let input = clamp(input);
        let output = clamp(output);

        Self {
            step: input.sample_rate as f64 / output.sample_rate as f64,
            input,
            output,
            position: 0.0,
            prev: [0.0; MAX_CHANNELS],
            next: [0.0; MAX_CHANNELS],
            primed: false,
        }
    }

    pub fn input_format(&self) -> AudioFormat {
        self.input
    }

    pub fn output_format(&self) -> AudioFormat {
        self.output
    }

    /// Whether the two legs differ in rate or channel layout
    pub fn is_converting(&self) -> bool {
        self.input != self.output
    }

    /// Render interleaved output frames
    ///
    /// `pull` fills one input frame (input channel count) and returns false
    /// when no input is available. Frames that could not be rendered are
    /// silenced. Returns the number of frames rendered from real input.
    pub fn render<F>(&mut self, output: &mut [f32], mut pull: F) -> usize
    where
        F: FnMut(&mut [f32]) -> bool,
    {
        let in_ch = self.input.channels as usize;
        let out_ch = self.output.channels as usize;
        let frames = output.len() / out_ch;

        if !self.primed {
            if !(pull(&mut self.prev[..in_ch]) && pull(&mut self.next[..in_ch])) {
                output.fill(0.0);
                return 0;
            }
            self.position = 0.0;
            self.primed = true;
        }

        let mut interpolated = [0.0_f32; MAX_CHANNELS];

        for frame_index in 0..frames {
            let t = self.position as f32;
            for ch in 0..in_ch {
                interpolated[ch] = self.prev[ch] + (self.next[ch] - self.prev[ch]) * t;
            }

            let out = &mut output[frame_index * out_ch..(frame_index + 1) * out_ch];
            map_channels(&interpolated[..in_ch], out);

            self.position += self.step;
            while self.position >= 1.0 {
                self.position -= 1.0;
                self.prev = self.next;
                if !pull(&mut self.next[..in_ch]) {
                    self.primed = false;
                    output[(frame_index + 1) * out_ch..].fill(0.0);
                    return frame_index + 1;
                }
            }
        }

        frames
    }

    /// Drop the interpolation state, e.g. after the graph was paused
    pub fn reset(&mut self) {
        self.primed = false;
        self.position = 0.0;
        self.prev = [0.0; MAX_CHANNELS];
        self.next = [0.0; MAX_CHANNELS];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(samples: Vec<f32>, channels: usize) -> impl FnMut(&mut [f32]) -> bool {
        let mut cursor = 0;
        move |frame: &mut [f32]| {
            if cursor + channels > samples.len() {
                return false;
            }
            frame.copy_from_slice(&samples[cursor..cursor + channels]);
            cursor += channels;
            true
        }
    }

    #[test]
    fn test_map_channels_layouts() {
        let mut stereo = [0.0; 2];
        map_channels(&[0.5], &mut stereo);
        assert_eq!(stereo, [0.5, 0.5]);

        let mut mono = [0.0; 1];
        map_channels(&[0.2, 0.4], &mut mono);
        assert!((mono[0] - 0.3).abs() < 1e-6);

        let mut quad = [9.0; 4];
        map_channels(&[0.1, 0.2], &mut quad);
        assert_eq!(quad, [0.1, 0.2, 0.0, 0.0]);

        let mut stereo = [0.0; 2];
        map_channels(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], &mut stereo);
        assert_eq!(stereo, [0.1, 0.2]);
    }

    #[test]
    fn test_same_format_passes_samples_through() {
        let format = AudioFormat::new(48000, 2);
        let mut mixer = Mixer::new(format, format);
        assert!(!mixer.is_converting());

        let input: Vec<f32> = (0..20).map(|i| i as f32).collect();
        let mut out = [0.0; 8];
        let rendered = mixer.render(&mut out, source(input, 2));

        assert_eq!(rendered, 4);
        assert_eq!(out, [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_mono_to_stereo() {
        let mut mixer = Mixer::new(AudioFormat::new(48000, 1), AudioFormat::new(48000, 2));
        let mut out = [0.0; 6];
        mixer.render(&mut out, source(vec![0.1, 0.2, 0.3, 0.4], 1));
        assert_eq!(out, [0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn test_upsampling_interpolates() {
        // 24k -> 48k: every other output frame lands halfway between inputs
        let mut mixer = Mixer::new(AudioFormat::new(24000, 1), AudioFormat::new(48000, 1));
        let mut out = [0.0; 4];
        let rendered = mixer.render(&mut out, source(vec![0.0, 1.0, 2.0, 3.0], 1));

        assert_eq!(rendered, 4);
        assert_eq!(out, [0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_downsampling_consumes_faster() {
        let mut mixer = Mixer::new(AudioFormat::new(96000, 1), AudioFormat::new(48000, 1));
        let input: Vec<f32> = (0..16).map(|i| i as f32).collect();
        let mut out = [0.0; 4];
        mixer.render(&mut out, source(input, 1));
        assert_eq!(out, [0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_mismatched_rate_and_layout() {
        // 44.1k mono capture into a 48k stereo output
        let input_format = AudioFormat::new(44100, 1);
        let output_format = AudioFormat::new(48000, 2);
        let mut mixer = Mixer::new(input_format, output_format);
        assert!(mixer.is_converting());

        let input = vec![0.25_f32; 44100 / 10];
        let mut out = vec![0.0_f32; 2 * 4000];
        let rendered = mixer.render(&mut out, source(input, 1));

        assert_eq!(rendered, 4000);
        assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_starvation_fills_silence() {
        let format = AudioFormat::new(48000, 2);
        let mut mixer = Mixer::new(format, format);

        let mut out = [1.0; 8];
        let rendered = mixer.render(&mut out, source(vec![0.5, 0.5, 0.5, 0.5], 2));
        assert_eq!(rendered, 1);
        assert_eq!(&out[..2], &[0.5, 0.5]);
        assert!(out[2..].iter().all(|&s| s == 0.0));

        // Starved from the start
        let mut out = [1.0; 4];
        assert_eq!(mixer.render(&mut out, |_| false), 0);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn test_channel_count_clamped() {
        let mixer = Mixer::new(AudioFormat::new(48000, 0), AudioFormat::new(0, 32));
        assert_eq!(mixer.input_format().channels, 1);
        assert_eq!(mixer.output_format().channels, MAX_CHANNELS as u16);
        assert_eq!(mixer.output_format().sample_rate, 1);
    }
}
