//! Audio Stream Management
//!
//! Handles the cpal stream setup and real-time audio callbacks.
//!
//! # Audio Flow
//!
//! ```text
//! capture cb ──rtrb──▶ output cb: EQ (input fmt) ──▶ Mixer ──▶ device (output fmt)
//! ```
//!
//! The capture device is normally a loopback driver set as the system
//! output, so the graph equalizes everything the system plays.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, Stream, StreamConfig as CpalStreamConfig};
use crossbeam_channel::Sender;
use maceq_dsp::{map_channels, AudioFormat, EqParameters, EqUnit, Mixer, MAX_CHANNELS};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::graph::SignalGraph;
use crate::message::Update;

/// Output frames rendered per step when the device has more channels than the graph
const SCRATCH_FRAMES: usize = 256;

/// Shared state between audio callbacks and the control thread
pub struct SharedState {
    /// Live EQ parameters, written by the session
    pub params: EqParameters,

    /// Peak level left channel (for meters)
    peak_left_bits: AtomicU32,

    /// Peak level right channel
    peak_right_bits: AtomicU32,

    /// Peak levels of the captured signal, before the EQ
    input_left_bits: AtomicU32,
    input_right_bits: AtomicU32,

    underruns: AtomicU64,

    /// Output callback discards buffered input on its next run
    flush: AtomicBool,

    /// A stream reported that its device went away
    device_lost: AtomicBool,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            params: EqParameters::new(),
            peak_left_bits: AtomicU32::new(0.0_f32.to_bits()),
            peak_right_bits: AtomicU32::new(0.0_f32.to_bits()),
            input_left_bits: AtomicU32::new(0.0_f32.to_bits()),
            input_right_bits: AtomicU32::new(0.0_f32.to_bits()),
            underruns: AtomicU64::new(0),
            flush: AtomicBool::new(false),
            device_lost: AtomicBool::new(false),
        }
    }

    pub fn set_peaks(&self, left: f32, right: f32) {
        self.peak_left_bits.store(left.to_bits(), Ordering::Relaxed);
        self.peak_right_bits.store(right.to_bits(), Ordering::Relaxed);
    }

    /// Output peak levels (left, right)
    pub fn peaks(&self) -> (f32, f32) {
        (
            f32::from_bits(self.peak_left_bits.load(Ordering::Relaxed)),
            f32::from_bits(self.peak_right_bits.load(Ordering::Relaxed)),
        )
    }

    pub fn set_input_peaks(&self, left: f32, right: f32) {
        self.input_left_bits.store(left.to_bits(), Ordering::Relaxed);
        self.input_right_bits.store(right.to_bits(), Ordering::Relaxed);
    }

    /// Input peak levels (left, right)
    pub fn input_peaks(&self) -> (f32, f32) {
        (
            f32::from_bits(self.input_left_bits.load(Ordering::Relaxed)),
            f32::from_bits(self.input_right_bits.load(Ordering::Relaxed)),
        )
    }

    pub fn note_underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
    }

    /// Output buffers that could not be filled completely
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    pub fn request_flush(&self) {
        self.flush.store(true, Ordering::Release);
    }

    fn take_flush(&self) -> bool {
        self.flush.swap(false, Ordering::Acquire)
    }

    fn mark_device_lost(&self) {
        self.device_lost.store(true, Ordering::Release);
    }

    fn take_device_lost(&self) -> bool {
        self.device_lost.swap(false, Ordering::Acquire)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// EQ and mixer nodes of the graph, driven from the output side
///
/// Owns everything the output callback touches; never allocates after
/// construction.
pub struct GraphProcessor {
    eq: EqUnit,
    mixer: Mixer,
    shared: Arc<SharedState>,
    /// Graph-format block for devices wider than the graph
    scratch: Vec<f32>,
}

impl GraphProcessor {
    pub fn new(
        input: AudioFormat,
        output: AudioFormat,
        shared: Arc<SharedState>,
    ) -> EngineResult<Self> {
        let mut eq = EqUnit::new(input.sample_rate as f32, input.channels)?;
        eq.sync(&shared.params);

        let mixer = Mixer::new(input, output);
        if mixer.is_converting() {
            debug!(
                "Mixer converts {} -> {}",
                mixer.input_format(),
                mixer.output_format()
            );
        }
        let scratch = vec![0.0; SCRATCH_FRAMES * mixer.output_format().channels as usize];

        Ok(Self {
            eq,
            mixer,
            shared,
            scratch,
        })
    }

    /// Render interleaved output frames, pulling input frames from `pull`
    ///
    /// Input frames pass through the EQ before format conversion. Returns
    /// the number of frames rendered from real input; the rest is silence.
    pub fn render<F>(&mut self, output: &mut [f32], mut pull: F) -> usize
    where
        F: FnMut(&mut [f32]) -> bool,
    {
        self.eq.sync(&self.shared.params);

        let eq = &mut self.eq;
        let mut input_l = 0.0_f32;
        let mut input_r = 0.0_f32;
        let rendered = self.mixer.render(output, |frame| {
            if !pull(frame) {
                return false;
            }
            let right = if frame.len() > 1 { 1 } else { 0 };
            input_l = input_l.max(frame[0].abs());
            input_r = input_r.max(frame[right].abs());
            eq.process_frame(frame);
            true
        });
        self.shared.set_input_peaks(input_l, input_r);

        let channels = self.mixer.output_format().channels as usize;
        let right = if channels > 1 { 1 } else { 0 };
        let mut peak_l = 0.0_f32;
        let mut peak_r = 0.0_f32;
        for frame in output.chunks_exact(channels) {
            peak_l = peak_l.max(frame[0].abs());
            peak_r = peak_r.max(frame[right].abs());
        }
        self.shared.set_peaks(peak_l, peak_r);

        rendered
    }

    /// Fill one device buffer from the capture ring
    ///
    /// Honours a pending flush, then renders through the nodes and maps the
    /// graph channels onto `device_channels`. A buffer the ring could not
    /// fill completely counts as an underrun. Returns the frames rendered
    /// from captured input.
    pub fn render_from_ring(
        &mut self,
        data: &mut [f32],
        device_channels: usize,
        consumer: &mut Consumer<f32>,
    ) -> usize {
        if self.shared.take_flush() {
            let stale = consumer.slots();
            if let Ok(chunk) = consumer.read_chunk(stale) {
                chunk.commit_all();
            }
            self.reset();
        }

        let device_channels = device_channels.max(1);
        let graph_channels = self.mixer.output_format().channels as usize;
        let expected = data.len() / device_channels;

        let mut pull = |frame: &mut [f32]| {
            if consumer.slots() < frame.len() {
                return false;
            }
            for sample in frame.iter_mut() {
                *sample = consumer.pop().unwrap_or(0.0);
            }
            true
        };

        let rendered = if device_channels == graph_channels {
            self.render(data, &mut pull)
        } else {
            // Taking the buffer out leaves an empty Vec; nothing is allocated
            let mut scratch = std::mem::take(&mut self.scratch);
            let mut rendered = 0;
            for chunk in data.chunks_mut(device_channels * SCRATCH_FRAMES) {
                let frames = chunk.len() / device_channels;
                let block = &mut scratch[..frames * graph_channels];
                rendered += self.render(block, &mut pull);
                for (dst, src) in chunk
                    .chunks_exact_mut(device_channels)
                    .zip(block.chunks_exact(graph_channels))
                {
                    map_channels(src, dst);
                }
            }
            self.scratch = scratch;
            rendered
        };

        if rendered < expected {
            self.shared.note_underrun();
        }
        rendered
    }

    /// Clear filter and interpolation state
    pub fn reset(&mut self) {
        self.eq.reset();
        self.mixer.reset();
    }

    pub fn input_format(&self) -> AudioFormat {
        self.mixer.input_format()
    }

    pub fn output_format(&self) -> AudioFormat {
        self.mixer.output_format()
    }
}

/// Default devices and their stream configurations
struct Endpoints {
    input: Device,
    output: Device,
    input_name: String,
    output_name: String,
    input_config: CpalStreamConfig,
    output_config: CpalStreamConfig,
}

impl Endpoints {
    fn query(config: &EngineConfig) -> EngineResult<Self> {
        let host = cpal::default_host();
        let input = host
            .default_input_device()
            .ok_or_else(|| EngineError::DeviceNotFound("no default input device".into()))?;
        let output = host
            .default_output_device()
            .ok_or_else(|| EngineError::DeviceNotFound("no default output device".into()))?;

        let input_supported = input
            .default_input_config()
            .map_err(|e| EngineError::ConfigError(e.to_string()))?;
        let output_supported = output
            .default_output_config()
            .map_err(|e| EngineError::ConfigError(e.to_string()))?;

        for (side, format) in [
            ("input", input_supported.sample_format()),
            ("output", output_supported.sample_format()),
        ] {
            if format != SampleFormat::F32 {
                warn!("Default {} sample format is {:?}, requesting f32", side, format);
            }
        }

        let buffer_size = config
            .buffer_frames
            .map_or(BufferSize::Default, BufferSize::Fixed);

        Ok(Self {
            input_name: input.name().unwrap_or_default(),
            output_name: output.name().unwrap_or_default(),
            input_config: CpalStreamConfig {
                channels: input_supported.channels(),
                sample_rate: input_supported.sample_rate(),
                buffer_size,
            },
            output_config: CpalStreamConfig {
                channels: output_supported.channels(),
                sample_rate: output_supported.sample_rate(),
                buffer_size,
            },
            input,
            output,
        })
    }

    /// Same devices in the same stream configurations
    fn matches(&self, other: &Endpoints) -> bool {
        self.input_name == other.input_name
            && self.output_name == other.output_name
            && self.input_config == other.input_config
            && self.output_config == other.output_config
    }
}

/// Graph format for a device configuration; channel count capped for the nodes
fn graph_format(config: &CpalStreamConfig) -> AudioFormat {
    AudioFormat::new(
        config.sample_rate.0,
        config.channels.clamp(1, MAX_CHANNELS as u16),
    )
}

/// Built streams and the devices they were built for
struct ActiveStreams {
    endpoints: Endpoints,
    capture: Stream,
    output: Stream,
}

/// Signal graph on the system default input and output devices
///
/// Every `start` looks up the current default devices. Streams built for
/// the same devices and formats are resumed; otherwise they are rebuilt
/// and the reported formats follow the new devices. A device that vanished
/// while running is never resumed.
pub struct CpalGraph {
    config: EngineConfig,
    streams: Option<ActiveStreams>,
    input_format: AudioFormat,
    output_format: AudioFormat,
    shared: Arc<SharedState>,
    updates: Option<Sender<Update>>,
    running: bool,
}

impl CpalGraph {
    pub fn new(config: EngineConfig) -> Self {
        let shared = Arc::new(SharedState::new());
        shared.params.set_global_gain(config.global_gain_db);

        let (input_format, output_format) = match Endpoints::query(&config) {
            Ok(endpoints) => (
                graph_format(&endpoints.input_config),
                graph_format(&endpoints.output_config),
            ),
            Err(e) => {
                warn!("Audio devices unavailable: {}", e);
                (AudioFormat::default(), AudioFormat::default())
            }
        };

        debug!(
            "Signal graph formats: input {}, output {}",
            input_format, output_format
        );
        if let Some(latency) = config.latency_ms(output_format.sample_rate) {
            debug!("Device buffer latency {:.1} ms", latency);
        }

        Self {
            config,
            streams: None,
            input_format,
            output_format,
            shared,
            updates: None,
            running: false,
        }
    }

    /// Forward stream errors to the main queue
    pub fn with_updates(mut self, sender: Sender<Update>) -> Self {
        self.updates = Some(sender);
        self
    }

    fn build_streams(&self, endpoints: &Endpoints) -> EngineResult<(Stream, Stream)> {
        let ring_size = self.config.ring_buffer_samples(self.input_format);
        let (producer, consumer) = RingBuffer::<f32>::new(ring_size);

        let processor =
            GraphProcessor::new(self.input_format, self.output_format, Arc::clone(&self.shared))?;

        let capture = build_capture_stream(
            &endpoints.input,
            &endpoints.input_config,
            self.input_format.channels as usize,
            producer,
            error_callback(Arc::clone(&self.shared), self.updates.clone()),
        )?;
        let output = build_output_stream(
            &endpoints.output,
            &endpoints.output_config,
            consumer,
            processor,
            error_callback(Arc::clone(&self.shared), self.updates.clone()),
        )?;

        Ok((capture, output))
    }

    /// Make sure streams exist for the current default devices
    fn prepare(&mut self) -> EngineResult<()> {
        if self.shared.take_device_lost() && self.streams.take().is_some() {
            debug!("Dropped streams of a lost device");
        }

        let endpoints = Endpoints::query(&self.config)?;
        if let Some(active) = &self.streams {
            if active.endpoints.matches(&endpoints) {
                return Ok(());
            }
            info!(
                "Default devices changed to '{}' -> '{}', rebuilding streams",
                endpoints.input_name, endpoints.output_name
            );
            self.streams = None;
        }

        self.input_format = graph_format(&endpoints.input_config);
        self.output_format = graph_format(&endpoints.output_config);
        let (capture, output) = self.build_streams(&endpoints)?;
        self.streams = Some(ActiveStreams {
            endpoints,
            capture,
            output,
        });
        Ok(())
    }
}

impl SignalGraph for CpalGraph {
    fn start(&mut self) -> EngineResult<()> {
        if self.running {
            return Ok(());
        }

        self.prepare()?;

        if let Some(active) = &self.streams {
            self.shared.request_flush();
            active
                .capture
                .play()
                .map_err(|e| EngineError::StreamPlayError(e.to_string()))?;
            if let Err(e) = active.output.play() {
                let _ = active.capture.pause();
                return Err(EngineError::StreamPlayError(e.to_string()));
            }
        }

        self.running = true;
        info!(
            "Audio graph running ({} -> {})",
            self.input_format, self.output_format
        );
        Ok(())
    }

    fn stop(&mut self) {
        if !self.running {
            return;
        }
        if let Some(active) = &self.streams {
            if let Err(e) = active.output.pause() {
                warn!("Failed to pause output stream: {}", e);
            }
            if let Err(e) = active.capture.pause() {
                warn!("Failed to pause capture stream: {}", e);
            }
        }
        self.running = false;
        info!("Audio graph stopped");
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn input_format(&self) -> AudioFormat {
        self.input_format
    }

    fn output_format(&self) -> AudioFormat {
        self.output_format
    }

    fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }
}

impl Drop for CpalGraph {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Stream errors go to the main queue; a vanished device also marks the
/// streams for rebuilding
fn error_callback(
    shared: Arc<SharedState>,
    updates: Option<Sender<Update>>,
) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        let fatal = matches!(err, cpal::StreamError::DeviceNotAvailable);
        if fatal {
            shared.mark_device_lost();
        }
        if let Some(sender) = &updates {
            let _ = sender.try_send(Update::StreamError {
                message: err.to_string(),
                fatal,
            });
        }
    }
}

/// Build the capture stream feeding the ring buffer
///
/// Only the first `graph_channels` channels of each device frame are kept.
fn build_capture_stream<E>(
    device: &Device,
    config: &CpalStreamConfig,
    graph_channels: usize,
    mut producer: Producer<f32>,
    on_error: E,
) -> EngineResult<Stream>
where
    E: FnMut(cpal::StreamError) + Send + 'static,
{
    let device_channels = config.channels.max(1) as usize;

    device
        .build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Real-time audio callback - NO allocations allowed here
                for frame in data.chunks_exact(device_channels) {
                    if producer.slots() < graph_channels {
                        // Output side is not draining; drop the rest
                        break;
                    }
                    for &sample in &frame[..graph_channels] {
                        let _ = producer.push(sample);
                    }
                }
            },
            on_error,
            None, // No timeout
        )
        .map_err(|e| EngineError::StreamBuildError(e.to_string()))
}

/// Build the output stream running the EQ and mixer nodes
fn build_output_stream<E>(
    device: &Device,
    config: &CpalStreamConfig,
    mut consumer: Consumer<f32>,
    mut processor: GraphProcessor,
    on_error: E,
) -> EngineResult<Stream>
where
    E: FnMut(cpal::StreamError) + Send + 'static,
{
    let device_channels = config.channels.max(1) as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                // Real-time audio callback - NO allocations allowed here
                processor.render_from_ring(data, device_channels, &mut consumer);
            },
            on_error,
            None,
        )
        .map_err(|e| EngineError::StreamBuildError(e.to_string()))
}
