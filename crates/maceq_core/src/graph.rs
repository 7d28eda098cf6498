//! Signal Graph Abstraction
//!
//! capture → EQ → mixer → output. The session only starts, stops and feeds
//! parameters to a graph; `CpalGraph` drives real devices and
//! `SimulatedGraph` runs the same nodes offline.

use std::sync::Arc;

use maceq_dsp::AudioFormat;
use maceq_platform::{AudioHardware, Scope};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::stream::{GraphProcessor, SharedState};

/// A startable capture → EQ → mixer → output chain
pub trait SignalGraph {
    /// Start audio flow; a no-op when already running
    fn start(&mut self) -> EngineResult<()>;

    /// Stop audio flow; a no-op when already stopped
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Format of the capture and EQ legs
    fn input_format(&self) -> AudioFormat;

    /// Format of the output leg
    fn output_format(&self) -> AudioFormat;

    /// Parameters and meters shared with the audio callbacks
    fn shared(&self) -> &Arc<SharedState>;
}

/// Offline graph for tests and hardware-free runs
///
/// Audio is pushed through `render` instead of device callbacks. Start
/// failures can be injected. A graph made with `from_hardware` follows the
/// hardware's default devices: every start re-reads their formats.
pub struct SimulatedGraph {
    processor: GraphProcessor,
    shared: Arc<SharedState>,
    hardware: Option<Arc<dyn AudioHardware>>,
    start_failure: Option<String>,
    running: bool,
}

impl SimulatedGraph {
    pub fn new(input: AudioFormat, output: AudioFormat) -> EngineResult<Self> {
        let shared = Arc::new(SharedState::new());
        let processor = GraphProcessor::new(input, output, Arc::clone(&shared))?;
        Ok(Self {
            processor,
            shared,
            hardware: None,
            start_failure: None,
            running: false,
        })
    }

    /// Graph on the hardware's default devices, in their native formats
    pub fn from_hardware(hardware: Arc<dyn AudioHardware>) -> EngineResult<Self> {
        let (input, output) = default_formats(hardware.as_ref())?;
        debug!("Simulated graph formats: input {}, output {}", input, output);
        let mut graph = Self::new(input, output)?;
        graph.hardware = Some(hardware);
        Ok(graph)
    }

    /// Rebuild the nodes when the default devices changed format
    fn follow_defaults(&mut self) -> EngineResult<()> {
        let Some(hardware) = &self.hardware else {
            return Ok(());
        };
        let (input, output) = default_formats(hardware.as_ref())?;
        if (input, output) != (self.input_format(), self.output_format()) {
            info!("Default devices changed: input {}, output {}", input, output);
            self.processor = GraphProcessor::new(input, output, Arc::clone(&self.shared))?;
        }
        Ok(())
    }

    /// Make every following `start` fail with `cause`, or succeed again with `None`
    pub fn set_start_failure(&mut self, cause: Option<&str>) {
        self.start_failure = cause.map(str::to_string);
    }

    pub fn with_start_failure(mut self, cause: &str) -> Self {
        self.set_start_failure(Some(cause));
        self
    }

    /// Push interleaved input (input format) through the graph
    ///
    /// Produces silence while stopped. Returns the frames rendered from input.
    pub fn render(&mut self, input: &[f32], output: &mut [f32]) -> usize {
        if !self.running {
            output.fill(0.0);
            return 0;
        }

        let mut cursor = 0;
        self.processor.render(output, |frame| {
            let end = cursor + frame.len();
            if end > input.len() {
                return false;
            }
            frame.copy_from_slice(&input[cursor..end]);
            cursor = end;
            true
        })
    }
}

impl SignalGraph for SimulatedGraph {
    fn start(&mut self) -> EngineResult<()> {
        if self.running {
            return Ok(());
        }
        if let Some(cause) = &self.start_failure {
            return Err(EngineError::StreamPlayError(cause.clone()));
        }
        self.follow_defaults()?;
        self.processor.reset();
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn input_format(&self) -> AudioFormat {
        self.processor.input_format()
    }

    fn output_format(&self) -> AudioFormat {
        self.processor.output_format()
    }

    fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }
}

/// Native formats of the default input and output devices
fn default_formats(hardware: &dyn AudioHardware) -> EngineResult<(AudioFormat, AudioFormat)> {
    let format = |scope: Scope| -> EngineResult<AudioFormat> {
        let id = hardware.default_device(scope)?;
        Ok(hardware.native_format(id, scope)?)
    };
    Ok((format(Scope::Input)?, format(Scope::Output)?))
}
