//! MacEQ - Headless Host
//!
//! Wires the device catalog and equalizer session together, drives the main
//! queue and takes commands from stdin.
//!
//! Environment:
//! - `RUST_LOG`: log filter (default `maceq=info`)
//! - `MACEQ_SIMULATE=1`: in-memory devices and an offline graph
//! - `MACEQ_PRESET`: preset applied at startup
//! - `MACEQ_PROFILE`: `default`, `low-latency` or `stable`
//! - `MACEQ_BUFFER_FRAMES`, `MACEQ_RING_MS`, `MACEQ_GLOBAL_GAIN`: stream tuning

mod commands;

use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{select, tick, unbounded, Receiver};
use maceq_core::{
    band_label, format_gain, AppModel, CpalGraph, DeviceCatalog, EngineConfig, EqualizerSession,
    Event, MainQueue, SimulatedGraph, EQ_BANDS,
};
use maceq_dsp::Preset;
use maceq_platform::{AudioHardware, SimulatedHardware};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::Command;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("maceq=info")),
        )
        .init();

    info!("Starting MacEQ");

    let config = EngineConfig::from_env().context("invalid engine configuration")?;
    let simulate = std::env::var("MACEQ_SIMULATE").is_ok_and(|v| v == "1");

    let queue = MainQueue::new();
    let (hardware, session): (Arc<dyn AudioHardware>, EqualizerSession) = if simulate {
        let hardware: Arc<dyn AudioHardware> = Arc::new(SimulatedHardware::demo());
        let graph = SimulatedGraph::from_hardware(Arc::clone(&hardware))?;
        info!("Using simulated audio hardware");
        (hardware, EqualizerSession::new(Box::new(graph)))
    } else {
        if !maceq_platform::supports_default_device_changes() {
            warn!(
                "This platform can't change the system default devices; \
                 'input' and 'output' only update the selection"
            );
        }
        let graph = CpalGraph::new(config).with_updates(queue.sender());
        (maceq_platform::default_hardware(), EqualizerSession::with_cpal(graph))
    };

    let catalog = DeviceCatalog::new(hardware);
    info!("Audio backend: {}", catalog.backend_name());

    let mut model = AppModel::new(catalog, session, queue);
    let events = model.subscribe();

    model
        .refresh_devices()?
        .join()
        .map_err(|_| anyhow!("device refresh thread panicked"))?;
    model.pump();

    let setup = model.loopback_setup();
    if !setup.has_virtual_device {
        warn!("{}", setup.instructions);
    }

    if let Ok(name) = std::env::var("MACEQ_PRESET") {
        match name.parse::<Preset>() {
            Ok(preset) => model.apply_preset(preset),
            Err(e) => warn!("{}", e),
        }
    }

    if model.start().is_err() {
        error!("Equalizer is not running; fix the devices and type 'start'");
    }

    let lines = spawn_stdin_reader();
    let ticker = tick(Duration::from_millis(50));
    println!("{}", commands::HELP);

    loop {
        select! {
            recv(lines) -> line => {
                let Ok(line) = line else {
                    info!("stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match Command::parse(&line) {
                    Ok(command) => {
                        if !commands::execute(&mut model, command) {
                            break;
                        }
                    }
                    Err(e) => warn!("{}", e),
                }
            }
            recv(ticker) -> _ => {
                model.pump();
            }
        }

        for event in events.try_iter() {
            log_event(&event);
        }
    }

    model.stop();
    info!("MacEQ exited");
    Ok(())
}

/// Forward stdin lines to a channel; the channel closes on EOF
fn spawn_stdin_reader() -> Receiver<String> {
    let (sender, receiver) = unbounded();
    thread::Builder::new()
        .name("maceq-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if sender.send(line).is_err() {
                    break;
                }
            }
        })
        .map(|_| ())
        .unwrap_or_else(|e| error!("Failed to spawn stdin reader: {}", e));
    receiver
}

fn log_event(event: &Event) {
    match event {
        Event::Started => info!("Equalizer running"),
        Event::Stopped => info!("Equalizer stopped"),
        Event::BypassChanged { bypassed } => {
            info!("EQ {}", if *bypassed { "bypassed" } else { "engaged" })
        }
        Event::Error { message } => error!("{}", message),
        Event::GainsChanged { gains } => {
            let bands: Vec<String> = EQ_BANDS
                .iter()
                .zip(gains.iter())
                .map(|(&f, &g)| format!("{} {}", band_label(f), format_gain(g)))
                .collect();
            info!("Gains: {}", bands.join(" | "));
        }
        Event::DevicesChanged { devices } => info!("{} audio devices", devices.len()),
        Event::SelectionChanged { input, output } => {
            info!("Selected input {:?}, output {:?}", input, output)
        }
    }
}

pub(crate) fn log_status(model: &AppModel) {
    let snapshot = model.snapshot();
    info!(
        "{}{} | {} -> {} | in L {:.2} R {:.2} | out L {:.2} R {:.2} | underruns {}",
        if snapshot.is_running { "running" } else { "stopped" },
        if snapshot.bypassed { " (bypassed)" } else { "" },
        snapshot.input_format,
        snapshot.output_format,
        snapshot.input_peaks.0,
        snapshot.input_peaks.1,
        snapshot.output_peaks.0,
        snapshot.output_peaks.1,
        model.session().underruns(),
    );
    log_event(&Event::GainsChanged {
        gains: snapshot.gains,
    });
    if let Some(message) = snapshot.error_message {
        warn!("Last error: {}", message);
    }
}
