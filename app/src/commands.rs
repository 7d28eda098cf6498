//! Console Commands
//!
//! One command per stdin line. These stand in for the sliders, buttons and
//! pickers of a windowed front end.

use anyhow::{anyhow, bail, Result};
use maceq_core::{AppModel, DeviceId, Preset, BAND_COUNT};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Gain { band: usize, gain_db: f32 },
    Reset,
    Preset(Preset),
    Bypass(bool),
    Devices,
    Loopback,
    Input(DeviceId),
    Output(DeviceId),
    Status,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            bail!("empty command");
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "start" => Command::Start,
            "stop" => Command::Stop,
            "gain" => {
                let band = words
                    .next()
                    .ok_or_else(|| anyhow!("usage: gain <band 0-{}> <dB>", BAND_COUNT - 1))?
                    .parse()?;
                let gain_db = words
                    .next()
                    .ok_or_else(|| anyhow!("usage: gain <band> <dB>"))?
                    .parse()?;
                Command::Gain { band, gain_db }
            }
            "reset" => Command::Reset,
            "preset" => {
                let name = words.collect::<Vec<_>>().join(" ");
                Command::Preset(name.parse()?)
            }
            "bypass" => match words.next().map(str::to_ascii_lowercase).as_deref() {
                Some("on") => Command::Bypass(true),
                Some("off") => Command::Bypass(false),
                _ => bail!("usage: bypass on|off"),
            },
            "devices" => Command::Devices,
            "loopback" => Command::Loopback,
            "input" => Command::Input(parse_id(words.next())?),
            "output" => Command::Output(parse_id(words.next())?),
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "q" | "quit" | "exit" => Command::Quit,
            other => bail!("unknown command '{}' (try 'help')", other),
        };
        Ok(command)
    }
}

fn parse_id(word: Option<&str>) -> Result<DeviceId> {
    Ok(word.ok_or_else(|| anyhow!("missing device id"))?.parse()?)
}

pub const HELP: &str = "\
commands:
  start | stop             start or stop the equalizer
  gain <band> <dB>         set one band (0 = 32 Hz .. 9 = 16 kHz), clamped to +/-12
  reset                    all bands to 0 dB
  preset <name>            Flat, Bass Boost, Treble Boost, Vocal
  bypass on|off            pass audio around the EQ, keeping the gains
  devices                  list devices
  loopback                 how to route system audio through MacEQ
  input <id> | output <id> select a device and make it the system default
  status                   show gains, formats and levels
  q                        quit";

/// Run one command against the model; returns false on quit
pub fn execute(model: &mut AppModel, command: Command) -> bool {
    match command {
        Command::Start => {
            // Failures are published as events and kept in the snapshot
            let _ = model.start();
        }
        Command::Stop => model.stop(),
        Command::Gain { band, gain_db } => model.set_band_gain(band, gain_db),
        Command::Reset => model.reset_all(),
        Command::Preset(preset) => model.apply_preset(preset),
        Command::Bypass(bypassed) => model.set_bypassed(bypassed),
        Command::Devices => {
            for device in model.devices() {
                info!(
                    "{:>4}  {}{}{}{}{}",
                    device.id,
                    device.name,
                    if device.has_input { "  [in]" } else { "" },
                    if device.has_output { "  [out]" } else { "" },
                    if device.is_default { "  (default)" } else { "" },
                    if device.is_virtual { "  (virtual)" } else { "" },
                );
            }
        }
        Command::Loopback => println!("{}", model.loopback_setup().instructions),
        Command::Input(id) => {
            if let Err(e) = model.select_input(id) {
                warn!("Could not select input: {}", e);
            }
        }
        Command::Output(id) => {
            if let Err(e) = model.select_output(id) {
                warn!("Could not select output: {}", e);
            }
        }
        Command::Status => crate::log_status(model),
        Command::Help => println!("{}", HELP),
        Command::Quit => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("start").unwrap(), Command::Start);
        assert_eq!(
            Command::parse("gain 3 -4.5").unwrap(),
            Command::Gain {
                band: 3,
                gain_db: -4.5
            }
        );
        assert_eq!(
            Command::parse("preset bass boost").unwrap(),
            Command::Preset(Preset::BassBoost)
        );
        assert_eq!(Command::parse("output 45").unwrap(), Command::Output(45));
        assert_eq!(Command::parse("bypass ON").unwrap(), Command::Bypass(true));
        assert_eq!(Command::parse("bypass off").unwrap(), Command::Bypass(false));
        assert_eq!(Command::parse("loopback").unwrap(), Command::Loopback);
        assert_eq!(Command::parse("Q").unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse("").is_err());
        assert!(Command::parse("gain 3").is_err());
        assert!(Command::parse("gain x 1").is_err());
        assert!(Command::parse("preset loudness").is_err());
        assert!(Command::parse("input").is_err());
        assert!(Command::parse("bypass").is_err());
        assert!(Command::parse("bypass maybe").is_err());
        assert!(Command::parse("dance").is_err());
    }
}
