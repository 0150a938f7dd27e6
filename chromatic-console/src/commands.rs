//! Runtime commands read from stdin.

use std::str::FromStr;

use anyhow::{Context, anyhow, bail};
use chromatic_core::{Settings, TuningNotation};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SampleRate(u32),
    FrameSize(usize),
    Fundamental(f64),
    Notation(TuningNotation),
    /// Switch between sharp and flat note labels.
    ToggleAlternative,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> anyhow::Result<Self> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            bail!("empty command");
        };
        let argument = words.next();
        if words.next().is_some() {
            bail!("too many arguments for '{}'", name);
        }
        let value = || argument.ok_or_else(|| anyhow!("'{}' needs a value", name));

        let command = match name.to_ascii_lowercase().as_str() {
            "rate" => Command::SampleRate(value()?.parse().context("sample rate must be an integer")?),
            "frame" => Command::FrameSize(value()?.parse().context("frame size must be an integer")?),
            "fundamental" => Command::Fundamental(value()?.parse().context("fundamental must be a number")?),
            "notation" => Command::Notation(value()?.parse()?),
            "alternative" => Command::ToggleAlternative,
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command '{}'", other),
        };

        if argument.is_some() && matches!(command, Command::ToggleAlternative | Command::Quit) {
            bail!("'{}' takes no value", name);
        }
        Ok(command)
    }
}

impl Command {
    /// Writes the command's value into `settings`.
    ///
    /// # Returns
    /// * `true` if the command changes settings, `false` for display and
    ///   control commands
    pub fn apply(&self, settings: &mut Settings) -> bool {
        match *self {
            Command::SampleRate(rate) => settings.sample_frequency = rate,
            Command::FrameSize(size) => settings.fft_frame_size = size,
            Command::Fundamental(hz) => settings.fundamental_frequency = hz,
            Command::Notation(notation) => settings.notation = notation,
            Command::ToggleAlternative | Command::Quit => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_settings_commands() {
        assert_eq!("rate 22050".parse::<Command>().unwrap(), Command::SampleRate(22050));
        assert_eq!("frame 8192".parse::<Command>().unwrap(), Command::FrameSize(8192));
        assert_eq!(" fundamental 442.5 ".parse::<Command>().unwrap(), Command::Fundamental(442.5));
        assert_eq!(
            "notation German".parse::<Command>().unwrap(),
            Command::Notation(TuningNotation::German)
        );
    }

    #[test]
    fn parses_control_commands() {
        assert_eq!("alternative".parse::<Command>().unwrap(), Command::ToggleAlternative);
        assert_eq!("QUIT".parse::<Command>().unwrap(), Command::Quit);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!("".parse::<Command>().is_err());
        assert!("rate".parse::<Command>().is_err());
        assert!("rate fast".parse::<Command>().is_err());
        assert!("rate 44100 22050".parse::<Command>().is_err());
        assert!("notation dutch".parse::<Command>().is_err());
        assert!("quit now".parse::<Command>().is_err());
        assert!("volume 3".parse::<Command>().is_err());
    }

    #[test]
    fn apply_changes_only_settings_commands() {
        let mut settings = Settings::default();
        assert!(Command::FrameSize(8192).apply(&mut settings));
        assert_eq!(settings.fft_frame_size, 8192);

        let before = settings.clone();
        assert!(!Command::ToggleAlternative.apply(&mut settings));
        assert!(!Command::Quit.apply(&mut settings));
        assert_eq!(settings, before);
    }

    #[test]
    fn applied_out_of_range_value_fails_validation() {
        let mut settings = Settings::default();
        Command::SampleRate(48000).apply(&mut settings);
        assert!(settings.worker_options().is_err());
    }
}
