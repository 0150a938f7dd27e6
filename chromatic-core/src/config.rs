//! # Configuration Module
//!
//! Settings as supplied by the user and the validated [`WorkerOptions`]
//! handed to the pitch worker.
//!
//! Validation happens here, once. The worker trusts the options it is given.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tuning::{TuningNotation, TuningParameters};

/// Sample rates the capture stream may be opened with.
pub const SUPPORTED_SAMPLE_FREQUENCIES: [u32; 2] = [44100, 22050];

/// Analysis frame sizes, in samples.
pub const SUPPORTED_FRAME_SIZES: [usize; 2] = [4096, 8192];

/// Options for one configuration of the pitch worker.
///
/// The tuning parameters are an owned snapshot; changing them means sending
/// a new `WorkerOptions` through the worker's reconfiguration cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerOptions {
    pub sample_frequency: u32,
    pub fft_frame_size: usize,
    pub tuning: TuningParameters,
}

/// User-facing settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub sample_frequency: u32,
    pub fft_frame_size: usize,
    pub fundamental_frequency: f64,
    pub notation: TuningNotation,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sample_frequency: 44100,
            fft_frame_size: 4096,
            fundamental_frequency: 440.0,
            notation: TuningNotation::Us,
        }
    }
}

/// Settings as found on disk, every entry optional.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    sample_frequency: Option<u32>,
    fft_frame_size: Option<usize>,
    fundamental_frequency: Option<f64>,
    notation: Option<String>,
}

pub fn check_sample_frequency(value: u32) -> Result<u32, ConfigError> {
    if SUPPORTED_SAMPLE_FREQUENCIES.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::SampleFrequency(value))
    }
}

pub fn check_frame_size(value: usize) -> Result<usize, ConfigError> {
    if SUPPORTED_FRAME_SIZES.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::FrameSize(value))
    }
}

pub fn check_fundamental_frequency(value: f64) -> Result<f64, ConfigError> {
    if value > 400.0 && value <= 480.0 {
        Ok(value)
    } else {
        Err(ConfigError::FundamentalFrequency(value))
    }
}

/// Applies `value` to `slot` if it validates, otherwise keeps the current
/// value and logs the rejection.
fn apply_checked<T, U>(key: &str, value: Option<U>, slot: &mut T, check: impl FnOnce(U) -> Result<T, ConfigError>)
where
    U: std::fmt::Debug + Clone,
{
    let Some(value) = value else {
        return;
    };
    match check(value.clone()) {
        Ok(valid) => {
            info!("Applying setting '{}'. Value: {:?}", key, value);
            *slot = valid;
        }
        Err(e) => warn!("Invalid value for setting '{}' ({}), keeping default", key, e),
    }
}

impl Settings {
    /// Parses a settings document, keeping defaults for missing or invalid
    /// entries.
    ///
    /// # Returns
    /// * `Err(ConfigError::Parse)` if the document is not a settings object
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawSettings = serde_json::from_str(json)?;
        let mut settings = Settings::default();

        apply_checked("sample_frequency", raw.sample_frequency, &mut settings.sample_frequency, check_sample_frequency);
        apply_checked("fft_frame_size", raw.fft_frame_size, &mut settings.fft_frame_size, check_frame_size);
        apply_checked(
            "fundamental_frequency",
            raw.fundamental_frequency,
            &mut settings.fundamental_frequency,
            check_fundamental_frequency,
        );
        apply_checked("notation", raw.notation, &mut settings.notation, |s: String| s.parse());

        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Rejects any value outside the supported ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_sample_frequency(self.sample_frequency)?;
        check_frame_size(self.fft_frame_size)?;
        check_fundamental_frequency(self.fundamental_frequency)?;
        Ok(())
    }

    pub fn tuning_parameters(&self) -> TuningParameters {
        TuningParameters::new(self.fundamental_frequency, self.notation)
    }

    pub fn worker_options(&self) -> Result<WorkerOptions, ConfigError> {
        self.validate()?;
        Ok(WorkerOptions {
            sample_frequency: self.sample_frequency,
            fft_frame_size: self.fft_frame_size,
            tuning: self.tuning_parameters(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(Settings::from_json("{}").unwrap(), Settings::default());
    }

    #[test]
    fn valid_entries_are_applied() {
        let settings = Settings::from_json(
            r#"{"sample_frequency": 22050, "fft_frame_size": 8192,
                "fundamental_frequency": 442.0, "notation": "french"}"#,
        )
        .unwrap();
        assert_eq!(settings.sample_frequency, 22050);
        assert_eq!(settings.fft_frame_size, 8192);
        assert_eq!(settings.fundamental_frequency, 442.0);
        assert_eq!(settings.notation, TuningNotation::French);
    }

    #[test]
    fn invalid_entries_keep_defaults() {
        let settings = Settings::from_json(
            r#"{"sample_frequency": 48000, "fft_frame_size": 2048,
                "fundamental_frequency": 400.0, "notation": "dutch"}"#,
        )
        .unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn mistyped_document_is_a_parse_error() {
        let err = Settings::from_json(r#"{"sample_frequency": "fast"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn fundamental_range_is_half_open() {
        assert!(check_fundamental_frequency(400.0).is_err());
        assert!(check_fundamental_frequency(400.01).is_ok());
        assert!(check_fundamental_frequency(480.0).is_ok());
        assert!(check_fundamental_frequency(480.01).is_err());
    }

    #[test]
    fn validate_is_strict() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());
        settings.fft_frame_size = 1024;
        assert!(matches!(settings.validate(), Err(ConfigError::FrameSize(1024))));
        assert!(settings.worker_options().is_err());
    }

    #[test]
    fn worker_options_carry_tuning_snapshot() {
        let settings = Settings {
            fundamental_frequency: 415.0,
            notation: TuningNotation::German,
            ..Settings::default()
        };
        let options = settings.worker_options().unwrap();
        assert_eq!(options.sample_frequency, 44100);
        assert_eq!(options.fft_frame_size, 4096);
        assert_eq!(options.tuning.fundamental_frequency(), 415.0);
        assert_eq!(options.tuning.notation(), TuningNotation::German);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Settings::load("/nonexistent/chromatic_settings.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
