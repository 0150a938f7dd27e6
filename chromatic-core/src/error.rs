//! Error types for the tuner core.
//!
//! Backend failures and configuration failures are kept apart so the
//! configuration layer can tell "the device refused these parameters" from
//! "these parameters were never valid".

use thiserror::Error;

/// Failures of the audio capture backend.
///
/// Fatal to the current stream instance, recoverable by starting again with
/// different parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    #[error("no input device available")]
    NoInputDevice,

    #[error("could not query input device: {0}")]
    DeviceName(String),

    #[error("no supported f32 input configuration at {sample_frequency} Hz")]
    UnsupportedConfig { sample_frequency: u32 },

    #[error("failed to open input stream: {0}")]
    Open(String),

    #[error("failed to start input stream: {0}")]
    Start(String),

    #[error("failed to stop input stream: {0}")]
    Stop(String),
}

/// Rejected configuration input.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported sample frequency {0} Hz (expected 44100 or 22050)")]
    SampleFrequency(u32),

    #[error("unsupported FFT frame size {0} (expected 4096 or 8192)")]
    FrameSize(usize),

    #[error("fundamental frequency {0} Hz outside (400, 480]")]
    FundamentalFrequency(f64),

    #[error("unknown notation '{0}' (expected us, french or german)")]
    Notation(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("audio: {0}")]
    Audio(#[from] AudioError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to spawn pitch worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
