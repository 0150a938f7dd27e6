// chromatic-core/src/lib.rs

//! The core logic for the chromatic tuner.
//! This crate captures audio, estimates the pitch of the most recent frame
//! by FFT autocorrelation, and classifies it against a twelve-tone equal
//! tempered scale. It is completely headless; front ends read the published
//! [`VisualizationSnapshot`] and react to [`WorkerEvent`]s.

pub mod audio;
pub mod config;
pub mod cyclic_buffer;
pub mod error;
pub mod fft;
pub mod pitch;
pub mod presence;
pub mod profiler;
pub mod tuning;
pub mod visualization;
pub mod worker;

pub use config::{Settings, WorkerOptions};
pub use cyclic_buffer::CyclicBuffer;
pub use error::{AudioError, ConfigError, Error, Result};
pub use pitch::{PitchEstimator, ZERO_PADDING_FACTOR};
pub use tuning::{EstimatedNote, TuningNotation, TuningParameters};
pub use visualization::VisualizationSnapshot;
pub use worker::{PitchDetectionWorker, WorkerEvent, WorkerState, WorkerStats};
