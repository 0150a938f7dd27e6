//! # Audio Capture Module
//!
//! The capture side of the pipeline, seen from the worker: something that
//! can be started with a sample rate and a callback, and stopped again.
//!
//! ## Backends
//! - [`ReferenceToneBackend`]: synthetic square wave, no hardware needed
//! - `CpalBackend` (feature `cpal`): the default input device through CPAL
//!
//! ## Callback contract
//! The callback runs on the backend's real-time thread. It receives a
//! contiguous slice of mono `f32` samples whose length is chosen by the
//! backend, and must return promptly.

use std::time::Instant;

use crate::error::AudioError;

#[cfg(feature = "cpal")]
mod cpal_backend;
mod reference;

#[cfg(feature = "cpal")]
pub use cpal_backend::CpalBackend;
pub use reference::ReferenceToneBackend;

/// Suggested callback latency: one buffer per displayed frame at 60 fps.
pub const SUGGESTED_LATENCY_SECS: f64 = 1.0 / 60.0;

/// Timing metadata delivered with every callback.
#[derive(Debug, Clone, Copy)]
pub struct CaptureInfo {
    /// When the backend handed the chunk over.
    pub received_at: Instant,
}

impl CaptureInfo {
    pub fn now() -> Self {
        Self {
            received_at: Instant::now(),
        }
    }
}

/// Receives captured mono samples.
pub type AudioCallback = Box<dyn FnMut(&[f32], &CaptureInfo) + Send + 'static>;

/// Parameters a stream is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    pub sample_frequency: u32,
    /// Suggested callback chunk size; backends may deliver other sizes.
    pub frames_per_buffer: usize,
}

impl StreamParams {
    pub fn new(sample_frequency: u32) -> Self {
        Self {
            sample_frequency,
            frames_per_buffer: (SUGGESTED_LATENCY_SECS * sample_frequency as f64) as usize,
        }
    }
}

/// A source of captured audio.
///
/// Backends are created and driven on the worker thread, so they need not
/// be `Send`.
pub trait AudioBackend {
    /// Opens and starts a stream delivering audio to `callback`.
    fn start(&mut self, params: StreamParams, callback: AudioCallback) -> Result<(), AudioError>;

    /// Stops and closes the current stream. Stopping an idle backend is a
    /// no-op.
    fn stop(&mut self) -> Result<(), AudioError>;

    /// Human-readable name of the device in use.
    fn description(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_per_buffer_targets_sixty_callbacks_per_second() {
        assert_eq!(StreamParams::new(44100).frames_per_buffer, 735);
        assert_eq!(StreamParams::new(22050).frames_per_buffer, 367);
    }
}
