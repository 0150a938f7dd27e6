//! Synthetic square-wave input for running the pipeline without hardware.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{info, warn};

use super::{AudioBackend, AudioCallback, CaptureInfo, StreamParams};
use crate::error::AudioError;

/// Amplitude of the generated square wave, as a fraction of full scale.
const AMPLITUDE: f32 = 1000.0 / 32768.0;

/// Generates a square wave at a fixed frequency, delivered in
/// `frames_per_buffer` chunks paced in real time.
pub struct ReferenceToneBackend {
    frequency: f64,
    running: Arc<AtomicBool>,
    generator: Option<JoinHandle<()>>,
}

impl ReferenceToneBackend {
    pub fn new(frequency: f64) -> Self {
        Self {
            frequency,
            running: Arc::new(AtomicBool::new(false)),
            generator: None,
        }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }
}

impl Default for ReferenceToneBackend {
    fn default() -> Self {
        Self::new(110.0)
    }
}

/// Fills `chunk` with the square wave starting at sample `offset`.
fn square_wave(chunk: &mut [f32], frequency: f64, sample_frequency: u32, offset: u64) {
    for (k, sample) in chunk.iter_mut().enumerate() {
        let t = (offset + k as u64) as f64 / sample_frequency as f64;
        let phase = (2.0 * std::f64::consts::PI * frequency * t).sin();
        *sample = if phase >= 0.0 { AMPLITUDE } else { -AMPLITUDE };
    }
}

impl AudioBackend for ReferenceToneBackend {
    fn start(&mut self, params: StreamParams, mut callback: AudioCallback) -> Result<(), AudioError> {
        if self.generator.is_some() {
            return Err(AudioError::Start("reference tone already running".to_string()));
        }

        let frequency = self.frequency;
        let chunk_len = params.frames_per_buffer.max(1);
        let chunk_duration = Duration::from_secs_f64(chunk_len as f64 / params.sample_frequency as f64);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::Release);

        let generator = thread::Builder::new()
            .name("reference-tone".to_string())
            .spawn(move || {
                let mut chunk = vec![0.0f32; chunk_len];
                let mut offset = 0u64;
                let mut deadline = Instant::now();
                while running.load(Ordering::Acquire) {
                    square_wave(&mut chunk, frequency, params.sample_frequency, offset);
                    offset += chunk_len as u64;
                    callback(&chunk, &CaptureInfo::now());

                    deadline += chunk_duration;
                    if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
                        thread::sleep(wait);
                    }
                }
            })
            .map_err(|e| AudioError::Open(e.to_string()))?;

        info!(
            "Reference tone at {:.2} Hz started ({} Hz, {} frames per buffer)",
            frequency, params.sample_frequency, chunk_len
        );
        self.generator = Some(generator);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Release);
        if let Some(generator) = self.generator.take() {
            if generator.join().is_err() {
                warn!("Reference tone generator panicked");
                return Err(AudioError::Stop("reference tone generator panicked".to_string()));
            }
            info!("Reference tone stopped");
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!("Reference square wave [{:.2} Hz]", self.frequency)
    }
}

impl Drop for ReferenceToneBackend {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
