//! Latest analysis results in display-ready form.
//!
//! The worker writes a [`VisualizationSnapshot`] under its mutex once per
//! analysis cycle; the rendering side copies out of it under the same mutex.
//! Neither side holds the lock across computation.

use crate::pitch::ZERO_PADDING_FACTOR;
use crate::tuning::EstimatedNote;

/// Default preview length: 50 ms at 44.1 kHz, decimated by 4.
pub const DEFAULT_PLOT_LEN: usize = 551;

/// Preview arrays plus the classification of the latest analysed frame.
///
/// Every preview array has the fixed length `plot_len`, independent of the
/// FFT frame size.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualizationSnapshot {
    plot_len: usize,
    /// Time samples starting at the first rising zero crossing.
    pub samples: Vec<f64>,
    /// Time span of `samples`, in milliseconds.
    pub sample_range_ms: f64,
    /// Power spectrum bins from DC upward.
    pub spectrum: Vec<f64>,
    /// Frequency span of `spectrum`, in Hz.
    pub spectrum_range_hz: f64,
    /// Decimated autocorrelation from lag 0.
    pub autocorr: Vec<f64>,
    /// Lag span of `autocorr`, in milliseconds.
    pub autocorr_range_ms: f64,
    pub estimated_frequency: f64,
    pub estimated_note: Option<EstimatedNote>,
    /// Number of analysis cycles published so far.
    pub cycle: u64,
    /// Configuration of the stream that produced this snapshot.
    pub sample_frequency: u32,
    pub fft_frame_size: usize,
    pub signal_present: bool,
    pub analysis_fps: f64,
}

impl VisualizationSnapshot {
    pub fn new(plot_len: usize) -> Self {
        Self {
            plot_len,
            samples: vec![0.0; plot_len],
            sample_range_ms: 0.0,
            spectrum: vec![0.0; plot_len],
            spectrum_range_hz: 0.0,
            autocorr: vec![0.0; plot_len],
            autocorr_range_ms: 0.0,
            estimated_frequency: 0.0,
            estimated_note: None,
            cycle: 0,
            sample_frequency: 0,
            fft_frame_size: 0,
            signal_present: false,
            analysis_fps: 0.0,
        }
    }

    pub fn plot_len(&self) -> usize {
        self.plot_len
    }

    /// Copies samples starting at the first rising zero crossing so that a
    /// periodic waveform stays put between frames.
    ///
    /// Without a crossing the copy starts at the first sample. The tail is
    /// zero-filled when the frame runs out.
    pub fn populate_samples(&mut self, frame: &[f32], sample_frequency: u32) {
        let start = rising_zero_crossing(frame).unwrap_or(0);
        fill_from(&mut self.samples, frame[start..].iter().map(|&s| s as f64));
        self.sample_range_ms = 1000.0 * self.plot_len as f64 / sample_frequency as f64;
    }

    pub fn populate_spectrum(&mut self, power_spectrum: &[f64], sample_frequency: u32, fft_frame_size: usize) {
        let copied = fill_from(&mut self.spectrum, power_spectrum.iter().copied());
        self.spectrum_range_hz = sample_frequency as f64 * copied as f64 / fft_frame_size as f64;
    }

    /// Copies every `stride`-th autocorrelation value.
    pub fn populate_autocorr(&mut self, autocorrelation: &[f64], sample_frequency: u32, stride: usize) {
        fill_from(&mut self.autocorr, autocorrelation.iter().step_by(stride.max(1)).copied());
        self.autocorr_range_ms = 1000.0 * self.plot_len as f64 * stride as f64
            / (ZERO_PADDING_FACTOR as f64 * sample_frequency as f64);
    }
}

/// Autocorrelation decimation covering roughly 25 ms of lag.
pub fn autocorr_stride(sample_frequency: u32) -> usize {
    ZERO_PADDING_FACTOR * (sample_frequency as usize / 22050).max(1)
}

/// Index of the first sample that is non-negative after a negative one.
pub fn rising_zero_crossing(frame: &[f32]) -> Option<usize> {
    frame
        .windows(2)
        .position(|pair| pair[0] < 0.0 && pair[1] >= 0.0)
        .map(|i| i + 1)
}

/// Fills `dst` from `src`, zeroing whatever `src` does not cover.
fn fill_from(dst: &mut [f64], src: impl Iterator<Item = f64>) -> usize {
    let mut copied = 0;
    for (d, s) in dst.iter_mut().zip(src) {
        *d = s;
        copied += 1;
    }
    dst[copied..].fill(0.0);
    copied
}
