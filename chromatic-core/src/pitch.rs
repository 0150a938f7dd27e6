//! # Pitch Detection Module
//!
//! Autocorrelation pitch estimation for a single monophonic tone.
//!
//! The autocorrelation is computed in the frequency domain as the inverse
//! transform of the power spectrum `|X[f]|^2`. Before the inverse transform
//! the spectrum is zero-padded by [`ZERO_PADDING_FACTOR`], which interpolates
//! the autocorrelation in time and so refines the lag (hence frequency)
//! resolution without needing more input.
//!
//! The estimator never fails. It always returns a number, possibly infinite
//! or NaN for silent or degenerate frames; callers gate the result against
//! the physically plausible band (see [`crate::tuning`]).

use log::error;
use realfft::RealFftPlanner;
use rustfft::num_complex::Complex;

use crate::fft::{ForwardFft, InverseFft, hann_window};

/// Number of times the spectrum is zero-padded before the inverse transform.
pub const ZERO_PADDING_FACTOR: usize = 80;

/// Owns the FFT plans and buffers for one `(sample_frequency, fft_frame_size)`
/// configuration.
///
/// A new estimator is built whenever the configuration changes; buffers are
/// never resized per frame.
pub struct PitchEstimator {
    sample_frequency: f64,
    fft_frame_size: usize,
    window: Vec<f64>,
    /// Windowed time-domain frame.
    input: Vec<f64>,
    /// Power spectrum of the last frame, `fft_frame_size / 2 + 1` bins.
    power_spectrum: Vec<f64>,
    forward: ForwardFft,
    /// Inverse transform at `fft_frame_size * ZERO_PADDING_FACTOR` points.
    inverse: InverseFft,
}

impl PitchEstimator {
    pub fn new(sample_frequency: u32, fft_frame_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let forward = ForwardFft::new(&mut planner, fft_frame_size);
        let inverse = InverseFft::new(&mut planner, fft_frame_size * ZERO_PADDING_FACTOR);

        Self {
            sample_frequency: sample_frequency as f64,
            fft_frame_size,
            window: hann_window(fft_frame_size),
            input: vec![0.0; fft_frame_size],
            power_spectrum: vec![0.0; fft_frame_size / 2 + 1],
            forward,
            inverse,
        }
    }

    pub fn fft_frame_size(&self) -> usize {
        self.fft_frame_size
    }

    pub fn sample_frequency(&self) -> u32 {
        self.sample_frequency as u32
    }

    /// Length of the zero-padded autocorrelation sequence.
    pub fn autocorrelation_len(&self) -> usize {
        self.fft_frame_size * ZERO_PADDING_FACTOR
    }

    /// Loads a new frame, applying the Hann window.
    ///
    /// At most `fft_frame_size` samples are taken; a shorter input leaves the
    /// tail of the frame zeroed.
    pub fn load_samples(&mut self, samples: &[f32]) {
        let loaded = samples.len().min(self.fft_frame_size);
        for ((dst, &sample), &w) in self.input.iter_mut().zip(&samples[..loaded]).zip(&self.window) {
            *dst = sample as f64 * w;
        }
        self.input[loaded..].fill(0.0);
    }

    /// The windowed frame loaded by the last [`load_samples`](Self::load_samples).
    pub fn windowed_input(&self) -> &[f64] {
        &self.input
    }

    /// Power spectrum computed by the last [`estimate_frequency`](Self::estimate_frequency).
    pub fn power_spectrum(&self) -> &[f64] {
        &self.power_spectrum
    }

    /// Zero-padded autocorrelation computed by the last
    /// [`estimate_frequency`](Self::estimate_frequency).
    pub fn autocorrelation(&self) -> &[f64] {
        self.inverse.output()
    }

    /// Estimates the frequency of the loaded frame from the highest
    /// autocorrelation peak past the central lobe.
    ///
    /// # Returns
    /// * The frequency in Hz. Infinite when no positive peak exists (for
    ///   example an all-zero frame).
    pub fn estimate_frequency(&mut self) -> f64 {
        match self.compute_autocorrelation() {
            Ok(()) => {}
            Err(e) => {
                error!("Autocorrelation transform failed: {}", e);
                return f64::NAN;
            }
        }

        let max_index = pick_peak(self.inverse.output(), self.fft_frame_size);
        (ZERO_PADDING_FACTOR / 2) as f64 * (2.0 * self.sample_frequency) / max_index as f64
    }

    fn compute_autocorrelation(&mut self) -> Result<(), realfft::FftError> {
        let bins = self.forward.process(&self.input)?;

        // R[f] = X[f] X[f]* = Re^2 + Im^2, only the non-redundant half.
        for (power, bin) in self.power_spectrum.iter_mut().zip(bins) {
            *power = bin.re * bin.re + bin.im * bin.im;
        }

        let padded = self.inverse.spectrum_mut();
        let (head, tail) = padded.split_at_mut(self.power_spectrum.len());
        for (dst, &power) in head.iter_mut().zip(&self.power_spectrum) {
            *dst = Complex::new(power, 0.0);
        }
        tail.fill(Complex::new(0.0, 0.0));

        self.inverse.process()?;
        Ok(())
    }
}

/// Index of the autocorrelation maximum after the lobe around lag 0.
///
/// Skips forward while the sequence is still descending or still positive,
/// then takes the largest positive value, both within the first
/// `(ZERO_PADDING_FACTOR / 2) * fft_frame_size + 1` lags. Returns 0 when no
/// positive value follows the central lobe.
fn pick_peak(autocorrelation: &[f64], fft_frame_size: usize) -> usize {
    let limit = (ZERO_PADDING_FACTOR / 2) * fft_frame_size + 1;
    debug_assert!(limit < autocorrelation.len());

    let mut lag = 0;
    while lag < limit
        && (autocorrelation[lag + 1] < autocorrelation[lag] || autocorrelation[lag + 1] > 0.0)
    {
        lag += 1;
    }

    let mut max_value = 0.0;
    let mut max_index = 0;
    for (index, &value) in autocorrelation.iter().enumerate().take(limit).skip(lag) {
        if value > max_value {
            max_value = value;
            max_index = index;
        }
    }
    max_index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_frequency: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_frequency as f64).sin() as f32)
            .collect()
    }

    #[test]
    fn short_input_is_zero_padded() {
        let mut estimator = PitchEstimator::new(44100, 64);
        estimator.load_samples(&[1.0; 64]);
        estimator.load_samples(&[1.0; 10]);
        assert!(estimator.windowed_input()[10..].iter().all(|&s| s == 0.0));
        assert!(estimator.windowed_input()[5] > 0.0);
    }

    #[test]
    fn long_input_is_truncated_to_frame() {
        let mut estimator = PitchEstimator::new(44100, 32);
        estimator.load_samples(&[1.0; 100]);
        assert_eq!(estimator.windowed_input().len(), 32);
    }

    #[test]
    fn silence_yields_non_finite_frequency() {
        let mut estimator = PitchEstimator::new(44100, 1024);
        estimator.load_samples(&vec![0.0; 1024]);
        let frequency = estimator.estimate_frequency();
        assert!(!frequency.is_finite());
    }

    #[test]
    fn buffers_have_padded_sizes() {
        let mut estimator = PitchEstimator::new(22050, 512);
        estimator.load_samples(&sine(344.53125, 22050, 512));
        estimator.estimate_frequency();
        assert_eq!(estimator.power_spectrum().len(), 257);
        assert_eq!(estimator.autocorrelation().len(), 512 * ZERO_PADDING_FACTOR);
        assert_eq!(estimator.autocorrelation_len(), 512 * ZERO_PADDING_FACTOR);
    }

    #[test]
    fn peak_picking_skips_the_central_lobe() {
        // Central lobe, a dip below zero, then two peaks.
        let mut ac = vec![0.0; 100 * ZERO_PADDING_FACTOR];
        let shape = [10.0, 6.0, 1.0, -2.0, -3.0, -1.0, 4.0, 7.0, 5.0, 2.0, 3.0];
        ac[..shape.len()].copy_from_slice(&shape);
        assert_eq!(pick_peak(&ac, 100), 7);
    }

    #[test]
    fn peak_picking_without_positive_peak_returns_zero() {
        let mut ac = vec![-1.0; 10 * ZERO_PADDING_FACTOR];
        ac[0] = 5.0;
        assert_eq!(pick_peak(&ac, 10), 0);
    }
}
