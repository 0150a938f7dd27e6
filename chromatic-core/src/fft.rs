//! # Fast Fourier Transform (FFT) Module
//!
//! FFT plumbing for the autocorrelation pitch estimator: the Hann window and
//! the two real transforms it needs, each owning its plan and buffers.
//!
//! ## Features
//! - Real-to-complex forward transform of the analysis frame
//! - Complex-to-real inverse transform at the zero-padded length
//! - Buffers sized once at construction, never resized per frame

use std::sync::Arc;

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

/// Generates a Hann window of `size` points.
///
/// The window tapers the frame to zero at both edges to reduce spectral
/// leakage. Sizes of 0 or 1 degrade to a constant window of 1.0.
pub fn hann_window(size: usize) -> Vec<f64> {
    if size <= 1 {
        return vec![1.0; size];
    }
    let n_minus_1 = (size - 1) as f64;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / n_minus_1).cos()))
        .collect()
}

/// Forward real-to-complex transform with owned input, output and scratch.
pub(crate) struct ForwardFft {
    plan: Arc<dyn RealToComplex<f64>>,
    input: Vec<f64>,
    output: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl ForwardFft {
    pub(crate) fn new(planner: &mut RealFftPlanner<f64>, len: usize) -> Self {
        let plan = planner.plan_fft_forward(len);
        let input = plan.make_input_vec();
        let output = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();
        Self {
            plan,
            input,
            output,
            scratch,
        }
    }

    /// Transforms `signal` (of the planned length) and returns the
    /// `len / 2 + 1` non-redundant bins.
    pub(crate) fn process(&mut self, signal: &[f64]) -> Result<&[Complex<f64>], realfft::FftError> {
        // The transform uses its input as scratch space.
        self.input.copy_from_slice(signal);
        self.plan
            .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)?;
        Ok(&self.output)
    }
}

/// Inverse complex-to-real transform.
///
/// The caller fills `spectrum_mut()` with the `len / 2 + 1` bins before each
/// call to `process`. The spectrum buffer is consumed by the transform.
pub(crate) struct InverseFft {
    plan: Arc<dyn ComplexToReal<f64>>,
    spectrum: Vec<Complex<f64>>,
    output: Vec<f64>,
    scratch: Vec<Complex<f64>>,
}

impl InverseFft {
    pub(crate) fn new(planner: &mut RealFftPlanner<f64>, len: usize) -> Self {
        let plan = planner.plan_fft_inverse(len);
        let spectrum = plan.make_input_vec();
        let output = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();
        Self {
            plan,
            spectrum,
            output,
            scratch,
        }
    }

    pub(crate) fn spectrum_mut(&mut self) -> &mut [Complex<f64>] {
        &mut self.spectrum
    }

    pub(crate) fn process(&mut self) -> Result<&[f64], realfft::FftError> {
        self.plan
            .process_with_scratch(&mut self.spectrum, &mut self.output, &mut self.scratch)?;
        Ok(&self.output)
    }

    /// Output of the last `process` call.
    pub(crate) fn output(&self) -> &[f64] {
        &self.output
    }
}
