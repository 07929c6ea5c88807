use std::f32::consts::PI;

use ndarray::Array2;
use rustfft::{FftPlanner, num_complex::Complex32};

use super::{ConstantQTransform, ExtractionError};

/// Kernel entries below this fraction of a kernel's peak magnitude are dropped.
const SPARSITY_THRESHOLD: f32 = 0.0054;
/// Dynamic range of the log-magnitude output.
const TOP_DB: f32 = 80.0;

/// Constant-Q analysis parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CqtParams {
    /// Frequency of the lowest bin in Hz.
    pub fmin_hz: f32,
    /// Total number of bins.
    pub n_bins: usize,
    /// Bins per octave.
    pub bins_per_octave: usize,
    /// Frame spacing in seconds.
    pub hop_seconds: f32,
}

impl Default for CqtParams {
    fn default() -> Self {
        Self {
            fmin_hz: 32.7,
            n_bins: 96,
            bins_per_octave: 12,
            hop_seconds: 0.04,
        }
    }
}

impl CqtParams {
    fn hop_samples(&self, sample_rate: u32) -> usize {
        ((self.hop_seconds * sample_rate as f32).round() as usize).max(1)
    }

    fn quality(&self) -> f32 {
        1.0 / (2.0_f32.powf(1.0 / self.bins_per_octave as f32) - 1.0)
    }

    fn bin_frequency(&self, bin: usize) -> f32 {
        self.fmin_hz * 2.0_f32.powf(bin as f32 / self.bins_per_octave as f32)
    }
}

/// Built-in constant-Q transform.
///
/// Uses sparse spectral kernels: every frame is FFT'd once and each bin is a
/// dot product with its precomputed kernel. Output is log magnitude relative
/// to the loudest cell, clipped to 80 dB and mapped to `[0, 1]`, one row per
/// frame. A signal of `n` samples yields `n / hop + 1` frames (frames are
/// centred on `k * hop`).
#[derive(Debug, Clone, Default)]
pub struct CqtTransform {
    params: CqtParams,
}

impl CqtTransform {
    /// Transform with custom parameters.
    pub fn new(params: CqtParams) -> Self {
        Self { params }
    }

    /// Active parameters.
    pub fn params(&self) -> &CqtParams {
        &self.params
    }

    /// Number of frames produced for `len` samples at `sample_rate`.
    pub fn frame_count(&self, len: usize, sample_rate: u32) -> usize {
        len / self.params.hop_samples(sample_rate) + 1
    }

    fn kernels(
        &self,
        sample_rate: u32,
    ) -> Result<(usize, Vec<Vec<(usize, Complex32)>>), ExtractionError> {
        let params = &self.params;
        if params.n_bins == 0 || params.bins_per_octave == 0 || params.fmin_hz <= 0.0 {
            return Err(ExtractionError::InvalidParameter(format!(
                "unusable CQT parameters {params:?}"
            )));
        }
        let nyquist = sample_rate as f32 / 2.0;
        let top = params.bin_frequency(params.n_bins - 1);
        if top >= nyquist {
            return Err(ExtractionError::InvalidParameter(format!(
                "highest CQT bin {top:.1} Hz is above Nyquist ({nyquist:.1} Hz)"
            )));
        }

        let q = params.quality();
        let longest = (q * sample_rate as f32 / params.fmin_hz).ceil() as usize;
        let fft_len = longest.next_power_of_two();
        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_len);

        let mut kernels = Vec::with_capacity(params.n_bins);
        let mut buf = vec![Complex32::default(); fft_len];
        for bin in 0..params.n_bins {
            let len = (q * sample_rate as f32 / params.bin_frequency(bin)).ceil() as usize;
            let start = (fft_len - len) / 2;
            buf.fill(Complex32::default());
            for n in 0..len {
                let window = 0.5 - 0.5 * (2.0 * PI * n as f32 / len as f32).cos();
                let phase = 2.0 * PI * q * n as f32 / len as f32;
                buf[start + n] = Complex32::from_polar(window / len as f32, phase);
            }
            fft.process(&mut buf);
            let peak = buf.iter().fold(0.0_f32, |m, c| m.max(c.norm()));
            let sparse = buf
                .iter()
                .enumerate()
                .filter(|(_, c)| c.norm() >= peak * SPARSITY_THRESHOLD)
                .map(|(idx, c)| (idx, c.conj() / fft_len as f32))
                .collect();
            kernels.push(sparse);
        }
        Ok((fft_len, kernels))
    }
}

impl ConstantQTransform for CqtTransform {
    fn transform(&self, samples: &[f32], sample_rate: u32) -> Result<Array2<f32>, ExtractionError> {
        if sample_rate == 0 {
            return Err(ExtractionError::InvalidParameter(
                "sample rate must be positive".into(),
            ));
        }
        let (fft_len, kernels) = self.kernels(sample_rate)?;
        let hop = self.params.hop_samples(sample_rate);
        let frames = self.frame_count(samples.len(), sample_rate);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_len);

        let mut magnitudes = Array2::<f32>::zeros((frames, kernels.len()));
        let mut buf = vec![Complex32::default(); fft_len];
        let half = fft_len / 2;
        for frame in 0..frames {
            let centre = frame * hop;
            for (n, cell) in buf.iter_mut().enumerate() {
                let value = (centre + n)
                    .checked_sub(half)
                    .and_then(|idx| samples.get(idx))
                    .copied()
                    .unwrap_or(0.0);
                *cell = Complex32::new(value, 0.0);
            }
            fft.process(&mut buf);
            for (bin, kernel) in kernels.iter().enumerate() {
                let sum: Complex32 = kernel.iter().map(|&(idx, k)| buf[idx] * k).sum();
                magnitudes[[frame, bin]] = sum.norm();
            }
        }

        Ok(to_unit_log_scale(magnitudes))
    }
}

fn to_unit_log_scale(mut magnitudes: Array2<f32>) -> Array2<f32> {
    let reference = magnitudes.iter().fold(0.0_f32, |m, &v| m.max(v));
    if reference <= f32::MIN_POSITIVE {
        magnitudes.fill(0.0);
        return magnitudes;
    }
    magnitudes.mapv_inplace(|value| {
        let db = 20.0 * (value.max(1e-10) / reference).log10();
        (db.max(-TOP_DB) + TOP_DB) / TOP_DB
    });
    magnitudes
}
