use std::f32::consts::PI;

use ndarray::Array2;
use rustfft::{FftPlanner, num_complex::Complex32};

use super::harmonic::{NATIVE_HOP_AT_44K, PITCH_CLASSES};
use super::{ChordEstimator, ExtractionError};

const MIN_PITCH_HZ: f32 = 55.0;
const MAX_PITCH_HZ: f32 = 5_000.0;

/// Chroma-based chord pitch estimator.
///
/// Folds STFT power into 12 pitch classes (index 0 is C) and scales each
/// frame so its strongest class is 1. Frame `i` is centred on sample
/// `round(i * 4096 * sample_rate / 44100)`. The spacing stays fractional so
/// the frames line up with the grid the harmonic extractor maps from, at
/// any sample rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromaChordEstimator;

impl ChromaChordEstimator {
    /// Native frame spacing in (fractional) samples at `sample_rate`.
    pub fn native_hop(sample_rate: u32) -> f64 {
        NATIVE_HOP_AT_44K as f64 * sample_rate as f64 / 44_100.0
    }

    /// Number of native frames for `len` samples at `sample_rate`.
    pub fn frame_count(len: usize, sample_rate: u32) -> usize {
        (len as f64 / Self::native_hop(sample_rate)).floor() as usize + 1
    }
}

impl ChordEstimator for ChromaChordEstimator {
    fn chord_pitch(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<Array2<f32>, ExtractionError> {
        if sample_rate == 0 {
            return Err(ExtractionError::InvalidParameter(
                "sample rate must be positive".into(),
            ));
        }
        let hop = Self::native_hop(sample_rate);
        let n_fft = ((2.0 * hop).ceil() as usize).max(2).next_power_of_two();
        let frames = Self::frame_count(samples.len(), sample_rate);
        let bin_classes = pitch_class_per_bin(n_fft, sample_rate);
        let window: Vec<f32> = (0..n_fft)
            .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / n_fft as f32).cos())
            .collect();
        let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);

        let mut chroma = Array2::<f32>::zeros((frames, PITCH_CLASSES));
        let mut buf = vec![Complex32::default(); n_fft];
        let half = n_fft / 2;
        for frame in 0..frames {
            let centre = (frame as f64 * hop).round() as usize;
            for (n, cell) in buf.iter_mut().enumerate() {
                let value = (centre + n)
                    .checked_sub(half)
                    .and_then(|idx| samples.get(idx))
                    .copied()
                    .unwrap_or(0.0);
                *cell = Complex32::new(value * window[n], 0.0);
            }
            fft.process(&mut buf);

            let mut row = chroma.row_mut(frame);
            for (bin, class) in bin_classes.iter().enumerate() {
                if let Some(class) = class {
                    row[*class] += buf[bin].norm_sqr();
                }
            }
            let peak = row.iter().fold(0.0_f32, |m, &v| m.max(v));
            if peak > f32::MIN_POSITIVE {
                row.mapv_inplace(|v| v / peak);
            }
        }
        Ok(chroma)
    }
}

/// Pitch class of every positive-frequency bin inside the analysed range.
fn pitch_class_per_bin(n_fft: usize, sample_rate: u32) -> Vec<Option<usize>> {
    let upper = MAX_PITCH_HZ.min(sample_rate as f32 / 2.0);
    (0..=n_fft / 2)
        .map(|bin| {
            let freq = bin as f32 * sample_rate as f32 / n_fft as f32;
            (MIN_PITCH_HZ..=upper).contains(&freq).then(|| {
                let semitones_from_a4 = (12.0 * (freq / 440.0).log2()).round() as i32;
                (semitones_from_a4 + 9).rem_euclid(PITCH_CLASSES as i32) as usize
            })
        })
        .collect()
}
