use std::path::Path;

use ndarray::Array2;

use super::{ChordEstimator, ExtractionError};
use crate::audio::load_mono;

/// Width of a chord pitch vector.
pub const PITCH_CLASSES: usize = 12;
/// Native chord-model frame spacing, in samples at 44.1 kHz.
pub const NATIVE_HOP_AT_44K: usize = 4_096;

/// Chord pitch vectors on a uniform `hop_length` grid, shape `[frames, 12]`.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicFeatures {
    frames: Array2<f32>,
    hop_length: usize,
    sample_rate: u32,
}

impl HarmonicFeatures {
    /// Number of target frames.
    pub fn frame_count(&self) -> usize {
        self.frames.nrows()
    }

    /// Samples between consecutive frames.
    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Rate the features were computed at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.frames
    }

    pub fn into_array(self) -> Array2<f32> {
        self.frames
    }
}

/// Load `path` as mono at `sample_rate` and derive chord pitch features on a
/// `hop_length` grid.
///
/// The audio is not clamped to a maximum duration.
pub fn extract_harmonic(
    path: &Path,
    sample_rate: u32,
    hop_length: usize,
    estimator: &dyn ChordEstimator,
) -> Result<HarmonicFeatures, ExtractionError> {
    let samples = load_mono(path, sample_rate)?;
    let features = harmonic_from_samples(&samples, sample_rate, hop_length, estimator)?;
    tracing::debug!(
        "Harmonic features for {}: {} frames (hop {hop_length})",
        path.display(),
        features.frame_count()
    );
    Ok(features)
}

/// Run `estimator` over `samples` and map its native frames onto a grid of
/// `samples.len() / hop_length` frames.
///
/// Target frame `j` takes the native frame nearest to `j / scale`, where
/// `scale = (sample_rate / 44100) * 4096 / hop_length`. Ties go to the earlier
/// frame; targets past either end repeat the edge frame.
pub fn harmonic_from_samples(
    samples: &[f32],
    sample_rate: u32,
    hop_length: usize,
    estimator: &dyn ChordEstimator,
) -> Result<HarmonicFeatures, ExtractionError> {
    if hop_length == 0 {
        return Err(ExtractionError::InvalidParameter(
            "hop length must be positive".into(),
        ));
    }
    if sample_rate == 0 {
        return Err(ExtractionError::InvalidParameter(
            "sample rate must be positive".into(),
        ));
    }

    let native = estimator.chord_pitch(samples, sample_rate)?;
    if native.ncols() != PITCH_CLASSES {
        return Err(ExtractionError::Shape {
            stage: "chord model",
            expected: format!("[frames, {PITCH_CLASSES}]"),
            actual: native.shape().to_vec(),
        });
    }
    if native.iter().any(|value| !value.is_finite()) {
        return Err(ExtractionError::NonFinite("chord model"));
    }

    let targets = samples.len() / hop_length;
    if targets > 0 && native.nrows() == 0 {
        return Err(ExtractionError::EmptyOutput("chord model"));
    }

    let scale = (sample_rate as f64 / 44_100.0) * NATIVE_HOP_AT_44K as f64 / hop_length as f64;
    let last = native.nrows().saturating_sub(1);
    let frames = Array2::from_shape_fn((targets, PITCH_CLASSES), |(target, class)| {
        native[[nearest_native_frame(target, scale, last), class]]
    });

    Ok(HarmonicFeatures {
        frames,
        hop_length,
        sample_rate,
    })
}

fn nearest_native_frame(target: usize, scale: f64, last: usize) -> usize {
    let position = target as f64 / scale;
    let nearest = (position - 0.5).ceil().max(0.0) as usize;
    nearest.min(last)
}
