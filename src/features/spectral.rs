use std::path::Path;

use ndarray::{Array3, Axis};

use super::device::{self, DeviceTensor};
use super::{ConstantQTransform, ExtractionError};
use crate::audio::{Waveform, normalize_waveform};
use crate::config::{AudioSettings, ComputeDevice};

/// Peak level after normalization.
pub const PEAK_TARGET: f32 = 0.999;
/// Smallest peak used as divisor, so near-silent input is not blown up.
pub const PEAK_FLOOR: f32 = 0.001;

/// Model-ready CQT features, shape `[1, frames, bins]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralFeatures {
    tensor: Array3<f32>,
}

impl SpectralFeatures {
    /// `[1, frames, bins]`.
    pub fn shape(&self) -> [usize; 3] {
        let (batch, frames, bins) = self.tensor.dim();
        [batch, frames, bins]
    }

    /// Number of time frames.
    pub fn frame_count(&self) -> usize {
        self.tensor.dim().1
    }

    /// Number of frequency bins per frame.
    pub fn feature_bins(&self) -> usize {
        self.tensor.dim().2
    }

    /// Borrow the tensor.
    pub fn as_array(&self) -> &Array3<f32> {
        &self.tensor
    }

    /// Take the tensor.
    pub fn into_array(self) -> Array3<f32> {
        self.tensor
    }

    /// Copy the tensor onto `device`.
    pub fn to_device(&self, device: ComputeDevice) -> DeviceTensor {
        device::place(&self.tensor, device)
    }
}

/// Scale `samples` so the peak magnitude becomes [`PEAK_TARGET`], dividing by
/// at least [`PEAK_FLOOR`].
pub fn peak_normalize(samples: &[f32]) -> Vec<f32> {
    let peak = samples
        .iter()
        .filter(|value| value.is_finite())
        .fold(0.0_f32, |max, value| max.max(value.abs()));
    let gain = PEAK_TARGET / peak.max(PEAK_FLOOR);
    samples
        .iter()
        .map(|&value| if value.is_finite() { value * gain } else { 0.0 })
        .collect()
}

/// Peak-normalize `waveform`, run `cqt` and add the batch axis.
pub fn extract_spectral(
    waveform: &Waveform,
    cqt: &dyn ConstantQTransform,
) -> Result<SpectralFeatures, ExtractionError> {
    let normalized = peak_normalize(waveform.samples());
    let matrix = cqt.transform(&normalized, waveform.sample_rate())?;
    let (frames, bins) = matrix.dim();
    if frames == 0 || bins == 0 {
        return Err(ExtractionError::Shape {
            stage: "constant-Q transform",
            expected: "[frames > 0, bins > 0]".to_string(),
            actual: vec![frames, bins],
        });
    }
    if matrix.iter().any(|value| !value.is_finite()) {
        return Err(ExtractionError::NonFinite("constant-Q transform"));
    }
    tracing::debug!("Spectral features: {frames} frames x {bins} bins");
    Ok(SpectralFeatures {
        tensor: matrix.insert_axis(Axis(0)),
    })
}

/// Normalize `path` at the spectral sample rate and extract CQT features.
pub fn extract_spectral_from_file(
    path: &Path,
    settings: &AudioSettings,
    cqt: &dyn ConstantQTransform,
) -> Result<SpectralFeatures, ExtractionError> {
    let waveform = normalize_waveform(
        path,
        settings.spectral_sample_rate,
        settings.max_duration_seconds,
    )?;
    extract_spectral(&waveform, cqt)
}
