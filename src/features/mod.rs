//! Feature extraction on normalized audio.
//!
//! Two paths share the audio front end:
//! - spectral: peak-normalized waveform -> [`ConstantQTransform`] ->
//!   `[1, frames, bins]`
//! - harmonic: mono audio -> [`ChordEstimator`] -> nearest-neighbour
//!   resampling onto a `hop_length` grid -> `[frames, 12]`
//!
//! The transforms themselves are traits so heavy models can be swapped for
//! lightweight ones in tests. [`CqtTransform`] and [`ChromaChordEstimator`]
//! are the built-in implementations.

mod chroma;
mod cqt;
mod device;
mod harmonic;
mod spectral;

use ndarray::Array2;
use thiserror::Error;

use crate::audio::AudioError;

pub use chroma::ChromaChordEstimator;
pub use cqt::{CqtParams, CqtTransform};
pub use device::DeviceTensor;
pub use harmonic::{
    HarmonicFeatures, NATIVE_HOP_AT_44K, PITCH_CLASSES, extract_harmonic, harmonic_from_samples,
};
pub use spectral::{
    PEAK_FLOOR, PEAK_TARGET, SpectralFeatures, extract_spectral, extract_spectral_from_file,
    peak_normalize,
};

/// Errors raised by feature extractors.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Loading the input audio failed.
    #[error(transparent)]
    Audio(#[from] AudioError),
    /// An extractor parameter is unusable.
    #[error("Invalid extraction parameter: {0}")]
    InvalidParameter(String),
    /// A transform or model returned data of the wrong shape.
    #[error("{stage} produced shape {actual:?}, expected {expected}")]
    Shape {
        stage: &'static str,
        expected: String,
        actual: Vec<usize>,
    },
    /// A transform or model returned no frames.
    #[error("{0} produced no frames")]
    EmptyOutput(&'static str),
    /// A transform or model produced NaN or infinite values.
    #[error("{0} produced non-finite values")]
    NonFinite(&'static str),
    /// The transform or model itself failed.
    #[error("{stage} failed: {message}")]
    Model {
        stage: &'static str,
        message: String,
    },
}

/// Constant-Q transform producing a time-major `[frames, bins]` matrix.
pub trait ConstantQTransform {
    /// Transform mono `samples` recorded at `sample_rate`.
    fn transform(&self, samples: &[f32], sample_rate: u32) -> Result<Array2<f32>, ExtractionError>;
}

/// Chord model producing per-frame pitch-class likelihoods.
///
/// Implementations report frames on their own native grid: frame `i` covers
/// the audio around sample `i * 4096 * sample_rate / 44100`.
pub trait ChordEstimator {
    /// Return the `chord_pitch` matrix, shape `[native_frames, 12]`.
    fn chord_pitch(&self, samples: &[f32], sample_rate: u32)
    -> Result<Array2<f32>, ExtractionError>;
}
