//! Audio normalization and feature derivation for cover-song models.
/// Application directory helpers.
pub mod app_dirs;
mod atomic_file;
/// Decoding, resampling and fixed-length waveform normalization.
pub mod audio;
/// Accumulating on-disk harmonic feature dataset.
pub mod cache;
/// Pipeline configuration persisted as TOML.
pub mod config;
/// Spectral (constant-Q) and harmonic (chord pitch) feature extraction.
pub mod features;
/// Logging setup for binaries.
pub mod logging;
/// Media probing, size/duration policy and audio extraction.
pub mod media;

pub use audio::{Waveform, load_mono, normalize, normalize_waveform};
pub use cache::{CacheError, FeatureCache, accumulate, harmonic_cache_entry};
pub use config::{ComputeDevice, PipelineConfig};
pub use features::{
    ChordEstimator, ChromaChordEstimator, ConstantQTransform, CqtTransform, ExtractionError,
    HarmonicFeatures, SpectralFeatures, extract_harmonic, extract_spectral,
};
pub use media::{MediaError, validate_media};
