//! Pipeline configuration.
//!
//! Settings are stored as `config.toml` in the application root directory.
//! Every field has a serde default so partial files stay valid.

mod defaults;
mod io;

use serde::{Deserialize, Serialize};

use defaults::*;
pub use io::{CONFIG_FILE_NAME, ConfigError, config_path, load_from, load_or_default, save_to_path};

/// Top-level configuration for every pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Device spectral tensors are placed on.
    #[serde(default)]
    pub device: ComputeDevice,
    /// Waveform normalization settings.
    #[serde(default)]
    pub audio: AudioSettings,
    /// Media validation and transcoding settings.
    #[serde(default)]
    pub media: MediaSettings,
    /// Harmonic feature and cache settings.
    #[serde(default)]
    pub harmonic: HarmonicSettings,
}

/// Target rates and duration used by the waveform normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// General-purpose normalization rate.
    #[serde(default = "default_general_sample_rate")]
    pub general_sample_rate: u32,
    /// Rate used ahead of the constant-Q transform.
    #[serde(default = "default_spectral_sample_rate")]
    pub spectral_sample_rate: u32,
    /// Waveforms are truncated or zero-padded to this many seconds.
    #[serde(default = "default_max_duration_seconds")]
    pub max_duration_seconds: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            general_sample_rate: default_general_sample_rate(),
            spectral_sample_rate: default_spectral_sample_rate(),
            max_duration_seconds: default_max_duration_seconds(),
        }
    }
}

/// Limits and external tools used by the media validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSettings {
    /// Reject files larger than this many MiB.
    #[serde(default = "default_max_file_megabytes")]
    pub max_file_megabytes: f64,
    /// Reject files longer than this many seconds.
    #[serde(default = "default_max_media_seconds")]
    pub max_duration_seconds: f64,
    /// Sample rate of WAV files extracted from video containers.
    #[serde(default = "default_transcode_sample_rate")]
    pub transcode_sample_rate: u32,
    /// `ffmpeg` binary (overridable with `FFMPEG_PATH`).
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    /// `ffprobe` binary (overridable with `FFPROBE_PATH`).
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            max_file_megabytes: default_max_file_megabytes(),
            max_duration_seconds: default_max_media_seconds(),
            transcode_sample_rate: default_transcode_sample_rate(),
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
        }
    }
}

/// Chord-pitch extraction grid and cache layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonicSettings {
    /// Rate the chord estimator runs at.
    #[serde(default = "default_harmonic_sample_rate")]
    pub sample_rate: u32,
    /// Samples per output frame.
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    /// Keep every n-th frame when writing cache entries.
    #[serde(default = "default_cache_stride")]
    pub cache_stride: usize,
    /// Default cache file name inside an output directory.
    #[serde(default = "default_cache_file_name")]
    pub cache_file_name: String,
}

impl Default for HarmonicSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_harmonic_sample_rate(),
            hop_length: default_hop_length(),
            cache_stride: default_cache_stride(),
            cache_file_name: default_cache_file_name(),
        }
    }
}

/// Compute device for model-ready tensors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    /// Plain CPU tensors (burn ndarray backend).
    #[default]
    Cpu,
    /// GPU tensors through burn's wgpu backend.
    Wgpu,
    /// CUDA tensors, only with the `cuda` feature.
    #[cfg(feature = "cuda")]
    Cuda,
}

impl ComputeDevice {
    /// Environment variable consulted by [`ComputeDevice::from_env_or`].
    pub const ENV: &'static str = "COVERPREP_DEVICE";

    /// Parse a device name as used in config files and the environment.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cpu" | "ndarray" => Some(Self::Cpu),
            "wgpu" | "gpu" | "vulkan" | "metal" => Some(Self::Wgpu),
            #[cfg(feature = "cuda")]
            "cuda" => Some(Self::Cuda),
            _ => None,
        }
    }

    /// Return the device named by `COVERPREP_DEVICE`, or `fallback`.
    pub fn from_env_or(fallback: Self) -> Self {
        match std::env::var(Self::ENV) {
            Ok(value) => Self::parse(&value).unwrap_or_else(|| {
                tracing::warn!("Unknown compute device '{value}', using {fallback:?}");
                fallback
            }),
            Err(_) => fallback,
        }
    }
}
