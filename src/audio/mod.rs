//! Waveform loading and fixed-length normalization.
//!
//! Every feature path enters through [`load_mono`]: decode at the native
//! rate, average channels, then band-limited resample to the requested rate.
//! [`normalize_waveform`] additionally clamps or zero-pads the result to a
//! fixed sample count.

mod decode;
mod resample;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::AudioSettings;

pub(crate) use resample::resample_mono;

/// Errors raised while turning a media file into samples.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The file could not be opened.
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The container or codec could not be decoded.
    #[error("Audio decode failed for {path}: {message}")]
    Decode { path: PathBuf, message: String },
    /// Decoding succeeded but produced no samples.
    #[error("No audio samples decoded from {path}")]
    Empty { path: PathBuf },
    /// A sample rate of zero was requested or reported.
    #[error("Invalid sample rate conversion {input_rate} Hz -> {output_rate} Hz")]
    InvalidRate { input_rate: u32, output_rate: u32 },
    /// Writing a waveform as WAV failed.
    #[error("Failed to write {path}: {message}")]
    Encode { path: PathBuf, message: String },
    /// The resampler failed.
    #[error("Resampling {input_rate} Hz -> {output_rate} Hz failed: {message}")]
    Resample {
        input_rate: u32,
        output_rate: u32,
        message: String,
    },
}

/// Fixed-length mono waveform at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    /// Build a waveform of exactly `sample_rate * max_duration_seconds` samples
    /// from arbitrary mono samples, truncating or zero-padding at the end.
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32, max_duration_seconds: u32) -> Self {
        let max_samples = sample_rate as usize * max_duration_seconds as usize;
        Self {
            samples: fit_to_length(samples, max_samples),
            sample_rate,
        }
    }

    /// Sample values.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the waveform holds no samples (zero duration).
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate.max(1) as f32
    }

    /// Consume the waveform and return its samples.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Write the waveform as a mono 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), AudioError> {
        let encode_err = |err: hound::Error| AudioError::Encode {
            path: path.to_path_buf(),
            message: err.to_string(),
        };
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec).map_err(encode_err)?;
        for &sample in &self.samples {
            writer.write_sample(sample).map_err(encode_err)?;
        }
        writer.finalize().map_err(encode_err)
    }
}

/// Decode `path`, mix it down to mono and resample to `sample_rate`.
///
/// No duration limit is applied.
pub fn load_mono(path: &Path, sample_rate: u32) -> Result<Vec<f32>, AudioError> {
    let decoded = decode::decode_audio(path)?;
    let mono = downmix_to_mono(&decoded.samples, decoded.channels);
    resample_mono(&mono, decoded.sample_rate, sample_rate)
}

/// Load `path` as a mono waveform of exactly `sample_rate * max_duration_seconds`
/// samples.
pub fn normalize_waveform(
    path: &Path,
    sample_rate: u32,
    max_duration_seconds: u32,
) -> Result<Waveform, AudioError> {
    let mono = load_mono(path, sample_rate)?;
    let original_len = mono.len();
    let waveform = Waveform::from_mono(mono, sample_rate, max_duration_seconds);
    tracing::debug!(
        "Normalized {} to {} samples at {} Hz (source {} samples)",
        path.display(),
        waveform.len(),
        sample_rate,
        original_len
    );
    Ok(waveform)
}

/// Normalize `path` at the general-purpose rate and duration from `settings`.
pub fn normalize(path: &Path, settings: &AudioSettings) -> Result<Waveform, AudioError> {
    normalize_waveform(
        path,
        settings.general_sample_rate,
        settings.max_duration_seconds,
    )
}

/// Average interleaved channels into one.
pub(crate) fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Truncate to, or zero-pad at the end to, exactly `len` samples.
pub(crate) fn fit_to_length(mut samples: Vec<f32>, len: usize) -> Vec<f32> {
    samples.resize(len, 0.0);
    samples
}
