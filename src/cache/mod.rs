//! Accumulating dataset of harmonic features.
//!
//! A cache file holds two parallel lists: `data`, one `[1, 23, n]` tensor per
//! processed recording, and `labels`. [`harmonic_cache_entry`] only computes
//! the tensor for one file; [`accumulate`] also appends it with its label and
//! writes the cache back. There is no locking: concurrent writers to the
//! same cache path race and the last save wins.

mod store;

use std::path::{Path, PathBuf};

use ndarray::Array3;
use thiserror::Error;

use crate::atomic_file::write_atomic;
use crate::config::HarmonicSettings;
use crate::features::{
    ChordEstimator, ExtractionError, HarmonicFeatures, PITCH_CLASSES, extract_harmonic,
};
use store::{CacheFile, CachedTensor};

/// Rows in a cache tensor: the 12 pitch classes twice, minus the last.
pub const CACHE_ROWS: usize = 23;

/// Errors raised while reading, updating or writing a feature cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The cache file exists but does not hold a valid `{data, labels}` pair.
    #[error("Corrupt feature cache {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("Failed to serialize feature cache {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// No label was given and none could be derived from the audio path.
    #[error("Cannot derive a label for {path}")]
    MissingLabel { path: PathBuf },
}

/// In-memory copy of a cache file.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCache {
    path: PathBuf,
    data: Vec<Array3<f32>>,
    labels: Vec<String>,
}

impl FeatureCache {
    /// Load the cache at `path`, or start an empty one if the file does not exist.
    pub fn load_or_empty(path: &Path) -> Result<Self, CacheError> {
        if !path.exists() {
            tracing::debug!("No feature cache at {}, starting empty", path.display());
            return Ok(Self {
                path: path.to_path_buf(),
                data: Vec::new(),
                labels: Vec::new(),
            });
        }
        let bytes = std::fs::read(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: CacheFile = serde_json::from_slice(&bytes).map_err(|err| CacheError::Corrupt {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        if file.data.len() != file.labels.len() {
            return Err(CacheError::Corrupt {
                path: path.to_path_buf(),
                message: format!(
                    "{} tensors but {} labels",
                    file.data.len(),
                    file.labels.len()
                ),
            });
        }
        let data = file
            .data
            .into_iter()
            .map(CachedTensor::into_array)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| CacheError::Corrupt {
                path: path.to_path_buf(),
                message,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            data,
            labels: file.labels,
        })
    }

    /// File this cache is read from and saved to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[Array3<f32>] {
        &self.data
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Append one tensor and its label.
    pub fn push(&mut self, tensor: Array3<f32>, label: impl Into<String>) {
        self.data.push(tensor);
        self.labels.push(label.into());
    }

    /// Write the cache back to [`Self::path`], creating parent directories.
    pub fn save(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = CacheFile {
            data: self.data.iter().map(CachedTensor::from_array).collect(),
            labels: self.labels.clone(),
        };
        let bytes = serde_json::to_vec(&file).map_err(|source| CacheError::Serialize {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, &bytes).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(
            "Saved {} cached feature tensors to {}",
            self.data.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Cache file `output_file` inside `output_dir`.
pub fn cache_path(output_dir: &Path, output_file: &str) -> PathBuf {
    output_dir.join(output_file)
}

/// Keep every `stride`-th frame of `features` and lay it out as
/// `[1, 23, frames / stride]`.
///
/// Rows 0..12 are the pitch classes, rows 12..23 repeat classes 0..11.
pub fn reshape_for_cache(
    features: &HarmonicFeatures,
    stride: usize,
) -> Result<Array3<f32>, ExtractionError> {
    if stride == 0 {
        return Err(ExtractionError::InvalidParameter(
            "cache stride must be positive".into(),
        ));
    }
    let frames = features.as_array();
    let kept = frames.nrows() / stride;
    Ok(Array3::from_shape_fn((1, CACHE_ROWS, kept), |(_, row, col)| {
        frames[[col * stride, row % PITCH_CLASSES]]
    }))
}

/// Compute the cache tensor for `audio` without modifying the cache.
///
/// The cache at `output_dir/output_file` is still loaded, so a corrupt cache
/// is reported before any extraction work.
pub fn harmonic_cache_entry(
    audio: &Path,
    output_dir: &Path,
    output_file: &str,
    settings: &HarmonicSettings,
    estimator: &dyn ChordEstimator,
) -> Result<Array3<f32>, CacheError> {
    let cache = FeatureCache::load_or_empty(&cache_path(output_dir, output_file))?;
    tracing::debug!(
        "Feature cache {} holds {} entries",
        cache.path().display(),
        cache.len()
    );
    cache_tensor(audio, settings, estimator)
}

/// Extract `audio`, append it to the cache at `output_dir/output_file` under
/// `label` (or the audio's parent directory name) and save the cache.
pub fn accumulate(
    audio: &Path,
    output_dir: &Path,
    output_file: &str,
    label: Option<&str>,
    settings: &HarmonicSettings,
    estimator: &dyn ChordEstimator,
) -> Result<FeatureCache, CacheError> {
    let label = match label {
        Some(label) => label.to_string(),
        None => default_label(audio).ok_or_else(|| CacheError::MissingLabel {
            path: audio.to_path_buf(),
        })?,
    };
    let mut cache = FeatureCache::load_or_empty(&cache_path(output_dir, output_file))?;
    let tensor = cache_tensor(audio, settings, estimator)?;
    tracing::info!(
        "Caching {} as '{label}' with shape {:?}",
        audio.display(),
        tensor.shape()
    );
    cache.push(tensor, label);
    cache.save()?;
    Ok(cache)
}

/// Name of the directory containing `audio`.
pub fn default_label(audio: &Path) -> Option<String> {
    audio
        .parent()?
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

fn cache_tensor(
    audio: &Path,
    settings: &HarmonicSettings,
    estimator: &dyn ChordEstimator,
) -> Result<Array3<f32>, CacheError> {
    let features = extract_harmonic(
        audio,
        settings.sample_rate,
        settings.hop_length,
        estimator,
    )?;
    Ok(reshape_for_cache(&features, settings.cache_stride)?)
}
