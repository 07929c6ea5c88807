//! JSON layout of the cache file.

use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Serialized `{data, labels}` pair.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct CacheFile {
    #[serde(default)]
    pub(super) data: Vec<CachedTensor>,
    #[serde(default)]
    pub(super) labels: Vec<String>,
}

/// Row-major tensor with its shape.
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct CachedTensor {
    pub(super) shape: [usize; 3],
    pub(super) values: Vec<f32>,
}

impl CachedTensor {
    pub(super) fn from_array(array: &Array3<f32>) -> Self {
        let (a, b, c) = array.dim();
        Self {
            shape: [a, b, c],
            values: array.iter().copied().collect(),
        }
    }

    pub(super) fn into_array(self) -> Result<Array3<f32>, String> {
        let [a, b, c] = self.shape;
        let count = self.values.len();
        Array3::from_shape_vec((a, b, c), self.values)
            .map_err(|err| format!("tensor of shape {:?} with {count} values: {err}", self.shape))
    }
}
