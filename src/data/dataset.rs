// ============================================================
// Layer 4 — Paired Tomography Dataset
// ============================================================
// Reads the dataset container: a safetensors file with four
// F32 tensors, each shaped [slices, height, width]:
//
//   train_ns / train_gt — noisy / clean training stack
//   test_ns  / test_gt  — noisy / clean evaluation stack
//
// The whole file is decoded once into owned buffers, after which
// every lookup is a bounds-checked slice into memory.

use std::path::Path;

use safetensors::{tensor::Dtype, SafeTensors};

use crate::data::error::DataError;
use crate::domain::traits::PairedSlices;

pub const TRAIN_NOISY: &str = "train_ns";
pub const TRAIN_CLEAN: &str = "train_gt";
pub const TEST_NOISY:  &str = "test_ns";
pub const TEST_CLEAN:  &str = "test_gt";

/// A stack of 2-D slices — shape [slices, height, width].
#[derive(Debug, Clone)]
pub struct Volume {
    data: Vec<f32>,
    dims: [usize; 3],
}

impl Volume {
    pub fn new(data: Vec<f32>, dims: [usize; 3]) -> Result<Self, DataError> {
        let expected = dims.iter().product::<usize>();
        if data.len() != expected {
            return Err(DataError::InvalidSetting(format!(
                "volume of shape {dims:?} needs {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Self { data, dims })
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn slice(&self, index: usize) -> Option<&[f32]> {
        let [n, h, w] = self.dims;
        if index >= n {
            return None;
        }
        let len = h * w;
        Some(&self.data[index * len..(index + 1) * len])
    }

    #[cfg(test)]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Noisy and clean volumes of identical shape.
#[derive(Debug, Clone)]
pub struct PairedVolume {
    noisy: Volume,
    clean: Volume,
}

impl PairedVolume {
    pub fn new(noisy: Volume, clean: Volume) -> Result<Self, DataError> {
        if noisy.dims() != clean.dims() {
            return Err(DataError::ShapeMismatch { noisy: noisy.dims(), clean: clean.dims() });
        }
        Ok(Self { noisy, clean })
    }
}

impl PairedSlices for PairedVolume {
    fn slice_count(&self) -> usize {
        self.noisy.dims[0]
    }

    fn slice_dims(&self) -> (usize, usize) {
        (self.noisy.dims[1], self.noisy.dims[2])
    }

    fn noisy(&self, index: usize) -> Option<&[f32]> {
        self.noisy.slice(index)
    }

    fn clean(&self, index: usize) -> Option<&[f32]> {
        self.clean.slice(index)
    }
}

/// Training and evaluation splits loaded from one file.
#[derive(Debug, Clone)]
pub struct TomoDataset {
    pub train: PairedVolume,
    pub test:  PairedVolume,
}

impl TomoDataset {
    /// Open and decode the dataset file. Any I/O, format, or shape
    /// problem is returned as a fatal error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path  = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|source| DataError::Open { path: path.to_path_buf(), source })?;
        let tensors = SafeTensors::deserialize(&bytes).map_err(|e| DataError::Format {
            path:   path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let train = PairedVolume::new(
            read_volume(&tensors, TRAIN_NOISY)?,
            read_volume(&tensors, TRAIN_CLEAN)?,
        )?;
        let test = PairedVolume::new(
            read_volume(&tensors, TEST_NOISY)?,
            read_volume(&tensors, TEST_CLEAN)?,
        )?;

        tracing::info!(
            "Opened dataset '{}': train {:?}, test {:?}",
            path.display(),
            train.noisy.dims(),
            test.noisy.dims()
        );
        Ok(Self { train, test })
    }
}

/// Decode one little-endian F32 tensor of rank 3.
fn read_volume(tensors: &SafeTensors<'_>, key: &str) -> Result<Volume, DataError> {
    let view = tensors
        .tensor(key)
        .map_err(|_| DataError::MissingTensor { key: key.to_string() })?;

    if view.dtype() != Dtype::F32 {
        return Err(DataError::BadTensor {
            key:    key.to_string(),
            reason: format!("expected F32, found {:?}", view.dtype()),
        });
    }
    let dims: [usize; 3] = view.shape().try_into().map_err(|_| DataError::BadTensor {
        key:    key.to_string(),
        reason: format!("expected rank 3, found shape {:?}", view.shape()),
    })?;
    if dims.contains(&0) {
        return Err(DataError::BadTensor {
            key:    key.to_string(),
            reason: format!("empty shape {dims:?}"),
        });
    }

    let data = view
        .data()
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Volume::new(data, dims)
}


// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_round_trips_shapes_and_values() {
        let tmp  = TempDir::new().unwrap();
        let path = tmp.path().join("ds.safetensors");
        write_dataset(&path, [4, 8, 6], [3, 8, 6]);

        let ds = TomoDataset::open(&path).unwrap();
        assert_eq!(ds.train.slice_count(), 4);
        assert_eq!(ds.train.slice_dims(), (8, 6));
        assert_eq!(ds.test.slice_count(), 3);

        // slice 2, row 1, col 3 of the clean stack
        let clean = ds.train.clean(2).unwrap();
        assert!((clean[6 + 3] - (0.5 + 2000.0 + 10.0 + 0.3)).abs() < 1e-3);
    }

    #[test]
    fn test_missing_file_is_an_open_error() {
        let err = TomoDataset::open("/definitely/not/here.safetensors").unwrap_err();
        assert!(matches!(err, DataError::Open { .. }));
    }

    #[test]
    fn test_garbage_file_is_a_format_error() {
        let tmp  = TempDir::new().unwrap();
        let path = tmp.path().join("bad.safetensors");
        std::fs::write(&path, b"not a tensor file").unwrap();
        assert!(matches!(TomoDataset::open(&path).unwrap_err(), DataError::Format { .. }));
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let err = PairedVolume::new(ramp_volume([2, 4, 4], 0.0), ramp_volume([2, 4, 5], 0.0))
            .unwrap_err();
        assert!(matches!(err, DataError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_out_of_range_slice_is_none() {
        let v = paired([2, 3, 3]);
        assert!(v.noisy(1).is_some());
        assert!(v.noisy(2).is_none());
    }
}
